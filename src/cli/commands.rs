use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "studysync")]
#[command(about = "Terminal dashboard for logging and visualizing study sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Backend base URL (overrides the config file and STUDYSYNC_BACKEND_URL)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the interactive dashboard (the default when no command is given)
    Dashboard,
    /// Start a study session and print its id
    Start {
        /// Your name / ID
        #[arg(short, long)]
        name: String,
        /// What you are studying
        #[arg(short, long)]
        subject: String,
        /// Focus level, 1-5
        #[arg(short, long, default_value_t = 3)]
        focus: u8,
    },
    /// End a session by id
    End {
        /// Session ID to end
        session_id: String,
        /// Minutes studied
        #[arg(short, long)]
        minutes: u64,
    },
    /// List all sessions
    List,
    /// Show aggregate statistics
    Stats,
    /// Request an AI summary of all sessions
    Summary,
    /// Check whether the backend is reachable
    Status,
}
