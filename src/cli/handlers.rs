use tracing_subscriber::EnvFilter;

use crate::cli::Commands;
use crate::client::{DashboardTui, StudySyncClient};
use crate::core::controller::{EndPayload, SessionController, StartForm};
use crate::core::{Config, IdentityClient, SessionStats, SummaryFailure};
use crate::utils::format::{format_timestamp, short_id};
use crate::utils::tui_writer::TuiWriter;
use crate::Result;

pub async fn run_command(config: Config, command: Commands) -> Result<()> {
    match command {
        Commands::Dashboard => run_dashboard(config).await,
        Commands::Start {
            name,
            subject,
            focus,
        } => start_session(config, name, subject, focus).await,
        Commands::End {
            session_id,
            minutes,
        } => end_session(config, session_id, minutes).await,
        Commands::List => list_sessions(config).await,
        Commands::Stats => show_stats(config).await,
        Commands::Summary => ai_summary(config).await,
        Commands::Status => backend_status(config).await,
    }
}

pub async fn run_dashboard(config: Config) -> Result<()> {
    // Route tracing into the TUI log strip so the alternate screen stays
    // clean.
    let (writer, log_rx) = TuiWriter::new();
    let filter =
        EnvFilter::from_default_env().add_directive("studysync=info".parse().unwrap());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();

    let client = StudySyncClient::from_config(&config);
    let identity = IdentityClient::new(config.identity.base_url.clone())?;
    tracing::info!("Dashboard using backend {}", client.base_url());

    let mut tui = DashboardTui::new(client, identity)?;
    tui.run(log_rx).await
}

pub async fn start_session(
    config: Config,
    name: String,
    subject: String,
    focus: u8,
) -> Result<()> {
    let client = StudySyncClient::from_config(&config);
    let mut controller = SessionController::new();
    let payload = controller.begin_start(&StartForm {
        name,
        subject,
        focus_level: Some(focus),
    })?;

    let id = client.start_session(&payload).await?;
    println!("🟢 Session started");
    println!("📋 Session ID: {}", id);
    println!("💡 End it with: studysync end {} --minutes <n>", id);
    Ok(())
}

pub async fn end_session(config: Config, session_id: String, minutes: u64) -> Result<()> {
    let client = StudySyncClient::from_config(&config);
    let payload = EndPayload {
        session_id: session_id.clone(),
        duration_minutes: minutes.max(1),
        concepts_covered: Vec::new(),
        test_score: None,
    };
    client.end_session(&payload).await?;
    println!(
        "🛑 Session {} ended ({} min)",
        session_id, payload.duration_minutes
    );
    Ok(())
}

pub async fn list_sessions(config: Config) -> Result<()> {
    let client = StudySyncClient::from_config(&config);
    let sessions = client.fetch_sessions().await?;

    if sessions.is_empty() {
        println!("No sessions yet.");
        return Ok(());
    }

    println!(
        "{:<14} {:<12} {:<16} {:>5}  {:<13} {:<13} {:>5}",
        "ID", "NAME", "SUBJECT", "FOCUS", "START", "END", "MIN"
    );
    for session in &sessions {
        println!(
            "{:<14} {:<12} {:<16} {:>5}  {:<13} {:<13} {:>5}",
            short_id(&session.id, 13),
            session.name.as_deref().unwrap_or("-"),
            session.subject,
            session
                .focus_level
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
            format_timestamp(session.start_time.as_ref()),
            format_timestamp(session.end_time.as_ref()),
            session
                .duration_minutes
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}

pub async fn show_stats(config: Config) -> Result<()> {
    let client = StudySyncClient::from_config(&config);
    let sessions = client.fetch_sessions().await?;
    let stats = SessionStats::from_sessions(&sessions);

    println!("🧾 Total sessions: {}", stats.total_sessions);
    println!("⏳ Total minutes:  {}", stats.total_minutes);
    println!("🎯 Average focus:  {:.1}", stats.avg_focus);
    Ok(())
}

pub async fn ai_summary(config: Config) -> Result<()> {
    let client = StudySyncClient::from_config(&config);
    let sessions = client.fetch_sessions().await?;

    if sessions.is_empty() {
        println!("No sessions yet - nothing to summarize.");
        return Ok(());
    }

    match client.ai_summary(&sessions).await {
        Ok(summary) => {
            let text = summary
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "No summary".to_string());
            println!("🤖 AI Insight: {}", text);
        }
        Err(e) => {
            println!("⚠️  {}", SummaryFailure::from(e).into_message());
        }
    }
    Ok(())
}

pub async fn backend_status(config: Config) -> Result<()> {
    let client = StudySyncClient::from_config(&config);
    if client.is_reachable().await {
        println!("✅ Backend reachable at {}", client.base_url());
        Ok(())
    } else {
        anyhow::bail!("Backend not reachable at {}", client.base_url())
    }
}
