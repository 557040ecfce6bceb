// StudySync CLI Library
// Terminal dashboard client for the StudySync study-session backend

pub mod cli;
pub mod client;
pub mod core;
pub mod utils;

// Re-export commonly used types
pub use client::{ApiError, DashboardTui, StudySyncClient};
pub use core::{Config, SessionController, SessionStats, StudySession};

// Error handling
pub use anyhow::{Error, Result};
