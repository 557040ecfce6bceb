pub mod http;
pub mod tui;

pub use http::{ApiError, StudySyncClient};
pub use tui::DashboardTui;
