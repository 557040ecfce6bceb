pub mod auth;
pub mod config;
pub mod controller;
pub mod session;

pub use auth::{AuthUser, IdentityClient};
pub use config::Config;
pub use controller::{
    EndPayload, PendingAction, SessionController, StartForm, StartPayload, SummaryFailure,
    TransitionError,
};
pub use session::{SessionStats, StudySession};
