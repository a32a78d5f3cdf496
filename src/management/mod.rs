mod auth;
mod flow;

pub use auth::REFRESH_LEAD_SECS;
pub use auth::TokenManager;
pub use flow::AuthFlow;
pub use flow::AuthPhase;
pub use flow::FlowError;
