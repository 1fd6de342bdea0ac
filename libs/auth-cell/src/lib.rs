pub mod context;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use context::{AppContext, AuthEvent, SessionState};
pub use router::*;
