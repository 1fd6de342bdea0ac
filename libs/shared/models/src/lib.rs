pub mod auth;
pub mod error;

pub use auth::{JwtClaims, User};
pub use error::AppError;
