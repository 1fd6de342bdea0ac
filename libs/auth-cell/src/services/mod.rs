pub mod account;
pub mod auth;

pub use account::AccountService;
pub use auth::AuthClient;
