pub mod auth;
pub mod jwt;

pub use auth::{AuthUser, authorize};
