//! Bonus program HTTP API.
//!
//! A small loyalty service: users register, log in for a one-hour JWT, check
//! their bonus level, and record spending that can promote them through the
//! seeded Silver/Gold/Platinum tiers.

pub mod auth;
pub mod config;
pub mod db;
pub mod levels;
pub mod routes;
pub mod types;

pub use auth::{issue_token, verify_token, AuthUser, Claims};
pub use config::ServiceConfig;
pub use routes::{app_router, AppState, ServiceError};
pub use types::{BonusLevel, User};
