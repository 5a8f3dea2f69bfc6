//! Service configuration, read once at startup.

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://bonus_program.db";
pub const DEFAULT_JWT_SECRET: &str = "default_jwt_secret_key";
pub const DEFAULT_PORT: u16 = 5001;

/// Runtime settings for the bonus program service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from `DATABASE_URI`, `JWT_SECRET_KEY` and `PORT`,
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Self {
        let database_url =
            std::env::var("DATABASE_URI").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let jwt_secret =
            std::env::var("JWT_SECRET_KEY").unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string());
        let port = match std::env::var("PORT") {
            Ok(raw) => match raw.parse() {
                Ok(port) => port,
                Err(_) => {
                    warn!(value = %raw, "PORT is not a valid port number, using default");
                    DEFAULT_PORT
                }
            },
            Err(_) => DEFAULT_PORT,
        };
        Self {
            database_url,
            jwt_secret,
            port,
        }
    }

    pub fn with_database_url(mut self, database_url: impl Into<String>) -> Self {
        self.database_url = database_url.into();
        self
    }

    pub fn with_jwt_secret(mut self, jwt_secret: impl Into<String>) -> Self {
        self.jwt_secret = jwt_secret.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.database_url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if !self.database_url.starts_with("sqlite:") {
            return Err("Database URL must use the sqlite scheme".to_string());
        }
        if self.jwt_secret.is_empty() {
            return Err("JWT secret cannot be empty".to_string());
        }
        if self.port == 0 {
            return Err("Port must be nonzero".to_string());
        }
        Ok(())
    }
}
