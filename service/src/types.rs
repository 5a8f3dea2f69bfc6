use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub spending: f64,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BonusLevel {
    pub id: i64,
    pub level_name: String,
    pub min_spending: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub msg: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextLevel {
    pub level_name: String,
    /// Spending still needed to reach this level, not its absolute threshold.
    pub min_spending: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BonusResponse {
    pub current_level: String,
    pub spending: f64,
    pub next_level: Option<NextLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpendingRequest {
    #[serde(default)]
    pub spending_amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpendingResponse {
    pub msg: String,
    pub new_spending: f64,
    pub new_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_response_construction() {
        let response = MessageResponse::new("User registered successfully");
        assert_eq!(response.msg, "User registered successfully");
    }

    #[test]
    fn test_spending_request_defaults_to_zero() {
        let request: SpendingRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.spending_amount, 0.0);
    }

    #[test]
    fn test_bonus_response_serializes_null_next_level() {
        let response = BonusResponse {
            current_level: "Platinum".to_string(),
            spending: 12000.0,
            next_level: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["next_level"].is_null());
    }
}
