use chrono::{DateTime, Utc};
use postline_core::{Message, User};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const MAX_USERNAME_LEN: usize = 255;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_TITLE_LEN: usize = 255;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let len = self.username.chars().count();
        if len == 0 || len > MAX_USERNAME_LEN {
            return Err(AppError::Validation(format!(
                "username must be 1 to {MAX_USERNAME_LEN} characters"
            )));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// OAuth2 password-grant style form body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: u64,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize { 100 }

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub title: String,
    pub body: String,
    pub recipient_id: i64,
}

impl SendMessageRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::Validation(format!(
                "title must be at most {MAX_TITLE_LEN} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub recipient_id: i64,
    pub title: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

impl MessageResponse {
    pub fn new(message: Message, sender_username: String) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            sender_username,
            recipient_id: message.recipient_id,
            title: message.title,
            body: message.body,
            timestamp: message.timestamp,
            is_read: message.is_read,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub message: &'static str,
}
