//! Persistence collaborator for users and messages.
//!
//! [`Store`] is the seam to a real database. Each call is expected to be
//! transactional on its own; nothing here spans calls. [`InMemoryStore`]
//! backs the server when no database is wired in, and the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub title: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> CoreResult<Option<User>>;

    async fn find_user_by_id(&self, id: i64) -> CoreResult<Option<User>>;

    /// Fails with [`CoreError::Conflict`] if `username` is taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> CoreResult<User>;

    /// Users other than `user_id`, ordered by id.
    async fn list_users_except(&self, user_id: i64, skip: usize, limit: usize)
        -> CoreResult<Vec<User>>;

    /// Stores a new unread message stamped with the current time.
    async fn create_message(
        &self,
        sender_id: i64,
        recipient_id: i64,
        title: &str,
        body: &str,
    ) -> CoreResult<Message>;

    async fn inbox(&self, user_id: i64) -> CoreResult<Vec<Message>>;

    async fn outbox(&self, user_id: i64) -> CoreResult<Vec<Message>>;

    async fn unread_count(&self, user_id: i64) -> CoreResult<u64>;

    /// Marks `message_id` read if `recipient_id` received it; `None` otherwise.
    async fn mark_read(&self, message_id: i64, recipient_id: i64) -> CoreResult<Option<Message>>;
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    messages: Vec<Message>,
}

/// Vec-backed store with sequential ids starting at 1.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find_user_by_username(&self, username: &str) -> CoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> CoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> CoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == username) {
            return Err(CoreError::Conflict("username already registered".to_string()));
        }

        let user = User {
            id: tables.users.len() as i64 + 1,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn list_users_except(
        &self,
        user_id: i64,
        skip: usize,
        limit: usize,
    ) -> CoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| u.id != user_id)
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_message(
        &self,
        sender_id: i64,
        recipient_id: i64,
        title: &str,
        body: &str,
    ) -> CoreResult<Message> {
        let mut tables = self.tables.write().await;
        let message = Message {
            id: tables.messages.len() as i64 + 1,
            sender_id,
            recipient_id,
            title: title.to_string(),
            body: body.to_string(),
            timestamp: Utc::now(),
            is_read: false,
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn inbox(&self, user_id: i64) -> CoreResult<Vec<Message>> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.recipient_id == user_id)
            .cloned()
            .collect())
    }

    async fn outbox(&self, user_id: i64) -> CoreResult<Vec<Message>> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.sender_id == user_id)
            .cloned()
            .collect())
    }

    async fn unread_count(&self, user_id: i64) -> CoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.recipient_id == user_id && !m.is_read)
            .count() as u64)
    }

    async fn mark_read(&self, message_id: i64, recipient_id: i64) -> CoreResult<Option<Message>> {
        let mut tables = self.tables.write().await;
        let Some(message) = tables
            .messages
            .iter_mut()
            .find(|m| m.id == message_id && m.recipient_id == recipient_id)
        else {
            return Ok(None);
        };

        message.is_read = true;
        Ok(Some(message.clone()))
    }
}
