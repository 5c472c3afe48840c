use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use postline_core::{Message, MessageNotice, NotificationEvent};

use crate::auth::middleware::AuthUser;
use crate::dto::{MessageResponse, SendMessageRequest, StatusResponse};
use crate::error::AppError;
use crate::state::AppState;

pub async fn send_message(
    user: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    body.validate()?;

    let recipient = state
        .store
        .find_user_by_id(body.recipient_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipient not found".to_string()))?;

    let message = state
        .store
        .create_message(user.id, recipient.id, &body.title, &body.body)
        .await?;

    // The message is committed; from here on nothing may fail the request.
    if state.registry().is_connected(&recipient.username) {
        match state.store.unread_count(recipient.id).await {
            Ok(unread_count) => {
                let event = NotificationEvent::NewMessage {
                    message: MessageNotice::from_message(&message, &user.username, unread_count),
                };
                state.dispatcher.notify(&recipient.username, &event);
            }
            Err(e) => tracing::error!(
                user = %recipient.username,
                "unread count for notification failed: {e}"
            ),
        }
    }

    Ok(Json(MessageResponse::new(message, user.username)))
}

pub async fn inbox(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let messages = state.store.inbox(user.id).await?;
    Ok(Json(with_sender_names(&state, messages).await?))
}

pub async fn outbox(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let messages = state.store.outbox(user.id).await?;
    Ok(Json(
        messages
            .into_iter()
            .map(|m| MessageResponse::new(m, user.username.clone()))
            .collect(),
    ))
}

pub async fn mark_read(
    user: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
) -> Result<Json<StatusResponse>, AppError> {
    state
        .store
        .mark_read(message_id, user.id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Message not found or not addressed to you".to_string())
        })?;

    match state.store.unread_count(user.id).await {
        Ok(unread_count) => {
            let event = NotificationEvent::UnreadCountUpdated { unread_count };
            state.dispatcher.notify(&user.username, &event);
        }
        Err(e) => tracing::error!(
            user = %user.username,
            "unread count for notification failed: {e}"
        ),
    }

    Ok(Json(StatusResponse {
        message: "Message marked as read",
    }))
}

async fn with_sender_names(
    state: &AppState,
    messages: Vec<Message>,
) -> Result<Vec<MessageResponse>, AppError> {
    let mut names: HashMap<i64, String> = HashMap::new();
    let mut out = Vec::with_capacity(messages.len());

    for message in messages {
        let name = match names.get(&message.sender_id) {
            Some(name) => name.clone(),
            None => {
                let name = state
                    .store
                    .find_user_by_id(message.sender_id)
                    .await?
                    .map(|u| u.username)
                    .unwrap_or_default();
                names.insert(message.sender_id, name.clone());
                name
            }
        };
        out.push(MessageResponse::new(message, name));
    }

    Ok(out)
}
