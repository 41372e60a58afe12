//! Demo conversation endpoints
//!
//! A minimal agent-style surface that sits behind the API key middleware.
//! The message handler reports its token usage and cost through response
//! headers, which the middleware picks up for usage accounting.

use axum::{http::header::HeaderName, Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::{ApiKeyIdentity, COST_USD_HEADER, TOKEN_COUNT_HEADER};

/// Flat per-token price used by the demo responder.
const COST_PER_TOKEN_USD: f64 = 0.00002;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    /// Optional display title for the conversation
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct CreateConversationResponse {
    pub conversation_id: String,
    pub title: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct SendMessageResponse {
    pub conversation_id: String,
    pub reply: String,
    pub tokens_used: u64,
    pub cost_usd: f64,
}

/// Create a new conversation
///
/// POST /api/conversation/create
pub async fn create_conversation(
    identity: Option<Extension<ApiKeyIdentity>>,
    Json(request): Json<CreateConversationRequest>,
) -> Json<CreateConversationResponse> {
    let conversation_id = format!("conv_{}", &Uuid::new_v4().simple().to_string()[..12]);

    tracing::info!(
        conversation_id = %conversation_id,
        authenticated = identity.is_some(),
        "Conversation created"
    );

    Json(CreateConversationResponse {
        conversation_id,
        title: request.title,
        created_by: identity.map(|Extension(id)| id.user_id),
    })
}

/// Send a message to a conversation
///
/// POST /api/conversation/message
///
/// Echo responder standing in for a real agent backend. Usage headers are
/// set on the response so the accounting middleware can record them.
pub async fn send_message(
    identity: Option<Extension<ApiKeyIdentity>>,
    Json(request): Json<SendMessageRequest>,
) -> Result<([(HeaderName, String); 2], Json<SendMessageResponse>), ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::InvalidRequest("message must not be empty".into()));
    }

    let reply = format!("Echo: {}", request.message);

    // Rough 4-chars-per-token estimate over prompt plus reply
    let tokens_used = ((request.message.len() + reply.len()) / 4).max(1) as u64;
    let cost_usd = tokens_used as f64 * COST_PER_TOKEN_USD;

    tracing::debug!(
        conversation_id = %request.conversation_id,
        tokens_used,
        authenticated = identity.is_some(),
        "Message handled"
    );

    let headers = [
        (
            HeaderName::from_static(TOKEN_COUNT_HEADER),
            tokens_used.to_string(),
        ),
        (
            HeaderName::from_static(COST_USD_HEADER),
            format!("{cost_usd:.6}"),
        ),
    ];

    Ok((
        headers,
        Json(SendMessageResponse {
            conversation_id: request.conversation_id,
            reply,
            tokens_used,
            cost_usd,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn message_reports_usage_headers() {
        let request = SendMessageRequest {
            conversation_id: "conv_abc123".to_string(),
            message: "hello there".to_string(),
        };

        let (headers, Json(body)) = send_message(None, Json(request)).await.unwrap();

        assert_eq!(body.reply, "Echo: hello there");
        assert!(body.tokens_used > 0);
        assert_eq!(headers[0].1, body.tokens_used.to_string());
        assert_eq!(headers[1].1, format!("{:.6}", body.cost_usd));
    }

    #[tokio::test]
    async fn empty_message_rejected() {
        let request = SendMessageRequest {
            conversation_id: "conv_abc123".to_string(),
            message: "   ".to_string(),
        };

        assert!(send_message(None, Json(request)).await.is_err());
    }

    #[tokio::test]
    async fn create_returns_prefixed_id() {
        let Json(body) = create_conversation(
            None,
            Json(CreateConversationRequest {
                title: Some("demo".to_string()),
            }),
        )
        .await;

        assert!(body.conversation_id.starts_with("conv_"));
        assert_eq!(body.conversation_id.len(), "conv_".len() + 12);
        assert_eq!(body.title.as_deref(), Some("demo"));
        assert!(body.created_by.is_none());
    }
}
