//! Chat proxy to the retrieval-augmented answer service.

use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use medlens_core::validation::domain;
use medlens_core::{AppError, AppResult, AuthInfo, Validate, ValidJson};
use medlens_db::{Assessment, ChatEntry, CreateChatEntryParams, Page};
use medlens_upstream::{ChatRequest, ChatTurn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use super::assessments::accessible_assessment;
use crate::core::AppState;

/// Exchanges sent upstream as conversation context.
const HISTORY_TURNS: i64 = 10;
const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub message: String,
    #[serde(default)]
    pub assessment_id: Option<Uuid>,
}

impl Validate for ChatMessageRequest {
    fn validate(&self) -> Result<(), AppError> {
        domain::validate_chat_message(&self.message)
    }
}

#[derive(Debug, Serialize)]
pub struct ChatMessageResponse {
    pub id: Uuid,
    pub answer: String,
    pub sources: Value,
    pub created_at: DateTime<Utc>,
}

impl From<ChatEntry> for ChatMessageResponse {
    fn from(entry: ChatEntry) -> Self {
        Self {
            id: entry.id,
            answer: entry.response,
            sources: entry.sources,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub assessment_id: Option<Uuid>,
    pub limit: Option<i64>,
}

fn history_turns(entries: Vec<ChatEntry>) -> Vec<ChatTurn> {
    entries
        .into_iter()
        .flat_map(|e| [ChatTurn::user(e.message), ChatTurn::assistant(e.response)])
        .collect()
}

/// Urgent results route the user to a clinician instead of the chat.
fn ensure_chat_available(assessment: &Assessment) -> AppResult<()> {
    if assessment.chat_available {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(
            "Chat is not available for this result".to_string(),
        ))
    }
}

/// `POST /api/chat`
#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthInfo,
    ValidJson(req): ValidJson<ChatMessageRequest>,
) -> AppResult<Json<ChatMessageResponse>> {
    let message = req.message.trim();

    let assessment = match req.assessment_id {
        Some(id) => {
            let assessment = accessible_assessment(&state, &auth, id, "chat about this assessment").await?;
            ensure_chat_available(&assessment)?;
            Some(assessment)
        }
        None => None,
    };

    let previous = state
        .db()
        .chat
        .recent_entries(auth.user_id, req.assessment_id, HISTORY_TURNS)
        .await?;

    let answer = state
        .chat()
        .ask(&ChatRequest {
            question: message,
            disease: assessment.as_ref().map(|a| a.display_name.as_str()),
            urgency: assessment.as_ref().map(|a| a.urgency.as_str()),
            history: history_turns(previous),
        })
        .await?;

    let sources = Value::Array(answer.sources);
    let entry = state
        .db()
        .chat
        .create_entry(CreateChatEntryParams {
            user_id: auth.user_id,
            assessment_id: req.assessment_id,
            message,
            response: &answer.answer,
            sources: &sources,
        })
        .await?;

    info!(chat_id = %entry.id, assessment_id = ?entry.assessment_id, "Chat exchange stored");
    metrics::counter!(
        "chat_messages_total",
        "context" => if assessment.is_some() { "assessment" } else { "general" }
    )
    .increment(1);

    Ok(Json(entry.into()))
}

/// `GET /api/chat/history`
#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn chat_history(
    State(state): State<AppState>,
    auth: AuthInfo,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<ChatEntry>>> {
    let page = Page::clamped(query.limit, None, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
    let entries = state
        .db()
        .chat
        .history(auth.user_id, query.assessment_id, page.limit)
        .await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str, response: &str) -> ChatEntry {
        ChatEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            assessment_id: None,
            message: message.to_string(),
            response: response.to_string(),
            sources: Value::Array(vec![]),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn history_alternates_roles_in_order() {
        let turns = history_turns(vec![entry("q1", "a1"), entry("q2", "a2")]);
        let roles: Vec<_> = turns.iter().map(|t| t.role).collect();
        let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(roles, ["user", "assistant", "user", "assistant"]);
        assert_eq!(contents, ["q1", "a1", "q2", "a2"]);
    }

    #[test]
    fn blank_message_is_rejected() {
        let req = ChatMessageRequest {
            message: "   ".to_string(),
            assessment_id: None,
        };
        assert!(matches!(req.validate(), Err(AppError::InvalidArgument(_))));
    }

    fn assessment(chat_available: bool) -> Assessment {
        Assessment {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            predicted_label: "Melanoma".to_string(),
            normalized_label: "melanoma".to_string(),
            display_name: "Melanoma".to_string(),
            confidence: 0.95,
            urgency: "emergency".to_string(),
            low_confidence: false,
            chat_available,
            raw_prediction: Value::Null,
            image_filename: None,
            image_content_type: "image/jpeg".to_string(),
            image_size_bytes: 1024,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn chat_is_refused_when_result_disables_it() {
        assert!(ensure_chat_available(&assessment(true)).is_ok());
        match ensure_chat_available(&assessment(false)) {
            Err(AppError::PermissionDenied(msg)) => {
                assert_eq!(msg, "Chat is not available for this result");
            }
            other => panic!("expected PermissionDenied, got {other:?}"),
        }
    }

    #[test]
    fn response_uses_stored_answer() {
        let stored = entry("What is a nevus?", "A mole.");
        let id = stored.id;
        let response = ChatMessageResponse::from(stored);
        assert_eq!(response.id, id);
        assert_eq!(response.answer, "A mole.");
    }
}
