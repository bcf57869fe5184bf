use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::post;
use axum::{Json, Router};
use futures::stream::{self, Stream};
use futures::{StreamExt, future};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use calchat_core::error::ApiError;
use calchat_core::types::CalendarAction;

use crate::error::AppError;
use crate::intent::{detect_calendar_modification, extract_calendar_action, message_content};
use crate::openai::ResponseParams;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/chat", post(send_message).get(stream_message))
}

/// System instruction set for the conversation endpoint. The model reads
/// calendar data directly but must flag mutations for confirmation in
/// natural language.
const SYSTEM_INSTRUCTIONS: &str = "You are a helpful calendar assistant.\n\
- For reading calendar information (checking availability, viewing events, analyzing schedules), respond directly with the information.\n\
- For calendar modifications (create, edit, delete, reschedule events), always indicate that confirmation is required by using phrases like \"I can help you create this event\" or \"I can schedule this meeting for you\" and include the event details.\n\
- Provide clear, concise responses about calendar management and productivity.\n\
- When suggesting calendar changes, explain the benefits clearly.\n\
- Always be helpful and professional.\n\
- If you need to perform calendar actions, use the calendar tool with appropriate parameters.\n\
\n\
Examples of responses that require confirmation:\n\
- \"I can create a meeting titled 'Team Standup' for tomorrow at 9 AM. Would you like me to add this to your calendar?\"\n\
- \"I can schedule your 'Doctor Appointment' for Friday at 2 PM. Shall I create this event?\"\n\
\n\
Examples of responses that don't require confirmation:\n\
- \"You have 3 meetings scheduled for today: Team Standup at 9 AM, Project Review at 2 PM, and Client Call at 4 PM.\"\n\
- \"Your calendar shows you're free from 10 AM to 12 PM tomorrow.\"";

/// Shorter instruction set for the streaming path, which never runs intent
/// detection and therefore needs no confirmation-phrase examples.
const STREAMING_INSTRUCTIONS: &str = "You are a helpful calendar assistant.\n\
- For reading calendar information, respond directly with the information.\n\
- For calendar modifications, always indicate that confirmation is required.\n\
- Provide clear, concise responses about calendar management and productivity.\n\
- When suggesting calendar changes, explain the benefits clearly.\n\
- Always be helpful and professional.";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    /// Model-side continuation token from the previous turn
    #[serde(default)]
    pub previous_response_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Response id — pass back as previousResponseId to continue the thread
    pub id: String,
    pub message: String,
    pub requires_confirmation: bool,
    /// Present when the response proposes a calendar mutation with
    /// actionable details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_action: Option<CalendarAction>,
}

/// One conversation turn
///
/// Forwards the message to the language model (with the calendar tool when
/// configured), detects proposed calendar mutations, and returns the
/// assistant text plus an optional pending action for confirmation.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatResponse),
        (status = 400, description = "Empty message", body = ApiError),
        (status = 429, description = "Upstream rate limited", body = ApiError),
        (status = 500, description = "Configuration or internal error", body = ApiError)
    ),
    tag = "conversation"
)]
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::Validation {
            message: "Message is required".to_string(),
            field: Some("message".to_string()),
        });
    }

    if !state.calendar.is_configured() {
        tracing::warn!("calendar tools unconfigured; answering without them");
    }

    let response = state
        .llm
        .create_response(&ResponseParams {
            input: message,
            instructions: SYSTEM_INSTRUCTIONS,
            previous_response_id: req.previous_response_id.as_deref(),
        })
        .await?;

    let requires_confirmation = detect_calendar_modification(&response);
    let calendar_action = if requires_confirmation {
        extract_calendar_action(&response)
    } else {
        None
    };

    tracing::info!(
        response_id = %response.id,
        requires_confirmation,
        has_action = calendar_action.is_some(),
        "conversation turn completed"
    );

    let message = message_content(&response);

    Ok(Json(ChatResponse {
        id: response.id,
        message,
        requires_confirmation,
        calendar_action,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub previous_response_id: Option<String>,
}

/// Streaming conversation turn. Emits `{content}` chunks as server-sent
/// events, a sanitized `{error}` event on mid-stream failure, and a `[DONE]`
/// sentinel at the end. Intent detection does not run on this path.
pub async fn stream_message(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let message = query.message.unwrap_or_default().trim().to_string();
    if message.is_empty() {
        return Err(AppError::Validation {
            message: "Message is required".to_string(),
            field: Some("message".to_string()),
        });
    }

    let deltas = state
        .llm
        .create_streaming_response(&ResponseParams {
            input: &message,
            instructions: STREAMING_INSTRUCTIONS,
            previous_response_id: query.previous_response_id.as_deref(),
        })
        .await?;

    let events = deltas
        .map(|chunk| {
            let event = match chunk {
                Ok(text) => sse_json(json!({ "content": text })),
                Err(err) => sse_json(json!({ "error": err.user_message() })),
            };
            Ok::<_, Infallible>(event)
        })
        .chain(stream::once(future::ready(Ok(
            Event::default().data("[DONE]")
        ))));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn sse_json(value: serde_json::Value) -> Event {
    // Serializing a Value cannot fail; the fallback satisfies the signature
    Event::default()
        .json_data(&value)
        .unwrap_or_else(|_| Event::default().data("{}"))
}

#[cfg(test)]
mod tests {
    use super::{ChatRequest, ChatResponse};
    use crate::intent::message_content;
    use crate::openai::ModelResponse;
    use serde_json::json;

    #[test]
    fn response_assembly_reads_text_before_consuming_the_id() {
        let model = ModelResponse {
            id: "resp_9".to_string(),
            content: String::new(),
            tool_calls: vec![],
            finish_reason: "completed".to_string(),
        };

        // Same order as the handler: the text is taken first, then the id
        let message = message_content(&model);
        let resp = ChatResponse {
            id: model.id,
            message,
            requires_confirmation: false,
            calendar_action: None,
        };

        assert_eq!(resp.id, "resp_9");
        assert_eq!(
            resp.message,
            "I can help you with your calendar. What would you like to do?"
        );
    }

    #[test]
    fn chat_request_accepts_wire_field_names() {
        let req: ChatRequest = serde_json::from_value(json!({
            "message": "what's on my calendar?",
            "previousResponseId": "resp_abc"
        }))
        .unwrap();
        assert_eq!(req.previous_response_id.as_deref(), Some("resp_abc"));

        let req: ChatRequest =
            serde_json::from_value(json!({ "message": "hello" })).unwrap();
        assert!(req.previous_response_id.is_none());
    }

    #[test]
    fn chat_response_omits_absent_action() {
        let resp = ChatResponse {
            id: "resp_1".to_string(),
            message: "hi".to_string(),
            requires_confirmation: false,
            calendar_action: None,
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["requiresConfirmation"], false);
        assert!(value.get("calendarAction").is_none());
    }
}
