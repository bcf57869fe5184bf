use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in a conversation transcript. Messages are immutable once
/// appended; the transcript lives in the client session, the server keeps no
/// conversation state beyond the model-side continuation token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Model-side response id, used to continue the conversation upstream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    /// Set when this message reports a failed exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            response_id: None,
            error: None,
        }
    }
}

/// What kind of calendar mutation an action performs.
///
/// `Read` is never produced by extraction but is recognized by validation
/// (no time fields required). `Action` is the generic type minted when a tool
/// name matches none of the known verbs; it validates like a mutation but
/// cannot be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Create,
    Edit,
    Delete,
    Reschedule,
    Read,
    Action,
}

impl ActionType {
    /// Whether start/end times are required for this action to validate.
    pub fn requires_times(self) -> bool {
        !matches!(self, ActionType::Delete | ActionType::Read)
    }

    /// Past-tense verb for success messages, None for types that cannot
    /// be executed.
    pub fn executed_verb(self) -> Option<&'static str> {
        match self {
            ActionType::Create => Some("created"),
            ActionType::Edit => Some("updated"),
            ActionType::Delete => Some("deleted"),
            ActionType::Reschedule => Some("rescheduled"),
            ActionType::Read | ActionType::Action => None,
        }
    }
}

/// A proposed calendar mutation awaiting user confirmation.
///
/// Produced by intent extraction, consumed exactly once by the confirmation
/// endpoint. The `confirmation_id` binds one proposed action to one
/// confirmation round-trip; the client clears its pending slot after a single
/// response, the server does not track ids.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub event: EventDetails,
    pub confirmation_id: String,
    /// The tool invocation this action was extracted from, kept for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_tool_call: Option<serde_json::Value>,
}

/// Event fields carried by a calendar action. Start/end are ISO-8601 instants;
/// both optional at the type level so validation can report which is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceRule>,
}

/// Recurrence descriptor. Carried through to the calendar broker verbatim,
/// not validated against the other event fields.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Mint a fresh confirmation id binding a proposed action to one
/// confirmation round-trip.
pub fn new_confirmation_id() -> String {
    Uuid::new_v4().to_string()
}
