//! Intent detection: decide whether a model response proposes a calendar
//! mutation that needs user confirmation, and extract a structured action
//! descriptor from the tool invocation that proposed it.

use chrono::{Duration, SecondsFormat, Utc};
use serde_json::Value;

use calchat_core::types::{ActionType, CalendarAction, EventDetails, new_confirmation_id};

use crate::openai::ModelResponse;

/// Tool-name substrings that mark a mutating calendar tool.
const TOOL_NAME_MARKERS: [&str; 4] = ["create", "update", "delete", "add"];

/// Phrase triggers for the free-text fallback, matched against lower-cased
/// content. Only consulted when the response carries no tool invocations.
const MODIFICATION_KEYWORDS: [&str; 21] = [
    "create event",
    "schedule meeting",
    "add to calendar",
    "delete event",
    "cancel meeting",
    "remove from calendar",
    "reschedule",
    "move meeting",
    "change time",
    "edit event",
    "update meeting",
    "modify event",
    "i can create",
    "i can schedule",
    "i can add",
    "i'll create",
    "i'll schedule",
    "i'll add",
    "would you like me to",
    "shall i create",
    "shall i schedule",
];

const DEFAULT_EVENT_TITLE: &str = "Calendar Event";
const FALLBACK_ASSISTANT_MESSAGE: &str =
    "I can help you with your calendar. What would you like to do?";

/// Whether this response proposes a calendar mutation requiring confirmation.
///
/// Structured tool invocations take precedence: when any are present, only a
/// non-error call whose name contains a mutation marker counts, and the text
/// fallback is not consulted.
pub fn detect_calendar_modification(response: &ModelResponse) -> bool {
    if !response.tool_calls.is_empty() {
        return response.tool_calls.iter().any(is_mutating_call);
    }

    let content = response.content.to_lowercase();
    MODIFICATION_KEYWORDS
        .iter()
        .any(|keyword| content.contains(keyword))
}

fn is_mutating_call(call: &Value) -> bool {
    if call["type"] != "mcp_call" || !call["error"].is_null() {
        return false;
    }
    let name = call["name"].as_str().unwrap_or("").to_lowercase();
    TOOL_NAME_MARKERS.iter().any(|marker| name.contains(marker))
}

/// The assistant text to show the user, with a helpful default when the
/// response carried no text at all.
pub fn message_content(response: &ModelResponse) -> String {
    if response.content.is_empty() {
        FALLBACK_ASSISTANT_MESSAGE.to_string()
    } else {
        response.content.clone()
    }
}

/// Build a [`CalendarAction`] from the first non-error tool invocation that
/// carries output results. Returns None when no such invocation exists or its
/// payloads do not parse — detection returning true with extraction returning
/// None is a valid state (no actionable details available).
pub fn extract_calendar_action(response: &ModelResponse) -> Option<CalendarAction> {
    let call = response.tool_calls.iter().find(|call| {
        call["type"] == "mcp_call" && call["error"].is_null() && !call["output"].is_null()
    })?;

    let output = parse_maybe_json(&call["output"])?;
    if output["results"].is_null() {
        return None;
    }
    let args = parse_maybe_json(&call["arguments"]).unwrap_or(Value::Null);

    let name = call["name"].as_str().unwrap_or("").to_lowercase();
    let action_type = infer_action_type(&name);

    let now = Utc::now();
    // Tool arguments win over tool output, which wins over defaults
    let start_time = string_field(&args, "start__dateTime")
        .or_else(|| output["start"]["dateTime"].as_str().map(str::to_string))
        .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Secs, true));
    let end_time = string_field(&args, "end__dateTime")
        .or_else(|| output["end"]["dateTime"].as_str().map(str::to_string))
        .unwrap_or_else(|| {
            (now + Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Secs, true)
        });
    let title = string_field(&args, "summary")
        .or_else(|| string_field(&args, "text"))
        .unwrap_or_else(|| DEFAULT_EVENT_TITLE.to_string());

    let event = EventDetails {
        id: output["id"].as_str().map(str::to_string),
        title,
        description: string_field(&args, "description"),
        start_time: Some(start_time),
        end_time: Some(end_time),
        location: string_field(&args, "location"),
        attendees: None,
        recurrence: None,
    };

    Some(CalendarAction {
        action_type,
        event,
        confirmation_id: new_confirmation_id(),
        raw_tool_call: Some(call.clone()),
    })
}

fn infer_action_type(tool_name: &str) -> ActionType {
    if tool_name.contains("create") {
        ActionType::Create
    } else if tool_name.contains("update") {
        ActionType::Edit
    } else if tool_name.contains("delete") {
        ActionType::Delete
    } else {
        ActionType::Action
    }
}

/// Tolerate both pre-parsed objects and serialized-text encodings. A string
/// that is not valid JSON yields None.
fn parse_maybe_json(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.clone()),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value[key].as_str().map(str::to_string)
}
