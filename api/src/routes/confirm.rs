use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

use calchat_core::error::ApiError;
use calchat_core::types::{ActionType, CalendarAction};
use calchat_core::validate::validate_calendar_action;

use crate::error::AppError;
use crate::mcp::McpExecuteResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/calendar/confirm",
        post(confirm_action).get(confirmation_health),
    )
}

/// The user's decision on a pending calendar action.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequest {
    /// Token binding this decision to one proposed action
    pub confirmation_id: String,
    /// "accept" or "reject"
    pub action: String,
    /// The proposed action, echoed back from the conversation response
    pub calendar_action: CalendarAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Accept,
    Reject,
}

/// Decompose the request body by hand so missing or malformed fields produce
/// the contract's 400 rather than an extractor rejection.
fn parse_confirmation_request(body: &Value) -> Result<(ConfirmationRequest, Decision), AppError> {
    let has_all = ["confirmationId", "action", "calendarAction"]
        .iter()
        .all(|key| body.get(*key).is_some_and(|v| !v.is_null()));
    if !has_all {
        return Err(AppError::Validation {
            message: "Missing required fields: confirmationId, action, and calendarAction"
                .to_string(),
            field: None,
        });
    }

    let request: ConfirmationRequest =
        serde_json::from_value(body.clone()).map_err(|err| AppError::Validation {
            message: format!("Invalid confirmation request: {err}"),
            field: Some("calendarAction".to_string()),
        })?;

    let decision = match request.action.as_str() {
        "accept" => Decision::Accept,
        "reject" => Decision::Reject,
        _ => {
            return Err(AppError::Validation {
                message: "Action must be either \"accept\" or \"reject\"".to_string(),
                field: Some("action".to_string()),
            });
        }
    };

    Ok((request, decision))
}

/// "Successfully created event \"Standup\"" and friends. None for action
/// types that cannot be executed.
fn success_message(action: &CalendarAction) -> Option<String> {
    action
        .action_type
        .executed_verb()
        .map(|verb| format!("Successfully {verb} event \"{}\"", action.event.title))
}

/// Event id for the result payload: a created event gets the broker-assigned
/// id (or a synthetic fallback), everything else targets an existing event.
fn result_event_id(action: &CalendarAction, data: Option<&Value>) -> String {
    match action.action_type {
        ActionType::Create => data
            .and_then(|d| d["id"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("event_{}", Utc::now().timestamp_millis())),
        _ => action.event.id.clone().unwrap_or_default(),
    }
}

/// Decide on a pending calendar action
///
/// Reject discards the action without touching the calendar broker. Accept
/// re-validates the action, checks broker liveness, executes, and reports a
/// type-specific success message.
#[utoipa::path(
    post,
    path = "/api/calendar/confirm",
    request_body = ConfirmationRequest,
    responses(
        (status = 200, description = "Action rejected or executed"),
        (status = 400, description = "Missing fields, invalid action, or validation failure", body = ApiError),
        (status = 401, description = "Calendar authorization failed", body = ApiError),
        (status = 403, description = "Insufficient calendar permissions", body = ApiError),
        (status = 404, description = "Event not found", body = ApiError),
        (status = 409, description = "Scheduling conflict", body = ApiError),
        (status = 503, description = "Calendar service unreachable", body = ApiError)
    ),
    tag = "confirmation"
)]
pub async fn confirm_action(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let (request, decision) = parse_confirmation_request(&body)?;

    tracing::info!(
        confirmation_id = %request.confirmation_id,
        decision = ?decision,
        action_type = ?request.calendar_action.action_type,
        "confirmation decision received"
    );

    if decision == Decision::Reject {
        return Ok(Json(json!({
            "success": true,
            "message": "Calendar action cancelled",
            "action": "rejected"
        })));
    }

    let action = request.calendar_action;

    let errors = validate_calendar_action(&action);
    if !errors.is_empty() {
        return Err(AppError::Validation {
            message: format!("Validation failed: {}", errors.join(", ")),
            field: None,
        });
    }

    if !state.calendar.check_health().await {
        return Err(AppError::UpstreamUnavailable(
            "Calendar service is currently unavailable. Please try again later.".to_string(),
        ));
    }

    let verdict: McpExecuteResponse = state.calendar.execute_action(&action).await?;

    let message = success_message(&action).ok_or_else(|| {
        AppError::Internal(format!(
            "Unknown calendar action type: {:?}",
            action.action_type
        ))
    })?;
    let event_id = result_event_id(&action, verdict.data.as_ref());

    Ok(Json(json!({
        "success": true,
        "message": message,
        "result": {
            "event_id": event_id,
            "action": action.action_type,
            "event": action.event,
            "calendar_data": verdict.data
        }
    })))
}

/// Confirmation-service health, including broker reachability
///
/// Degraded (503) when the calendar broker cannot be reached.
#[utoipa::path(
    get,
    path = "/api/calendar/confirm",
    responses(
        (status = 200, description = "Broker reachable"),
        (status = 503, description = "Broker unreachable")
    ),
    tag = "confirmation"
)]
pub async fn confirmation_health(State(state): State<AppState>) -> impl IntoResponse {
    let mcp_ok = state.calendar.check_health().await;

    let status = if mcp_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if mcp_ok { "ok" } else { "degraded" },
            "service": "calendar-confirmation",
            "mcp_status": if mcp_ok { "connected" } else { "disconnected" },
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::{Decision, parse_confirmation_request, result_event_id, success_message};
    use calchat_core::types::{ActionType, CalendarAction, EventDetails};
    use serde_json::json;

    fn action(action_type: ActionType) -> CalendarAction {
        CalendarAction {
            action_type,
            event: EventDetails {
                id: Some("evt_9".to_string()),
                title: "Quarterly Review".to_string(),
                start_time: Some("2024-01-02T09:00:00Z".to_string()),
                end_time: Some("2024-01-02T10:00:00Z".to_string()),
                ..Default::default()
            },
            confirmation_id: "c1".to_string(),
            raw_tool_call: None,
        }
    }

    fn valid_body() -> serde_json::Value {
        json!({
            "confirmationId": "c1",
            "action": "accept",
            "calendarAction": action(ActionType::Create)
        })
    }

    #[test]
    fn missing_fields_are_rejected_with_one_message() {
        for key in ["confirmationId", "action", "calendarAction"] {
            let mut body = valid_body();
            body.as_object_mut().unwrap().remove(key);
            let err = parse_confirmation_request(&body).unwrap_err();
            let text = format!("{err:?}");
            assert!(text.contains("Missing required fields"), "missing {key}: {text}");
        }
    }

    #[test]
    fn invalid_decision_verb_is_rejected() {
        let mut body = valid_body();
        body["action"] = json!("maybe");
        let err = parse_confirmation_request(&body).unwrap_err();
        assert!(format!("{err:?}").contains("accept"));
    }

    #[test]
    fn accept_and_reject_parse_to_decisions() {
        let (_, decision) = parse_confirmation_request(&valid_body()).unwrap();
        assert_eq!(decision, Decision::Accept);

        let mut body = valid_body();
        body["action"] = json!("reject");
        let (_, decision) = parse_confirmation_request(&body).unwrap();
        assert_eq!(decision, Decision::Reject);
    }

    #[test]
    fn success_messages_are_type_specific() {
        assert_eq!(
            success_message(&action(ActionType::Create)).unwrap(),
            "Successfully created event \"Quarterly Review\""
        );
        assert_eq!(
            success_message(&action(ActionType::Reschedule)).unwrap(),
            "Successfully rescheduled event \"Quarterly Review\""
        );
        assert!(success_message(&action(ActionType::Action)).is_none());
    }

    #[test]
    fn created_events_take_the_broker_assigned_id() {
        let data = json!({"id": "evt_new"});
        assert_eq!(
            result_event_id(&action(ActionType::Create), Some(&data)),
            "evt_new"
        );
        assert_eq!(
            result_event_id(&action(ActionType::Edit), Some(&data)),
            "evt_9"
        );
    }

    #[test]
    fn created_events_fall_back_to_synthetic_id() {
        let id = result_event_id(&action(ActionType::Create), None);
        assert!(id.starts_with("event_"));
    }
}
