use chrono::{DateTime, FixedOffset};

use crate::types::CalendarAction;

/// Validate a proposed calendar action before execution.
///
/// Returns the list of all violations — rules do not short-circuit, so a
/// request missing both times reports both. An empty list means valid.
/// Deterministic and side-effect free.
pub fn validate_calendar_action(action: &CalendarAction) -> Vec<String> {
    let mut errors = Vec::new();

    if action.event.title.trim().is_empty() {
        errors.push("Event title is required".to_string());
    }

    if action.action_type.requires_times() {
        if action.event.start_time.is_none() {
            errors.push("Start time is required".to_string());
        }
        if action.event.end_time.is_none() {
            errors.push("End time is required".to_string());
        }

        if let (Some(start), Some(end)) = (&action.event.start_time, &action.event.end_time) {
            match (parse_instant(start), parse_instant(end)) {
                (Some(start), Some(end)) => {
                    if start >= end {
                        errors.push("End time must be after start time".to_string());
                    }
                }
                _ => errors.push("Invalid date format for start or end time".to_string()),
            }
        }
    }

    errors
}

fn parse_instant(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

#[cfg(test)]
mod tests {
    use super::validate_calendar_action;
    use crate::types::{ActionType, CalendarAction, EventDetails};

    fn action(action_type: ActionType, event: EventDetails) -> CalendarAction {
        CalendarAction {
            action_type,
            event,
            confirmation_id: "test-confirmation".to_string(),
            raw_tool_call: None,
        }
    }

    #[test]
    fn blank_title_is_reported() {
        let errors = validate_calendar_action(&action(
            ActionType::Create,
            EventDetails {
                title: "  ".to_string(),
                start_time: Some("2024-01-02T09:00:00Z".to_string()),
                end_time: Some("2024-01-02T10:00:00Z".to_string()),
                ..Default::default()
            },
        ));
        assert_eq!(errors, vec!["Event title is required".to_string()]);
    }

    #[test]
    fn end_before_start_is_reported() {
        let errors = validate_calendar_action(&action(
            ActionType::Create,
            EventDetails {
                title: "X".to_string(),
                start_time: Some("2024-01-02T10:00:00Z".to_string()),
                end_time: Some("2024-01-02T09:00:00Z".to_string()),
                ..Default::default()
            },
        ));
        assert_eq!(errors, vec!["End time must be after start time".to_string()]);
    }

    #[test]
    fn equal_start_and_end_is_rejected() {
        let errors = validate_calendar_action(&action(
            ActionType::Edit,
            EventDetails {
                title: "X".to_string(),
                start_time: Some("2024-01-02T10:00:00Z".to_string()),
                end_time: Some("2024-01-02T10:00:00Z".to_string()),
                ..Default::default()
            },
        ));
        assert_eq!(errors, vec!["End time must be after start time".to_string()]);
    }

    #[test]
    fn delete_needs_no_times() {
        let errors = validate_calendar_action(&action(
            ActionType::Delete,
            EventDetails {
                title: "X".to_string(),
                ..Default::default()
            },
        ));
        assert!(errors.is_empty());
    }

    #[test]
    fn missing_times_are_both_reported() {
        let errors = validate_calendar_action(&action(
            ActionType::Create,
            EventDetails {
                title: "X".to_string(),
                ..Default::default()
            },
        ));
        assert_eq!(
            errors,
            vec![
                "Start time is required".to_string(),
                "End time is required".to_string(),
            ]
        );
    }

    #[test]
    fn unparseable_times_are_reported_once() {
        let errors = validate_calendar_action(&action(
            ActionType::Create,
            EventDetails {
                title: "X".to_string(),
                start_time: Some("tomorrow at 9".to_string()),
                end_time: Some("2024-01-02T10:00:00Z".to_string()),
                ..Default::default()
            },
        ));
        assert_eq!(
            errors,
            vec!["Invalid date format for start or end time".to_string()]
        );
    }

    #[test]
    fn rules_accumulate_instead_of_short_circuiting() {
        let errors = validate_calendar_action(&action(
            ActionType::Create,
            EventDetails::default(),
        ));
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&"Event title is required".to_string()));
    }

    #[test]
    fn valid_create_passes() {
        let errors = validate_calendar_action(&action(
            ActionType::Create,
            EventDetails {
                title: "Team Standup".to_string(),
                start_time: Some("2024-01-02T09:00:00Z".to_string()),
                end_time: Some("2024-01-02T11:30:00+01:00".to_string()),
                ..Default::default()
            },
        ));
        assert!(errors.is_empty());
    }
}
