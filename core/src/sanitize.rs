//! Error normalization. Internal failure text (stack traces, provider error
//! bodies, credential hints) stops here; only the fixed set of user-safe
//! strings crosses the API boundary.

/// Map an arbitrary failure message to a user-safe string.
pub fn sanitize_error_message(raw: &str) -> &'static str {
    let lower = raw.to_lowercase();

    if lower.contains("api key") || lower.contains("unauthorized") {
        return "Authentication error. Please check your configuration.";
    }
    if lower.contains("network") || lower.contains("timeout") {
        return "Network error. Please check your connection and try again.";
    }
    if lower.contains("parse") || lower.contains("invalid json") {
        return "Invalid request format. Please try again.";
    }

    "Something went wrong. Please retry."
}

/// Friendly retry-oriented text for throttling and availability failures.
pub fn rate_limit_message(raw: &str) -> &'static str {
    let lower = raw.to_lowercase();

    if lower.contains("rate limit") || lower.contains("429") {
        return "I'm experiencing high demand right now. Please try again in a moment.";
    }
    if lower.contains("unavailable") || lower.contains("503") {
        return "The service is temporarily unavailable. Please try again shortly.";
    }

    "Something went wrong. Please retry."
}

/// How a failed calendar-action execution should be reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionFailureKind {
    /// Re-validation of the action failed (400)
    Validation,
    /// Calendar access authorization failed (401)
    Authorization,
    /// Insufficient permissions on the calendar (403)
    Permission,
    /// The target event does not exist (404)
    NotFound,
    /// Scheduling conflict with the requested slot (409)
    Conflict,
    /// Anything else — sanitized 500
    Other,
}

/// Best-effort classification of a free-text broker failure.
///
/// Checks run in a fixed order and the first match wins, so text containing
/// both "forbidden" and "not found" classifies as Permission. Collaborators
/// with typed errors bypass this entirely; this is the fallback adapter for
/// those that only emit text.
pub fn classify_action_failure(raw: &str) -> ActionFailureKind {
    if raw.contains("Validation failed") {
        return ActionFailureKind::Validation;
    }

    let lower = raw.to_lowercase();
    if lower.contains("authorization") || lower.contains("unauthorized") {
        return ActionFailureKind::Authorization;
    }
    if lower.contains("permissions") || lower.contains("forbidden") {
        return ActionFailureKind::Permission;
    }
    if lower.contains("not found") {
        return ActionFailureKind::NotFound;
    }
    if lower.contains("conflict") || lower.contains("busy") {
        return ActionFailureKind::Conflict;
    }

    ActionFailureKind::Other
}

/// User-facing message for a classified failure. `Validation` and `Other`
/// carry their own text (the joined validation errors, the sanitized
/// fallback) and are not covered here.
pub fn action_failure_message(kind: ActionFailureKind) -> Option<&'static str> {
    match kind {
        ActionFailureKind::Authorization => {
            Some("Calendar access authorization failed. Please check your calendar permissions.")
        }
        ActionFailureKind::Permission => {
            Some("Insufficient permissions to access this calendar.")
        }
        ActionFailureKind::NotFound => {
            Some("The requested calendar event could not be found.")
        }
        ActionFailureKind::Conflict => {
            Some("There is a scheduling conflict with this time slot.")
        }
        ActionFailureKind::Validation | ActionFailureKind::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ActionFailureKind, classify_action_failure, rate_limit_message, sanitize_error_message,
    };

    #[test]
    fn credential_text_never_passes_through() {
        let raw = "Invalid API key sk-abc123 provided for project x";
        let sanitized = sanitize_error_message(raw);
        assert_eq!(
            sanitized,
            "Authentication error. Please check your configuration."
        );
        assert!(!sanitized.contains("sk-abc123"));
    }

    #[test]
    fn network_failures_get_connectivity_message() {
        assert_eq!(
            sanitize_error_message("connection timeout after 30s"),
            "Network error. Please check your connection and try again."
        );
    }

    #[test]
    fn parse_failures_get_format_message() {
        assert_eq!(
            sanitize_error_message("failed to parse response body"),
            "Invalid request format. Please try again."
        );
    }

    #[test]
    fn unknown_failures_get_generic_message() {
        assert_eq!(
            sanitize_error_message("segfault in module foo"),
            "Something went wrong. Please retry."
        );
    }

    #[test]
    fn rate_limit_gets_backoff_message() {
        assert_eq!(
            rate_limit_message("rate limit exceeded"),
            "I'm experiencing high demand right now. Please try again in a moment."
        );
    }

    #[test]
    fn classification_order_is_fixed() {
        assert_eq!(
            classify_action_failure("Validation failed: Event title is required"),
            ActionFailureKind::Validation
        );
        assert_eq!(
            classify_action_failure("request was unauthorized"),
            ActionFailureKind::Authorization
        );
        assert_eq!(
            classify_action_failure("forbidden by calendar policy"),
            ActionFailureKind::Permission
        );
        assert_eq!(
            classify_action_failure("event not found"),
            ActionFailureKind::NotFound
        );
        assert_eq!(
            classify_action_failure("attendee is busy at that time"),
            ActionFailureKind::Conflict
        );
        assert_eq!(
            classify_action_failure("disk full"),
            ActionFailureKind::Other
        );
    }

    #[test]
    fn overlapping_keywords_resolve_by_first_match() {
        // Both "forbidden" and "not found" present: permissions is checked first
        assert_eq!(
            classify_action_failure("forbidden: calendar not found"),
            ActionFailureKind::Permission
        );
    }
}
