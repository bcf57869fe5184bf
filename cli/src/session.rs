use calchat_core::types::{CalendarAction, ChatMessage, Role};

/// Client-side conversation state: the transcript, the model-side
/// continuation token, and the single pending-action slot.
///
/// At most one unconfirmed calendar action exists per session; new input is
/// refused while one is outstanding, mirroring how the confirmation dialog
/// disables the input box.
pub struct ChatSession {
    transcript: Vec<ChatMessage>,
    previous_response_id: Option<String>,
    pending: Option<CalendarAction>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            transcript: Vec::new(),
            previous_response_id: None,
            pending: None,
        }
    }

    pub fn can_send(&self) -> bool {
        self.pending.is_none()
    }

    pub fn previous_response_id(&self) -> Option<&str> {
        self.previous_response_id.as_deref()
    }

    /// Remove and return the pending action; the slot is free afterwards.
    pub fn take_pending(&mut self) -> Option<CalendarAction> {
        self.pending.take()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Append a user message. Fails while a confirmation is outstanding.
    pub fn record_user(&mut self, content: &str) -> Result<(), &'static str> {
        if !self.can_send() {
            return Err("A calendar action is awaiting confirmation");
        }
        self.transcript.push(ChatMessage::new(Role::User, content));
        Ok(())
    }

    /// Append an assistant reply, advance the continuation token, and fill
    /// the pending slot when the reply proposes a calendar action.
    pub fn record_assistant(
        &mut self,
        response_id: &str,
        content: &str,
        action: Option<CalendarAction>,
    ) {
        let mut message = ChatMessage::new(Role::Assistant, content);
        message.response_id = Some(response_id.to_string());
        self.transcript.push(message);
        self.previous_response_id = Some(response_id.to_string());
        self.pending = action;
    }

    /// Append an error-flagged assistant message for a failed exchange.
    pub fn record_error(&mut self, content: &str) {
        let mut message = ChatMessage::new(Role::Assistant, content);
        message.error = Some(true);
        self.transcript.push(message);
    }
}
