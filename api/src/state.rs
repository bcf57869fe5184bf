use crate::mcp::CalendarClient;
use crate::openai::LlmClient;

#[derive(Clone)]
pub struct AppState {
    pub llm: LlmClient,
    pub calendar: CalendarClient,
}
