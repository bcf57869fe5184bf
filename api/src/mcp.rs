//! Calendar-automation broker client. The broker executes confirmed calendar
//! actions and exposes a liveness probe; the same configuration feeds the MCP
//! tool entry handed to the language model.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};

use calchat_core::types::CalendarAction;

use crate::config::{McpConfig, McpTools};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const EXECUTE_TIMEOUT: Duration = Duration::from_secs(30);
const MCP_SERVER_LABEL: &str = "zapier";
const USER_AGENT: &str = "CalChat/0.1";

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("calendar tools are not configured")]
    NotConfigured,
    /// Request never produced a broker verdict (network, bad response body)
    #[error("calendar service request failed: {0}")]
    Transport(String),
    /// The broker reported failure; text is classified downstream
    #[error("{0}")]
    Failed(String),
}

/// Broker verdict for one executed action.
#[derive(Debug, Deserialize)]
pub struct McpExecuteResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct CalendarClient {
    http: reqwest::Client,
    tools: McpTools,
}

impl CalendarClient {
    pub fn new(tools: McpTools) -> Self {
        Self {
            http: reqwest::Client::new(),
            tools,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.tools.is_configured()
    }

    /// MCP tool entry for the language-model request tools list.
    pub fn tool_param(&self) -> Option<Value> {
        let McpTools::Configured(cfg) = &self.tools else {
            return None;
        };
        Some(json!({
            "type": "mcp",
            "server_label": MCP_SERVER_LABEL,
            "server_url": cfg.server_url.as_str(),
            "require_approval": "never",
            "headers": {
                "Authorization": format!("Bearer {}", cfg.api_key),
                "User-Agent": USER_AGENT,
            },
        }))
    }

    /// Liveness probe. False when unconfigured or unreachable; never errors.
    pub async fn check_health(&self) -> bool {
        let McpTools::Configured(cfg) = &self.tools else {
            return false;
        };
        self.http
            .get(endpoint(cfg, "health"))
            .bearer_auth(&cfg.api_key)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map(|resp| resp.status().is_success())
            .unwrap_or(false)
    }

    /// Execute a confirmed calendar action. A broker-reported failure becomes
    /// [`McpError::Failed`] carrying the broker's error text.
    pub async fn execute_action(
        &self,
        action: &CalendarAction,
    ) -> Result<McpExecuteResponse, McpError> {
        let McpTools::Configured(cfg) = &self.tools else {
            return Err(McpError::NotConfigured);
        };

        let resp = self
            .http
            .post(endpoint(cfg, "execute"))
            .bearer_auth(&cfg.api_key)
            .header("User-Agent", USER_AGENT)
            .timeout(EXECUTE_TIMEOUT)
            .json(action)
            .send()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        let verdict: McpExecuteResponse = resp
            .json()
            .await
            .map_err(|e| McpError::Transport(format!("parse: {e}")))?;

        if !verdict.success {
            let text = verdict
                .error
                .unwrap_or_else(|| "Calendar action failed".to_string());
            tracing::warn!("calendar broker rejected action: {}", text);
            return Err(McpError::Failed(text));
        }

        Ok(verdict)
    }
}

fn endpoint(cfg: &McpConfig, path: &str) -> String {
    format!("{}/{}", cfg.server_url.as_str().trim_end_matches('/'), path)
}
