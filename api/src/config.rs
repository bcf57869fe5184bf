use url::Url;

/// Language-model collaborator configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
}

impl OpenAiConfig {
    /// Read from `OPENAI_API_KEY` (required) and `CALCHAT_MODEL`
    /// (default `gpt-4o`).
    pub fn from_env() -> Result<Self, String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| "OPENAI_API_KEY environment variable is required".to_string())?;
        if api_key.trim().is_empty() {
            return Err("OPENAI_API_KEY environment variable is required".to_string());
        }

        let model = std::env::var("CALCHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        Ok(Self { api_key, model })
    }
}

/// Calendar-automation broker configuration.
#[derive(Debug, Clone)]
pub struct McpConfig {
    pub server_url: Url,
    pub api_key: String,
}

/// Calendar tooling availability. Absence of configuration is a real state,
/// not a nullable client: the chat path runs without calendar tools, the
/// confirmation path fails closed.
#[derive(Debug, Clone)]
pub enum McpTools {
    Configured(McpConfig),
    Unconfigured,
}

impl McpTools {
    /// Read from `ZAPIER_MCP_URL` and `ZAPIER_MCP_API_KEY`. Missing or
    /// invalid values log a warning and disable calendar tools rather than
    /// failing startup.
    pub fn from_env() -> Self {
        let api_key = std::env::var("ZAPIER_MCP_API_KEY").ok().filter(|k| !k.is_empty());
        let server_url = std::env::var("ZAPIER_MCP_URL").ok().filter(|u| !u.is_empty());

        match (api_key, server_url) {
            (Some(api_key), Some(raw_url)) => match Url::parse(&raw_url) {
                Ok(server_url) => Self::Configured(McpConfig {
                    server_url,
                    api_key,
                }),
                Err(err) => {
                    tracing::warn!(
                        "ZAPIER_MCP_URL is not a valid URL ({err}); calendar tools disabled"
                    );
                    Self::Unconfigured
                }
            },
            _ => {
                tracing::warn!(
                    "ZAPIER_MCP_API_KEY / ZAPIER_MCP_URL not set; calendar tools will be unavailable"
                );
                Self::Unconfigured
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(_))
    }
}

#[cfg(test)]
mod tests {
    use super::{McpConfig, McpTools};
    use url::Url;

    #[test]
    fn configured_variant_reports_configured() {
        let tools = McpTools::Configured(McpConfig {
            server_url: Url::parse("https://mcp.example.com/api/mcp").unwrap(),
            api_key: "key".to_string(),
        });
        assert!(tools.is_configured());
        assert!(!McpTools::Unconfigured.is_configured());
    }
}
