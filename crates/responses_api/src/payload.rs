use serde::{Deserialize, Serialize};

/// Request body for the streaming `/responses` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: Vec<InputMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<McpTool>,
    #[serde(default = "default_true")]
    pub stream: bool,
}

fn default_true() -> bool {
    true
}

impl ResponsesRequest {
    pub fn new(model: impl Into<String>, input: Vec<InputMessage>) -> Self {
        Self {
            model: model.into(),
            input,
            tools: Vec::new(),
            stream: true,
        }
    }

    pub fn with_tool(mut self, tool: McpTool) -> Self {
        self.tools.push(tool);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: String,
    pub content: String,
}

impl InputMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// Remote MCP tool server the model may call while answering.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub server_label: String,
    pub server_url: String,
    pub require_approval: String,
    /// Bearer credential forwarded to the tool server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
}

impl McpTool {
    /// Tool entry with automatic approval of every call.
    pub fn auto_approved(server_label: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            kind: "mcp".to_string(),
            server_label: server_label.into(),
            server_url: server_url.into(),
            require_approval: "never".to_string(),
            authorization: None,
        }
    }

    pub fn with_authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = Some(authorization.into());
        self
    }
}

impl std::fmt::Debug for McpTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpTool")
            .field("kind", &self.kind)
            .field("server_label", &self.server_label)
            .field("server_url", &self.server_url)
            .field("require_approval", &self.require_approval)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
