//! Tool call request/response models.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mcp::schema::ToolSchema;

/// Name, description and input schema of a registered tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    /// Tool name (e.g., "arxiv_search"); unique within a dispatcher
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Declared input fields
    pub schema: ToolSchema,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: ToolSchema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }

    /// `{ name, description, inputSchema }` as returned by `list_tools`
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.schema.to_json_schema(),
        })
    }
}

/// An incoming tool call.
///
/// Accepts both the plain form `{"name": .., "arguments": ..}` and the
/// JSON-RPC form `{"jsonrpc": "2.0", "method": .., "params": .., "id": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    #[serde(alias = "method")]
    pub name: String,

    #[serde(default, alias = "params")]
    pub arguments: Value,

    /// JSON-RPC request id, echoed back by transports that need it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: None,
        }
    }
}

/// Outcome category of a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Success,
    ValidationError,
    UpstreamError,
    InternalError,
}

impl ResultKind {
    pub fn is_error(&self) -> bool {
        !matches!(self, ResultKind::Success)
    }
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResultKind::Success => "success",
            ResultKind::ValidationError => "validation_error",
            ResultKind::UpstreamError => "upstream_error",
            ResultKind::InternalError => "internal_error",
        };
        f.write_str(s)
    }
}

/// A single text content block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl TextContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: text.into(),
        }
    }
}

/// The result of one tool call; the text is always present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub kind: ResultKind,
    pub text: String,
}

impl ToolCallResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self::with_kind(ResultKind::Success, text)
    }

    pub fn with_kind(kind: ResultKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind.is_error()
    }

    /// Content blocks handed to the transport
    pub fn content(&self) -> Vec<TextContent> {
        vec![TextContent::text(self.text.clone())]
    }

    /// MCP wire form: `{"content": [{"type": "text", "text": ..}], "isError": ..}`
    pub fn to_wire(&self) -> Value {
        json!({
            "content": self.content(),
            "isError": self.is_error(),
        })
    }
}
