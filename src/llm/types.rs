//! Shared types for the chat model layer

use serde::{Deserialize, Serialize};

/// Role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Model,
    Tool,
}

/// Atomic unit of a conversational turn: a text span or an inline binary
/// payload tagged with a MIME type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "inline_data")]
    InlineData { mime_type: String, data: Vec<u8> },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        ContentPart::InlineData {
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// Ordered sequence of content parts representing one turn.
///
/// A `Content` with no parts is treated as absent downstream, never as an
/// error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub parts: Vec<ContentPart>,
}

impl Content {
    pub fn new(parts: Vec<ContentPart>) -> Self {
        Self { parts }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Concatenated text of all text parts, joined with newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    /// Function calls requested by a model message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool messages: the function that produced the content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Content::new(vec![ContentPart::text(text)]),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    pub fn user(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: Content::new(parts),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    pub fn model(content: Content) -> Self {
        Self {
            role: Role::Model,
            content,
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    pub fn model_tool_calls(content: Content, calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Model,
            content,
            tool_calls: calls,
            tool_name: None,
        }
    }

    /// A function response turn. `output` is the JSON text the tool produced.
    pub fn tool_result(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Content::new(vec![ContentPart::text(output)]),
            tool_calls: Vec::new(),
            tool_name: Some(name.into()),
        }
    }
}

/// A function call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Definition of a tool for the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Response from the model for one generation request
#[derive(Debug, Clone)]
pub enum LlmResponse {
    /// Final content (text and/or inline data)
    Content {
        content: Content,
        usage: Option<TokenUsage>,
    },
    /// Function calls requested by the model
    ToolCalls {
        calls: Vec<ToolCall>,
        usage: Option<TokenUsage>,
    },
    /// Content and function calls in the same reply
    Mixed {
        content: Content,
        calls: Vec<ToolCall>,
        usage: Option<TokenUsage>,
    },
}

impl LlmResponse {
    pub fn content(&self) -> Option<&Content> {
        match self {
            LlmResponse::Content { content, .. } => Some(content),
            LlmResponse::Mixed { content, .. } => Some(content),
            LlmResponse::ToolCalls { .. } => None,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            LlmResponse::ToolCalls { calls, .. } => calls,
            LlmResponse::Mixed { calls, .. } => calls,
            LlmResponse::Content { .. } => &[],
        }
    }

    pub fn usage(&self) -> Option<&TokenUsage> {
        match self {
            LlmResponse::Content { usage, .. } => usage.as_ref(),
            LlmResponse::ToolCalls { usage, .. } => usage.as_ref(),
            LlmResponse::Mixed { usage, .. } => usage.as_ref(),
        }
    }
}
