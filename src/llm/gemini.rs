//! Google Gemini chat provider
//!
//! SECURITY: the API key is ONLY sent to the official Google endpoint.
//! GEMINI_API_KEY is never sent to any third-party service.

use super::{
    Content, ContentPart, LlmError, LlmProvider, LlmResponse, Message, Role, TokenUsage, ToolCall,
    ToolDefinition,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::env;

/// Official Google Gemini API endpoint
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Harm categories disabled for the HR assistant. The backing dataset is
/// employee leave data; the default thresholds were blocking harmless
/// Spanish-language banter in the assistant persona.
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_output_tokens: usize,
    temperature: f32,
}

impl GeminiProvider {
    pub fn new() -> Result<Self> {
        let api_key =
            env::var("GEMINI_API_KEY").context("GEMINI_API_KEY environment variable not set")?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: "gemini-2.5-pro".to_string(),
            max_output_tokens: 1000,
            temperature: 0.5,
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: usize) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn convert_messages(&self, messages: &[Message]) -> (Option<String>, Vec<GeminiContent>) {
        let mut system_instruction = None;
        let mut contents = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    let text = msg.content.text();
                    if !text.is_empty() {
                        system_instruction = Some(text);
                    }
                }
                Role::User => {
                    contents.push(GeminiContent {
                        role: "user".to_string(),
                        parts: convert_parts(&msg.content),
                    });
                }
                Role::Model => {
                    let mut parts = convert_parts(&msg.content);
                    for call in &msg.tool_calls {
                        parts.push(GeminiPart::FunctionCall {
                            function_call: GeminiFunctionCall {
                                name: call.name.clone(),
                                args: call.arguments.clone(),
                            },
                        });
                    }
                    contents.push(GeminiContent {
                        role: "model".to_string(),
                        parts,
                    });
                }
                Role::Tool => {
                    // Function responses ride in a user turn. The tool output
                    // is JSON text; send it back as a structured object so the
                    // model can reason over the fields.
                    let raw = msg.content.text();
                    let response = serde_json::from_str(&raw)
                        .unwrap_or_else(|_| serde_json::json!({ "result": raw }));
                    contents.push(GeminiContent {
                        role: "user".to_string(),
                        parts: vec![GeminiPart::FunctionResponse {
                            function_response: GeminiFunctionResponse {
                                name: msg.tool_name.clone().unwrap_or_default(),
                                response,
                            },
                        }],
                    });
                }
            }
        }

        (system_instruction, contents)
    }

    fn convert_tools(&self, tools: &[ToolDefinition]) -> Vec<GeminiFunctionDeclaration> {
        tools
            .iter()
            .map(|t| GeminiFunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect()
    }

    fn safety_settings() -> Vec<GeminiSafetySetting> {
        SAFETY_CATEGORIES
            .iter()
            .map(|category| GeminiSafetySetting {
                category: category.to_string(),
                threshold: "OFF".to_string(),
            })
            .collect()
    }

    async fn send_request(&self, request: GeminiRequest) -> Result<GeminiResponse, LlmError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, error_text));
        }

        response
            .json::<GeminiResponse>()
            .await
            .map_err(|e| LlmError::Network(format!("Failed to parse Gemini response: {e}")))
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse> {
        let (system_instruction, contents) = self.convert_messages(messages);

        let mut request = GeminiRequest {
            contents,
            system_instruction: system_instruction.map(|text| GeminiSystemInstruction {
                parts: vec![GeminiPart::Text { text }],
            }),
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: Some(self.max_output_tokens),
                temperature: Some(self.temperature),
            }),
            safety_settings: Self::safety_settings(),
            tools: None,
        };

        if let Some(tools) = tools {
            if !tools.is_empty() {
                request.tools = Some(vec![GeminiTools {
                    function_declarations: self.convert_tools(tools),
                }]);
            }
        }

        let response = self.send_request(request).await?;

        let usage = response.usage_metadata.map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        let Some(candidate) = response.candidates.into_iter().next() else {
            return Ok(LlmResponse::Content {
                content: Content::default(),
                usage,
            });
        };

        let mut parts = Vec::new();
        let mut tool_calls = Vec::new();

        // A blocked or empty-output candidate may carry only a finishReason,
        // with content absent or part-less; that is an empty reply, not a
        // parse failure.
        let wire_parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        for part in wire_parts {
            match part {
                GeminiPart::Text { text } => {
                    parts.push(ContentPart::Text { text });
                }
                GeminiPart::InlineData { inline_data } => {
                    match BASE64.decode(&inline_data.data) {
                        Ok(data) => parts.push(ContentPart::InlineData {
                            mime_type: inline_data.mime_type,
                            data,
                        }),
                        Err(e) => {
                            tracing::warn!("Dropping undecodable inline data part: {e}");
                        }
                    }
                }
                GeminiPart::FunctionCall { function_call } => {
                    tool_calls.push(ToolCall {
                        name: function_call.name,
                        arguments: function_call.args,
                    });
                }
                GeminiPart::FunctionResponse { .. } => {
                    // Only ever sent by us, never expected in a candidate.
                    tracing::warn!("Ignoring unexpected functionResponse part in model reply");
                }
            }
        }

        let content = Content::new(parts);
        if tool_calls.is_empty() {
            Ok(LlmResponse::Content { content, usage })
        } else if content.is_empty() {
            Ok(LlmResponse::ToolCalls {
                calls: tool_calls,
                usage,
            })
        } else {
            Ok(LlmResponse::Mixed {
                content,
                calls: tool_calls,
                usage,
            })
        }
    }
}

fn convert_parts(content: &Content) -> Vec<GeminiPart> {
    content
        .parts
        .iter()
        .map(|part| match part {
            ContentPart::Text { text } => GeminiPart::Text { text: text.clone() },
            ContentPart::InlineData { mime_type, data } => GeminiPart::InlineData {
                inline_data: GeminiBlob {
                    mime_type: mime_type.clone(),
                    data: BASE64.encode(data),
                },
            },
        })
        .collect()
}

// Gemini API wire types

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(rename = "safetySettings")]
    safety_settings: Vec<GeminiSafetySetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTools>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiBlob,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiBlob {
    #[serde(rename = "mimeType")]
    mime_type: String,
    /// Base64-encoded payload
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct GeminiSafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Serialize)]
struct GeminiTools {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
    #[serde(rename = "totalTokenCount")]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_response() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "Te quedan 12 dias."}]
                }
            }],
            "usageMetadata": {
                "promptTokenCount": 10,
                "candidatesTokenCount": 5,
                "totalTokenCount": 15
            }
        }"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.candidates.len(), 1);
        let usage = response.usage_metadata.unwrap();
        assert_eq!(usage.prompt_token_count, 10);
        assert_eq!(usage.total_token_count, 15);
    }

    #[test]
    fn test_parse_function_call() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{
                        "functionCall": {
                            "name": "get_employee_data",
                            "args": {"dni": "101"}
                        }
                    }]
                }
            }]
        }"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        let content = response.candidates[0].content.as_ref().unwrap();
        match &content.parts[0] {
            GeminiPart::FunctionCall { function_call } => {
                assert_eq!(function_call.name, "get_employee_data");
                assert_eq!(function_call.args["dni"], "101");
            }
            other => panic!("Expected FunctionCall, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_candidate_without_parts() {
        // Safety-blocked replies carry only a finishReason; the content
        // may be part-less or missing entirely.
        let json = r#"{
            "candidates": [{
                "finishReason": "RECITATION",
                "content": {"role": "model"}
            }]
        }"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(response.candidates[0].content.as_ref().unwrap().parts.is_empty());

        let json = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(response.candidates[0].content.is_none());
    }

    #[test]
    fn test_parse_inline_data_part() {
        let json = r#"{"inlineData": {"mimeType": "image/png", "data": "AQID"}}"#;
        let part: GeminiPart = serde_json::from_str(json).unwrap();
        match part {
            GeminiPart::InlineData { inline_data } => {
                assert_eq!(inline_data.mime_type, "image/png");
                assert_eq!(BASE64.decode(inline_data.data).unwrap(), vec![1, 2, 3]);
            }
            other => panic!("Expected InlineData, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_result_becomes_function_response() {
        let provider = GeminiProvider {
            client: reqwest::Client::new(),
            api_key: "test".to_string(),
            model: "gemini-2.5-pro".to_string(),
            max_output_tokens: 1000,
            temperature: 0.5,
        };

        let messages = vec![
            Message::system("Sos el asistente de RRHH."),
            Message::user(vec![ContentPart::text("cuantos dias me quedan?")]),
            Message::tool_result("get_holydays_policy", r#"{"policy":"20 dias"}"#),
        ];

        let (system, contents) = provider.convert_messages(&messages);
        assert_eq!(system.as_deref(), Some("Sos el asistente de RRHH."));
        assert_eq!(contents.len(), 2);
        match &contents[1].parts[0] {
            GeminiPart::FunctionResponse { function_response } => {
                assert_eq!(function_response.name, "get_holydays_policy");
                assert_eq!(function_response.response["policy"], "20 dias");
            }
            other => panic!("Expected FunctionResponse, got {other:?}"),
        }
    }
}
