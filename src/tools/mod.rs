//! Tools the model may call during generation
//!
//! The model decides when to call a tool and with what arguments; this
//! module only describes the tools and executes the calls it is handed.

pub mod hr;

pub use hr::{EmployeeDataTool, HolidayPolicyTool};

use crate::llm::ToolDefinition;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of executing a tool
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }
}

/// Trait for model-callable tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool description
    fn description(&self) -> &str;

    /// Get the JSON schema for parameters
    fn parameters(&self) -> Value;

    /// Execute the tool with given parameters
    async fn execute(&self, params: Value) -> Result<ToolResult>;

    /// Convert to a model tool definition
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the two HR tools registered
    pub fn with_hr_tools(
        client: reqwest::Client,
        employee_data_url: impl Into<String>,
        policy_url: impl Into<String>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(EmployeeDataTool::new(
            client.clone(),
            employee_data_url,
        )));
        registry.register(Arc::new(HolidayPolicyTool::new(client, policy_url)));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool definitions to offer the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.to_definition()).collect();
        // Stable ordering keeps request payloads deterministic
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool by name. An unknown name is reported back to the model
    /// as an error result, not raised.
    pub async fn execute(&self, name: &str, params: Value) -> ToolResult {
        let Some(tool) = self.get(name) else {
            tracing::warn!("Model requested unknown tool '{name}'");
            return ToolResult::error(format!("Unknown tool: {name}"));
        };

        tracing::info!(tool = name, args = %params, "Executing function call");
        match tool.execute(params).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Tool '{name}' failed: {e:#}");
                ToolResult::error(format!("Tool {name} failed: {e}"))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nope", Value::Null).await;
        assert!(!result.success);
        assert!(result.output.contains("Unknown tool"));
    }

    #[test]
    fn test_hr_registry_definitions_sorted() {
        let registry = ToolRegistry::with_hr_tools(
            reqwest::Client::new(),
            "http://localhost:1/data",
            "http://localhost:1/docs",
        );
        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "get_employee_data");
        assert_eq!(defs[1].name, "get_holydays_policy");
        assert!(defs[0].parameters["properties"]["dni"].is_object());
    }
}
