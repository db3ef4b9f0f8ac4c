//! Tool registry: function name to handler

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use analyst_core::{ToolCallRequest, ToolDefinition, ToolOutput};

use super::Tool;
use crate::error::RunError;

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all registered tool names, sorted
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Get tool definitions for the assistant API, sorted by name
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        defs
    }

    /// Fail on the first call naming an unregistered function
    pub fn ensure_known(&self, calls: &[ToolCallRequest]) -> Result<()> {
        match calls.iter().find(|c| !self.tools.contains_key(&c.function.name)) {
            Some(call) => Err(RunError::UnknownFunction {
                name: call.function.name.clone(),
                call_id: call.id.clone(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Execute one tool call and key its output by the call id
    pub async fn dispatch(&self, call: &ToolCallRequest) -> Result<ToolOutput> {
        let name = &call.function.name;
        let tool = self.get(name).ok_or_else(|| RunError::UnknownFunction {
            name: name.clone(),
            call_id: call.id.clone(),
        })?;

        let args = call
            .parse_arguments()
            .map_err(|e| RunError::InvalidArguments {
                call_id: call.id.clone(),
                reason: e.to_string(),
            })?;

        debug!(tool = %name, call_id = %call.id, "Executing tool call");
        let output = tool
            .execute(&args)
            .await
            .with_context(|| format!("Tool '{}' failed for call {}", name, call.id))?;

        Ok(ToolOutput {
            tool_call_id: call.id.clone(),
            output,
        })
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyst_core::ParameterSchema;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its arguments"
        }

        fn parameters_schema(&self) -> ParameterSchema {
            ParameterSchema::new()
        }

        async fn execute(&self, args: &Value) -> Result<String> {
            Ok(args.to_string())
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry
    }

    #[test]
    fn test_registry_register_and_get() {
        let registry = registry();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.list_names(), vec!["echo"]);
        assert_eq!(registry.tool_definitions()[0].function.name, "echo");
    }

    #[tokio::test]
    async fn test_dispatch_keys_output_by_call_id() {
        let call = ToolCallRequest::function("c1", "echo", json!({"x": 1}));
        let output = registry().dispatch(&call).await.unwrap();
        assert_eq!(output.tool_call_id, "c1");
        assert_eq!(output.output, r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_function() {
        let call = ToolCallRequest::function("c9", "unknown_fn", json!({}));
        let err = registry().dispatch(&call).await.unwrap_err();
        match err.downcast_ref::<RunError>() {
            Some(RunError::UnknownFunction { name, call_id }) => {
                assert_eq!(name, "unknown_fn");
                assert_eq!(call_id, "c9");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_malformed_arguments() {
        let mut call = ToolCallRequest::function("c2", "echo", json!({}));
        call.function.arguments = "{not json".to_string();
        let err = registry().dispatch(&call).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RunError>(),
            Some(RunError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_ensure_known_reports_first_unknown() {
        let calls = vec![
            ToolCallRequest::function("c1", "echo", json!({})),
            ToolCallRequest::function("c2", "delete_everything", json!({})),
        ];
        let err = registry().ensure_known(&calls).unwrap_err();
        assert!(err.to_string().contains("delete_everything"));
        assert!(registry().ensure_known(&calls[..1]).is_ok());
    }
}
