//! Local functions the assistant can call
//!
//! Each tool declares its schema to the remote run and executes against
//! JSON arguments, producing the output string submitted back to the run.

pub mod registry;
mod stock_price;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use analyst_core::{MarketData, ParameterSchema, ToolDefinition};

pub use registry::ToolRegistry;
pub use stock_price::StockPriceTool;

/// The Tool trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Function name as declared to the assistant
    fn name(&self) -> &str;

    /// Get a description of what the tool does
    fn description(&self) -> &str;

    /// Get the parameter schema
    fn parameters_schema(&self) -> ParameterSchema;

    /// Execute the tool with the given arguments
    async fn execute(&self, args: &Value) -> Result<String>;

    /// Convert to a tool definition for the assistant API
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters_schema())
    }
}

/// Create a registry with all default tools
pub fn create_default_registry(market: Arc<dyn MarketData>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(StockPriceTool::new(market));
    registry
}
