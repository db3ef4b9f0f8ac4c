//! analyst-core: Shared library for the stock analyst assistant
//!
//! Provides:
//! - Configuration loading (analyst.toml)
//! - Assistant API wire types and the `AssistantApi`/`SpeechApi` traits
//! - OpenAI Assistants HTTP client
//! - Market data client (Yahoo Finance chart API)
//! - In-memory doubles for tests

pub mod assistant;
pub mod config;
pub mod market;
pub mod mock;
pub mod openai;
pub mod schema;

#[cfg(test)]
mod test_server;

pub use assistant::{
    Assistant, AssistantApi, CreateAssistant, CreateRun, FunctionCall, LastError, Message,
    MessageContent, NewMessage, RequiredAction, Run, RunStatus, SpeechApi, SpeechRequest, Thread,
    ToolCallRequest, ToolOutput,
};
pub use config::Config;
pub use market::{MarketData, PriceHistory, PricePoint, YahooFinanceClient};
pub use openai::OpenAiClient;
pub use schema::{FunctionDefinition, ParameterProperty, ParameterSchema, ToolDefinition};
