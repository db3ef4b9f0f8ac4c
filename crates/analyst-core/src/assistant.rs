//! Assistant API wire types and service traits

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Remote conversation thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
}

/// Status of a run as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    /// Any status this client does not know about
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Statuses from which the run can never complete
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            RunStatus::Cancelled | RunStatus::Failed | RunStatus::Incomplete | RunStatus::Expired
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Error reported on a failed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub code: String,
    pub message: String,
}

/// One assistant processing pass over a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<LastError>,
}

impl Run {
    pub fn new(id: impl Into<String>, thread_id: impl Into<String>, status: RunStatus) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            status,
            required_action: None,
            last_error: None,
        }
    }

    /// Tool calls the run is blocked on, if any
    pub fn pending_tool_calls(&self) -> Option<&[ToolCallRequest]> {
        self.required_action
            .as_ref()
            .and_then(|action| action.submit_tool_outputs.as_ref())
            .map(|submit| submit.tool_calls.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub submit_tool_outputs: Option<SubmitToolOutputs>,
}

impl RequiredAction {
    pub fn submit_tool_outputs(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            kind: "submit_tool_outputs".to_string(),
            submit_tool_outputs: Some(SubmitToolOutputs { tool_calls }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitToolOutputs {
    pub tool_calls: Vec<ToolCallRequest>,
}

/// A request from the run to execute a local function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub kind: String,
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object
    #[serde(default)]
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            kind: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.to_string(),
            },
        }
    }

    /// Decode the argument string; an empty string is an empty object
    pub fn parse_arguments(&self) -> serde_json::Result<Value> {
        if self.function.arguments.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&self.function.arguments)
    }
}

/// Result of one tool call, keyed by the call id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl Message {
    /// First text part of the message
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|part| match part {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Other => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,
}

impl MessageContent {
    pub fn text(value: impl Into<String>) -> Self {
        MessageContent::Text {
            text: TextContent {
                value: value.into(),
            },
        }
    }
}

/// Message to append to a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMessage {
    pub role: String,
    pub content: String,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Parameters for starting a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateRun {
    pub assistant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateAssistant {
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub tools: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Text-to-speech request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechRequest {
    pub model: String,
    pub voice: String,
    pub input: String,
}

/// Hosted assistant service: threads, messages and runs
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn create_thread(&self) -> Result<Thread>;

    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    async fn add_message(&self, thread_id: &str, message: &NewMessage) -> Result<Message>;

    async fn create_run(&self, thread_id: &str, request: &CreateRun) -> Result<Run>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// Most recent message on the thread
    async fn latest_message(&self, thread_id: &str) -> Result<Option<Message>>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run>;

    async fn create_assistant(&self, request: &CreateAssistant) -> Result<Assistant>;
}

/// Speech synthesis service
#[async_trait]
pub trait SpeechApi: Send + Sync {
    /// Returns encoded audio (mp3)
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_requiring_action_deserializes() {
        let body = json!({
            "id": "run_1",
            "object": "thread.run",
            "thread_id": "thread_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_stock_price", "arguments": "{\"symbol\":\"AAPL\"}"}
                    }]
                }
            },
            "last_error": null
        });

        let run: Run = serde_json::from_value(body).unwrap();
        assert_eq!(run.status, RunStatus::RequiresAction);
        let calls = run.pending_tool_calls().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_stock_price");
        assert_eq!(calls[0].parse_arguments().unwrap(), json!({"symbol": "AAPL"}));
    }

    #[test]
    fn test_unrecognised_status_is_unknown() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "thread_id": "thread_1",
            "status": "paused_for_review"
        }))
        .unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(run.pending_tool_calls().is_none());
    }

    #[test]
    fn test_terminal_failures() {
        assert!(RunStatus::Failed.is_terminal_failure());
        assert!(RunStatus::Expired.is_terminal_failure());
        assert!(!RunStatus::Cancelling.is_terminal_failure());
        assert!(!RunStatus::Completed.is_terminal_failure());
        assert_eq!(RunStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn test_message_text_skips_non_text_parts() {
        let message: Message = serde_json::from_value(json!({
            "id": "msg_1",
            "role": "assistant",
            "content": [
                {"type": "image_file", "image_file": {"file_id": "file_1"}},
                {"type": "text", "text": {"value": "AAPL closed at 189.25", "annotations": []}}
            ]
        }))
        .unwrap();
        assert_eq!(message.text(), Some("AAPL closed at 189.25"));
    }

    #[test]
    fn test_empty_arguments_parse_as_object() {
        let call = ToolCallRequest {
            id: "c1".into(),
            kind: "function".into(),
            function: FunctionCall {
                name: "noop".into(),
                arguments: String::new(),
            },
        };
        assert_eq!(call.parse_arguments().unwrap(), json!({}));
    }

    #[test]
    fn test_create_run_omits_empty_fields() {
        let request = CreateRun {
            assistant_id: "asst_1".into(),
            instructions: None,
            tools: Vec::new(),
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"assistant_id": "asst_1"}));
    }
}
