//! In-memory service doubles for testing.
//!
//! `ScriptedAssistant` replays a fixed sequence of run states and records
//! every call made against it, so tests can assert on exactly what was sent.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::assistant::{
    Assistant, AssistantApi, CreateAssistant, CreateRun, Message, MessageContent, NewMessage,
    RequiredAction, Run, RunStatus, SpeechApi, SpeechRequest, Thread, ToolCallRequest, ToolOutput,
};
use crate::market::{MarketData, PriceHistory, PricePoint};

pub const MOCK_THREAD_ID: &str = "thread_mock";
pub const MOCK_RUN_ID: &str = "run_mock";

/// A call observed by `ScriptedAssistant`
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    CreateThread,
    DeleteThread(String),
    AddMessage { thread_id: String, message: NewMessage },
    CreateRun { thread_id: String, request: CreateRun },
    RetrieveRun { run_id: String },
    LatestMessage,
    SubmitToolOutputs { run_id: String, outputs: Vec<ToolOutput> },
    CreateAssistant(CreateAssistant),
}

/// Run with the given status on the mock thread
pub fn run_with_status(status: RunStatus) -> Run {
    Run::new(MOCK_RUN_ID, MOCK_THREAD_ID, status)
}

/// Run blocked on the given tool calls
pub fn run_requiring(calls: Vec<ToolCallRequest>) -> Run {
    let mut run = run_with_status(RunStatus::RequiresAction);
    run.required_action = Some(RequiredAction::submit_tool_outputs(calls));
    run
}

/// Assistant double that replays scripted run states
#[derive(Debug)]
pub struct ScriptedAssistant {
    script: Mutex<VecDeque<Run>>,
    last: Mutex<Run>,
    reply: Option<String>,
    calls: Mutex<Vec<ApiCall>>,
}

impl ScriptedAssistant {
    /// Each `retrieve_run` pops the next run; the final one repeats forever.
    pub fn new(script: Vec<Run>) -> Self {
        let last = script
            .last()
            .cloned()
            .unwrap_or_else(|| run_with_status(RunStatus::Completed));
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
            reply: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Text of the latest thread message once the run completes
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// All tool-output batches submitted so far
    pub fn submitted_outputs(&self) -> Vec<Vec<ToolOutput>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::SubmitToolOutputs { outputs, .. } => Some(outputs),
                _ => None,
            })
            .collect()
    }

    pub fn poll_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ApiCall::RetrieveRun { .. }))
            .count()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }
}

#[async_trait]
impl AssistantApi for ScriptedAssistant {
    async fn create_thread(&self) -> Result<Thread> {
        self.record(ApiCall::CreateThread);
        Ok(Thread {
            id: MOCK_THREAD_ID.to_string(),
        })
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.record(ApiCall::DeleteThread(thread_id.to_string()));
        Ok(())
    }

    async fn add_message(&self, thread_id: &str, message: &NewMessage) -> Result<Message> {
        self.record(ApiCall::AddMessage {
            thread_id: thread_id.to_string(),
            message: message.clone(),
        });
        Ok(Message {
            id: "msg_user".to_string(),
            role: message.role.clone(),
            content: vec![MessageContent::text(message.content.clone())],
        })
    }

    async fn create_run(&self, thread_id: &str, request: &CreateRun) -> Result<Run> {
        self.record(ApiCall::CreateRun {
            thread_id: thread_id.to_string(),
            request: request.clone(),
        });
        Ok(run_with_status(RunStatus::Queued))
    }

    async fn retrieve_run(&self, _thread_id: &str, run_id: &str) -> Result<Run> {
        self.record(ApiCall::RetrieveRun {
            run_id: run_id.to_string(),
        });
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(run) => {
                *self.last.lock().unwrap_or_else(|e| e.into_inner()) = run.clone();
                Ok(run)
            }
            None => Ok(self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()),
        }
    }

    async fn latest_message(&self, _thread_id: &str) -> Result<Option<Message>> {
        self.record(ApiCall::LatestMessage);
        Ok(self.reply.as_ref().map(|text| Message {
            id: "msg_assistant".to_string(),
            role: "assistant".to_string(),
            content: vec![MessageContent::text(text.clone())],
        }))
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run> {
        self.record(ApiCall::SubmitToolOutputs {
            run_id: run_id.to_string(),
            outputs: outputs.to_vec(),
        });
        Ok(run_with_status(RunStatus::Queued))
    }

    async fn create_assistant(&self, request: &CreateAssistant) -> Result<Assistant> {
        self.record(ApiCall::CreateAssistant(request.clone()));
        Ok(Assistant {
            id: "asst_mock".to_string(),
            name: Some(request.name.clone()),
        })
    }
}

/// Speech double that records every input it is asked to speak
#[derive(Debug, Default)]
pub struct RecordingSpeech {
    inputs: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    /// A synthesizer whose every request fails
    pub fn failing() -> Self {
        Self {
            inputs: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SpeechApi for RecordingSpeech {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        self.inputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.input.clone());
        if self.fail {
            anyhow::bail!("speech service unavailable");
        }
        Ok(request.input.as_bytes().to_vec())
    }
}

/// Market data double with fixed prices
#[derive(Debug, Default)]
pub struct StaticPrices {
    prices: HashMap<String, f64>,
}

impl StaticPrices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: impl Into<String>, close: f64) -> Self {
        self.prices.insert(symbol.into(), close);
        self
    }
}

#[async_trait]
impl MarketData for StaticPrices {
    async fn latest_close(&self, symbol: &str) -> Result<f64> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("No market data for {}", symbol))
    }

    async fn history(&self, symbol: &str, _range: &str) -> Result<PriceHistory> {
        let close = self.latest_close(symbol).await?;
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .ok_or_else(|| anyhow::anyhow!("invalid date"))?;
        let points = (0..5u32)
            .filter_map(|i| {
                let date = start.checked_add_days(chrono::Days::new(u64::from(i)))?;
                Some(PricePoint {
                    date,
                    close: close - f64::from(4 - i),
                })
            })
            .collect();
        Ok(PriceHistory {
            symbol: symbol.to_string(),
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_repeats_last_run() {
        let assistant = ScriptedAssistant::new(vec![
            run_with_status(RunStatus::InProgress),
            run_with_status(RunStatus::Completed),
        ]);

        let statuses = [
            assistant.retrieve_run(MOCK_THREAD_ID, MOCK_RUN_ID).await.unwrap().status,
            assistant.retrieve_run(MOCK_THREAD_ID, MOCK_RUN_ID).await.unwrap().status,
            assistant.retrieve_run(MOCK_THREAD_ID, MOCK_RUN_ID).await.unwrap().status,
        ];
        assert_eq!(
            statuses,
            [RunStatus::InProgress, RunStatus::Completed, RunStatus::Completed]
        );
        assert_eq!(assistant.poll_count(), 3);
    }

    #[tokio::test]
    async fn test_static_prices_history_ends_at_close() {
        let prices = StaticPrices::new().with_price("AAPL", 100.0);
        let history = prices.history("AAPL", "5y").await.unwrap();
        assert_eq!(history.closes(), vec![96.0, 97.0, 98.0, 99.0, 100.0]);
        assert!(prices.latest_close("MSFT").await.is_err());
    }
}
