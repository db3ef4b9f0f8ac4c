//! OpenAI Assistants and audio API client

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::assistant::{
    Assistant, AssistantApi, CreateAssistant, CreateRun, Message, NewMessage, Run, SpeechApi,
    SpeechRequest, Thread, ToolOutput,
};

/// Default OpenAI API base URL
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

const ASSISTANTS_BETA: &str = "assistants=v2";

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

/// OpenAI API client
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl OpenAiClient {
    /// Create a client against `base_url` with a per-request timeout
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("OpenAI-Beta", HeaderValue::from_static(ASSISTANTS_BETA));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(&self.api_key)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(&self.api_key)
    }

    fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(&self.api_key)
    }
}

/// Fail with the response body attached when the status is not 2xx
async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("{} failed ({}): {}", what, status, body.trim())
}

#[async_trait]
impl AssistantApi for OpenAiClient {
    async fn create_thread(&self) -> Result<Thread> {
        let resp = self
            .post("/threads")
            .json(&serde_json::json!({}))
            .send()
            .await
            .context("Failed to connect to assistant API")?;

        check(resp, "Thread creation")
            .await?
            .json()
            .await
            .context("Failed to parse thread response")
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let resp = self
            .delete(&format!("/threads/{}", thread_id))
            .send()
            .await
            .context("Failed to connect to assistant API")?;

        check(resp, "Thread deletion").await?;
        Ok(())
    }

    #[instrument(skip(self, message), fields(len = message.content.len()))]
    async fn add_message(&self, thread_id: &str, message: &NewMessage) -> Result<Message> {
        let resp = self
            .post(&format!("/threads/{}/messages", thread_id))
            .json(message)
            .send()
            .await
            .context("Failed to add message")?;

        check(resp, "Message creation")
            .await?
            .json()
            .await
            .context("Failed to parse message response")
    }

    #[instrument(skip(self, request), fields(assistant_id = %request.assistant_id))]
    async fn create_run(&self, thread_id: &str, request: &CreateRun) -> Result<Run> {
        let resp = self
            .post(&format!("/threads/{}/runs", thread_id))
            .json(request)
            .send()
            .await
            .context("Failed to start run")?;

        let run: Run = check(resp, "Run creation")
            .await?
            .json()
            .await
            .context("Failed to parse run response")?;

        debug!(run_id = %run.id, status = %run.status, "Run created");
        Ok(run)
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let resp = self
            .get(&format!("/threads/{}/runs/{}", thread_id, run_id))
            .send()
            .await
            .context("Failed to retrieve run")?;

        check(resp, "Run retrieval")
            .await?
            .json()
            .await
            .context("Failed to parse run response")
    }

    async fn latest_message(&self, thread_id: &str) -> Result<Option<Message>> {
        let resp = self
            .get(&format!("/threads/{}/messages", thread_id))
            .query(&[("order", "desc"), ("limit", "1")])
            .send()
            .await
            .context("Failed to list messages")?;

        let list: ListResponse<Message> = check(resp, "Message listing")
            .await?
            .json()
            .await
            .context("Failed to parse message list")?;

        Ok(list.data.into_iter().next())
    }

    #[instrument(skip(self, outputs), fields(count = outputs.len()))]
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run> {
        let resp = self
            .post(&format!(
                "/threads/{}/runs/{}/submit_tool_outputs",
                thread_id, run_id
            ))
            .json(&serde_json::json!({ "tool_outputs": outputs }))
            .send()
            .await
            .context("Failed to submit tool outputs")?;

        check(resp, "Tool output submission")
            .await?
            .json()
            .await
            .context("Failed to parse run response")
    }

    async fn create_assistant(&self, request: &CreateAssistant) -> Result<Assistant> {
        let resp = self
            .post("/assistants")
            .json(request)
            .send()
            .await
            .context("Failed to create assistant")?;

        check(resp, "Assistant creation")
            .await?
            .json()
            .await
            .context("Failed to parse assistant response")
    }
}

#[async_trait]
impl SpeechApi for OpenAiClient {
    #[instrument(skip(self, request), fields(model = %request.model, voice = %request.voice))]
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        let resp = self
            .post("/audio/speech")
            .json(&serde_json::json!({
                "model": request.model,
                "voice": request.voice,
                "input": request.input,
                "response_format": "mp3",
            }))
            .send()
            .await
            .context("Failed to request speech")?;

        let bytes = check(resp, "Speech synthesis")
            .await?
            .bytes()
            .await
            .context("Failed to read speech audio")?;

        debug!(bytes = bytes.len(), "Speech synthesized");
        Ok(bytes.to_vec())
    }
}
