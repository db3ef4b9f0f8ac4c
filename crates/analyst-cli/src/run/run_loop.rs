//! Run-poll-dispatch loop

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use analyst_core::{
    AssistantApi, CreateRun, NewMessage, Run, RunStatus, SpeechApi, SpeechRequest, ToolOutput,
};

use super::state::{RunConfig, RunOutcome, RunState};
use crate::error::RunError;
use crate::progress::Spinner;
use crate::session::Session;
use crate::tools::ToolRegistry;

/// Drives one assistant run to completion
pub struct RunLoop {
    assistant: Arc<dyn AssistantApi>,
    speech: Option<Arc<dyn SpeechApi>>,
    registry: ToolRegistry,
    config: RunConfig,
}

impl RunLoop {
    pub fn new(assistant: Arc<dyn AssistantApi>, registry: ToolRegistry, config: RunConfig) -> Self {
        Self {
            assistant,
            speech: None,
            registry,
            config,
        }
    }

    /// Attach a speech client used once the run completes
    pub fn with_speech(mut self, speech: Arc<dyn SpeechApi>) -> Self {
        self.speech = Some(speech);
        self
    }

    /// Post `input` to the session thread and drive a run until it replies
    #[instrument(skip(self, session, input), fields(thread_id = %session.thread_id()))]
    pub async fn run(&self, session: &Session, input: &str) -> Result<RunOutcome> {
        let thread_id = session.thread_id();

        // An empty message still goes out; it means "no new user input"
        self.assistant
            .add_message(thread_id, &NewMessage::user(input))
            .await?;

        let request = CreateRun {
            assistant_id: self.config.assistant_id.clone(),
            instructions: Some(self.config.instructions.clone()),
            tools: self
                .registry
                .tool_definitions()
                .iter()
                .map(|def| def.to_value())
                .collect(),
        };
        let run = self.assistant.create_run(thread_id, &request).await?;
        info!(run_id = %run.id, input_len = input.len(), "Run started");

        let started = Instant::now();
        let mut state = RunState::new(run.id.clone());

        loop {
            let current = self.assistant.retrieve_run(thread_id, &run.id).await?;
            state.record_poll();
            debug!(status = %current.status, poll = state.polls, "Polled run");

            match current.status {
                RunStatus::Completed => {
                    info!(polls = state.polls, tool_rounds = state.tool_rounds, "Run completed");
                    return self.finish(thread_id, state).await;
                }
                RunStatus::RequiresAction => {
                    let outputs = self.resolve_tool_calls(&current).await?;
                    self.assistant
                        .submit_tool_outputs(thread_id, &run.id, &outputs)
                        .await?;
                    state.record_tool_round(outputs.len());
                }
                status if status.is_terminal_failure() => {
                    let reason = current
                        .last_error
                        .map(|e| format!("{}: {}", e.code, e.message))
                        .unwrap_or_else(|| "no error reported".to_string());
                    warn!(status = %status, reason = %reason, "Run ended without completing");
                    return Err(RunError::RunEnded {
                        run_id: run.id.clone(),
                        status,
                        reason,
                    }
                    .into());
                }
                _ => {
                    let remaining = self.check_deadline(&state, started)?;
                    let delay = self.config.poll.delay(state.next_attempt()).min(remaining);
                    if delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    /// Time left before `max_wait`, or a timeout error once it is spent
    fn check_deadline(&self, state: &RunState, started: Instant) -> Result<std::time::Duration> {
        let waited = started.elapsed();
        match self.config.poll.max_wait.checked_sub(waited) {
            Some(remaining) if !remaining.is_zero() => Ok(remaining),
            _ => {
                warn!(run_id = %state.run_id, ?waited, "Run timed out");
                Err(RunError::Timeout {
                    run_id: state.run_id.clone(),
                    waited,
                }
                .into())
            }
        }
    }

    /// Answer every pending tool call, or none at all
    async fn resolve_tool_calls(&self, run: &Run) -> Result<Vec<ToolOutput>> {
        let calls = run
            .pending_tool_calls()
            .filter(|calls| !calls.is_empty())
            .ok_or_else(|| RunError::MissingAction {
                run_id: run.id.clone(),
            })?;

        self.registry.ensure_known(calls)?;
        debug!(tool_count = calls.len(), "Processing tool calls");

        let mut spinner = self.config.show_progress.then(|| {
            let mut spinner = Spinner::new("Generating response...");
            spinner.start();
            spinner
        });

        let mut outputs = Vec::with_capacity(calls.len());
        let mut failure = None;
        for call in calls {
            match self.registry.dispatch(call).await {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(spinner) = spinner.as_mut() {
            spinner.stop().await;
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(outputs),
        }
    }

    async fn finish(&self, thread_id: &str, state: RunState) -> Result<RunOutcome> {
        let message = self
            .assistant
            .latest_message(thread_id)
            .await
            .context("Failed to fetch assistant reply")?;

        let response = message
            .as_ref()
            .and_then(|m| m.text())
            .map(str::to_string)
            .ok_or_else(|| RunError::EmptyResponse {
                thread_id: thread_id.to_string(),
            })?;

        let audio = self.speak(&response).await;
        Ok(state.into_outcome(response, audio))
    }

    /// Speech is best effort; a failure leaves the text reply intact
    async fn speak(&self, text: &str) -> Option<Vec<u8>> {
        let (speech, settings) = match (&self.speech, &self.config.speech) {
            (Some(speech), Some(settings)) => (speech, settings),
            _ => return None,
        };

        let request = SpeechRequest {
            model: settings.model.clone(),
            voice: settings.voice.clone(),
            input: text.to_string(),
        };

        match speech.synthesize(&request).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                warn!(error = %e, "Speech synthesis failed");
                None
            }
        }
    }
}
