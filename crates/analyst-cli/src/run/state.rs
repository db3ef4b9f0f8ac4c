//! Run configuration, poll policy and progress bookkeeping

use anyhow::Result;
use std::time::Duration;

use analyst_core::config::{Config, PollConfig};

/// Backoff between status polls, bounded by a total wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        Self {
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier,
            max_wait: Duration::from_secs(config.max_wait_secs),
        }
    }
}

impl PollPolicy {
    /// Poll without sleeping, giving up after `max_wait`
    #[cfg(test)]
    pub fn immediate(max_wait: Duration) -> Self {
        Self {
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1,
            max_wait,
        }
    }

    /// Delay before the poll following `attempt` consecutive waits
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Voice settings for the spoken reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechSettings {
    pub model: String,
    pub voice: String,
}

/// Configuration for the run loop
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub assistant_id: String,
    /// Instructions appended when the run starts
    pub instructions: String,
    pub poll: PollPolicy,
    /// Speak the reply when set and a speech client is attached
    pub speech: Option<SpeechSettings>,
    /// Show a spinner while tool calls are dispatched
    pub show_progress: bool,
}

impl RunConfig {
    #[cfg(test)]
    pub fn new(assistant_id: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            instructions: instructions.into(),
            poll: PollPolicy::default(),
            speech: None,
            show_progress: false,
        }
    }

    /// Build from file config; `assistant_id` overrides the configured one
    pub fn from_config(config: &Config, assistant_id: Option<String>) -> Result<Self> {
        let assistant_id = assistant_id
            .or_else(|| config.assistant.assistant_id.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No assistant configured; set ANALYST_ASSISTANT_ID or run `analyst assistant create`"
                )
            })?;

        let speech = config.speech.enabled.then(|| SpeechSettings {
            model: config.speech.model.clone(),
            voice: config.speech.voice.clone(),
        });

        Ok(Self {
            assistant_id,
            instructions: config.assistant.instructions.clone(),
            poll: PollPolicy::from(&config.poll),
            speech,
            show_progress: false,
        })
    }

    #[cfg(test)]
    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_speech(mut self, speech: Option<SpeechSettings>) -> Self {
        self.speech = speech;
        self
    }

    pub fn with_show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    /// Text of the latest thread message
    pub response: String,
    /// Synthesized speech for `response`, when speech succeeded
    pub audio: Option<Vec<u8>>,
    pub polls: usize,
    pub tool_rounds: usize,
    pub tool_outputs: usize,
}

/// Progress of a run while it is being polled
#[derive(Debug)]
pub(crate) struct RunState {
    pub run_id: String,
    pub polls: usize,
    pub tool_rounds: usize,
    pub tool_outputs: usize,
    /// Consecutive waits since the last state change
    pub attempt: u32,
}

impl RunState {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            polls: 0,
            tool_rounds: 0,
            tool_outputs: 0,
            attempt: 0,
        }
    }

    pub fn record_poll(&mut self) {
        self.polls += 1;
    }

    /// Returns the attempt index to use for the next delay
    pub fn next_attempt(&mut self) -> u32 {
        let attempt = self.attempt;
        self.attempt = self.attempt.saturating_add(1);
        attempt
    }

    pub fn record_tool_round(&mut self, outputs: usize) {
        self.tool_rounds += 1;
        self.tool_outputs += outputs;
        self.attempt = 0;
    }

    pub fn into_outcome(self, response: String, audio: Option<Vec<u8>>) -> RunOutcome {
        RunOutcome {
            run_id: self.run_id,
            response,
            audio,
            polls: self.polls,
            tool_rounds: self.tool_rounds,
            tool_outputs: self.tool_outputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = PollPolicy {
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
            multiplier: 2,
            max_wait: Duration::from_secs(120),
        };

        assert_eq!(policy.delay(0), Duration::from_millis(250));
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_millis(1000));
        assert_eq!(policy.delay(3), Duration::from_millis(2000));
        assert_eq!(policy.delay(4), Duration::from_millis(2000));
        assert_eq!(policy.delay(64), Duration::from_millis(2000));
    }

    #[test]
    fn test_immediate_policy_never_sleeps() {
        let policy = PollPolicy::immediate(Duration::from_secs(1));
        assert!(policy.delay(0).is_zero());
        assert!(policy.delay(10).is_zero());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = PollPolicy::default();
        assert_eq!(policy.initial_backoff, Duration::from_millis(250));
        assert_eq!(policy.max_wait, Duration::from_secs(120));
    }

    #[test]
    fn test_run_config_from_config() {
        let mut config = Config::default();
        assert!(RunConfig::from_config(&config, None).is_err());

        config.assistant.assistant_id = Some("asst_file".into());
        let run_config = RunConfig::from_config(&config, None).unwrap();
        assert_eq!(run_config.assistant_id, "asst_file");
        assert_eq!(
            run_config.speech,
            Some(SpeechSettings {
                model: "tts-1".into(),
                voice: "alloy".into()
            })
        );

        config.speech.enabled = false;
        let run_config = RunConfig::from_config(&config, Some("asst_env".into())).unwrap();
        assert_eq!(run_config.assistant_id, "asst_env");
        assert!(run_config.speech.is_none());
    }

    #[test]
    fn test_run_state_resets_attempts_after_tool_round() {
        let mut state = RunState::new("run_1");
        assert_eq!(state.next_attempt(), 0);
        assert_eq!(state.next_attempt(), 1);
        state.record_tool_round(2);
        assert_eq!(state.next_attempt(), 0);

        let outcome = state.into_outcome("done".into(), None);
        assert_eq!(outcome.tool_rounds, 1);
        assert_eq!(outcome.tool_outputs, 2);
    }
}
