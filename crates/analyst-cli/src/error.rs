//! Failure modes of the run-poll-dispatch loop

use std::time::Duration;

use analyst_core::RunStatus;

/// Terminal loop failures, carried inside `anyhow::Error`
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("unknown function '{name}' requested by tool call {call_id}")]
    UnknownFunction { name: String, call_id: String },

    #[error("invalid arguments for tool call {call_id}: {reason}")]
    InvalidArguments { call_id: String, reason: String },

    #[error("run {run_id} ended with status {status}: {reason}")]
    RunEnded {
        run_id: String,
        status: RunStatus,
        reason: String,
    },

    #[error("run {run_id} requires action but listed no tool calls")]
    MissingAction { run_id: String },

    #[error("run {run_id} did not finish within {waited:?}")]
    Timeout { run_id: String, waited: Duration },

    #[error("thread {thread_id} has no assistant reply")]
    EmptyResponse { thread_id: String },
}
