//! Session lifecycle: one remote thread per session

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use analyst_core::{AssistantApi, Thread};

/// Conversation state scoped to one invocation.
///
/// The thread is created by `start` and deleted by `end`.
pub struct Session {
    assistant: Arc<dyn AssistantApi>,
    thread: Thread,
}

impl Session {
    /// Create a fresh thread on the assistant service
    pub async fn start(assistant: Arc<dyn AssistantApi>) -> Result<Self> {
        let thread = assistant
            .create_thread()
            .await
            .context("Failed to start session")?;
        info!(thread_id = %thread.id, "Session started");
        Ok(Self { assistant, thread })
    }

    pub fn thread_id(&self) -> &str {
        &self.thread.id
    }

    /// Tear the session down, deleting its thread
    pub async fn end(self) -> Result<()> {
        self.assistant
            .delete_thread(&self.thread.id)
            .await
            .with_context(|| format!("Failed to delete thread {}", self.thread.id))?;
        debug!(thread_id = %self.thread.id, "Session ended");
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("thread_id", &self.thread.id)
            .finish()
    }
}
