//! Assistant run driver
//!
//! Starts a run on the session thread and polls it to completion, answering
//! tool-call requests from the local tool registry along the way.

mod run_loop;
mod state;

pub use run_loop::RunLoop;
pub use state::RunConfig;
