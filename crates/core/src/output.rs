//! Output sinks: where an agent narrates its progress.
//!
//! The dispatch loop reports status transitions, streamed text, and the
//! final answer through this trait so the rendering concern stays out of
//! the loop itself. Every method defaults to a no-op; sinks override
//! only what they display.

use tracing::{debug, info};

/// Receives progress and output events from a running agent.
pub trait OutputSink: Send + Sync {
    /// The agent is waiting on a model completion.
    fn thinking(&self) {}

    /// The run finished. `answer` is the final text for sinks that print
    /// it themselves.
    fn done(&self, _answer: Option<&str>) {}

    /// Display a chunk of text. `label` names the panel or section it
    /// belongs to (a tool name, "output"); `append` distinguishes
    /// incremental fragments from whole blocks.
    fn panel_print(&self, _text: &str, _label: Option<&str>, _append: bool) {}

    /// Discard any transient display state.
    fn clear(&self) {}

    /// A short status line ("calling calculator ...").
    fn update_status(&self, _status: &str) {}
}

/// A sink that drops everything. Useful for sub-agent runs whose output
/// the parent folds into its own conversation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl OutputSink for NoopSink {}

/// A sink that forwards everything to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn thinking(&self) {
        debug!("thinking");
    }

    fn done(&self, answer: Option<&str>) {
        match answer {
            Some(text) => info!(answer = %text, "run finished"),
            None => info!("run finished"),
        }
    }

    fn panel_print(&self, text: &str, label: Option<&str>, append: bool) {
        debug!(label = label.unwrap_or("output"), append, "{text}");
    }

    fn update_status(&self, status: &str) {
        debug!(%status, "status");
    }
}
