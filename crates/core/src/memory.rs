//! The conversation memory abstraction.
//!
//! A memory service persists dialogue across runs in two tiers: full
//! user/assistant turns, and the function-call exchanges made while
//! answering them. Implementations live in `maestro-memory`.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::message::{FunctionCall, Message};
use crate::output::OutputSink;

/// Long-lived storage for conversation history.
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// Assemble the context messages to seed a new run answering
    /// `instruction`: relevant past turns, the current working
    /// exchanges, and the instruction itself as the final user message.
    async fn latest_context(
        &self,
        instruction: &str,
        sink: &dyn OutputSink,
    ) -> Result<Vec<Message>, MemoryError>;

    /// Record a completed user/assistant turn.
    async fn save_turn(&self, user: &str, assistant: &str) -> Result<(), MemoryError>;

    /// Record one function-call exchange: the call and the observation
    /// it produced.
    async fn save_exchange(
        &self,
        call: &FunctionCall,
        observation: &str,
    ) -> Result<(), MemoryError>;

    /// Drop the working exchanges accumulated during the current turn.
    async fn clear_working(&self) -> Result<(), MemoryError>;

    /// Retrieve past history matching `query`, rendered as text for the
    /// model to read.
    async fn load_history(&self, query: &str) -> Result<String, MemoryError>;
}
