//! Memoryless backend.

use async_trait::async_trait;

use maestro_core::error::MemoryError;
use maestro_core::memory::MemoryService;
use maestro_core::message::{FunctionCall, Message};
use maestro_core::output::OutputSink;

/// A [`MemoryService`] that remembers nothing. Every run starts from a
/// bare instruction.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMemory;

#[async_trait]
impl MemoryService for NoopMemory {
    async fn latest_context(
        &self,
        instruction: &str,
        _sink: &dyn OutputSink,
    ) -> Result<Vec<Message>, MemoryError> {
        Ok(vec![Message::user(instruction)])
    }

    async fn save_turn(&self, _user: &str, _assistant: &str) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn save_exchange(
        &self,
        _call: &FunctionCall,
        _observation: &str,
    ) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn clear_working(&self) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn load_history(&self, _query: &str) -> Result<String, MemoryError> {
        Ok("No history available.".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_core::output::NoopSink;

    #[tokio::test]
    async fn context_is_just_the_instruction() {
        let context = NoopMemory.latest_context("hi", &NoopSink).await.unwrap();
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].content.as_deref(), Some("hi"));
    }
}
