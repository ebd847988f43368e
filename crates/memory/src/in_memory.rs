//! Two-tier in-process memory store.
//!
//! Tier one holds completed user/assistant turns; tier two holds the
//! function-call exchanges made while answering the current instruction.
//! Context assembly replays the most recent turns, then the working
//! exchanges, then the new instruction, so a fresh run picks up where
//! the dialogue left off.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use maestro_core::error::MemoryError;
use maestro_core::memory::MemoryService;
use maestro_core::message::{FunctionCall, Message};
use maestro_core::output::OutputSink;

/// A completed dialogue turn.
#[derive(Debug, Clone)]
struct Turn {
    user: String,
    assistant: String,
}

/// One function-call exchange made during the current turn.
#[derive(Debug, Clone)]
struct Exchange {
    call: FunctionCall,
    observation: String,
}

/// An in-process [`MemoryService`] backed by `RwLock`ed vectors.
pub struct InMemoryStore {
    turns: RwLock<Vec<Turn>>,
    working: RwLock<Vec<Exchange>>,
    recent_turns: usize,
}

impl InMemoryStore {
    /// Create a store that replays up to `recent_turns` past turns into
    /// each new context.
    pub fn new(recent_turns: usize) -> Self {
        Self {
            turns: RwLock::new(Vec::new()),
            working: RwLock::new(Vec::new()),
            recent_turns,
        }
    }

    /// Number of completed turns on record.
    pub async fn turn_count(&self) -> usize {
        self.turns.read().await.len()
    }

    /// Number of working exchanges accumulated for the current turn.
    pub async fn working_count(&self) -> usize {
        self.working.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl MemoryService for InMemoryStore {
    async fn latest_context(
        &self,
        instruction: &str,
        sink: &dyn OutputSink,
    ) -> Result<Vec<Message>, MemoryError> {
        let turns = self.turns.read().await;
        let working = self.working.read().await;

        let skip = turns.len().saturating_sub(self.recent_turns);
        let mut context = Vec::new();
        for turn in turns.iter().skip(skip) {
            context.push(Message::user(&turn.user));
            context.push(Message::assistant(&turn.assistant));
        }
        for exchange in working.iter() {
            context.push(Message::assistant_call(exchange.call.clone()));
            context.push(Message::function_result(
                &exchange.call.name,
                &exchange.observation,
            ));
        }
        context.push(Message::user(instruction));

        if !turns.is_empty() || !working.is_empty() {
            sink.update_status("recalling conversation memory");
        }
        debug!(
            turns = turns.len() - skip,
            exchanges = working.len(),
            "assembled context"
        );

        Ok(context)
    }

    async fn save_turn(&self, user: &str, assistant: &str) -> Result<(), MemoryError> {
        self.turns.write().await.push(Turn {
            user: user.to_owned(),
            assistant: assistant.to_owned(),
        });
        Ok(())
    }

    async fn save_exchange(
        &self,
        call: &FunctionCall,
        observation: &str,
    ) -> Result<(), MemoryError> {
        self.working.write().await.push(Exchange {
            call: call.clone(),
            observation: observation.to_owned(),
        });
        Ok(())
    }

    async fn clear_working(&self) -> Result<(), MemoryError> {
        self.working.write().await.clear();
        Ok(())
    }

    async fn load_history(&self, query: &str) -> Result<String, MemoryError> {
        let turns = self.turns.read().await;
        let query_lower = query.to_lowercase();

        let matching: Vec<String> = turns
            .iter()
            .filter(|t| {
                query_lower
                    .split_whitespace()
                    .any(|word| {
                        t.user.to_lowercase().contains(word)
                            || t.assistant.to_lowercase().contains(word)
                    })
            })
            .map(|t| format!("User: {}\nAssistant: {}", t.user, t.assistant))
            .collect();

        if matching.is_empty() {
            return Ok("No matching history.".into());
        }
        Ok(matching.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_core::output::NoopSink;
    use serde_json::json;

    fn call(name: &str, key: &str, value: &str) -> FunctionCall {
        let mut arguments = serde_json::Map::new();
        arguments.insert(key.into(), json!(value));
        FunctionCall {
            name: name.into(),
            arguments,
        }
    }

    #[tokio::test]
    async fn context_ends_with_instruction() {
        let store = InMemoryStore::new(10);
        let context = store.latest_context("hello", &NoopSink).await.unwrap();
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn context_replays_turns_then_exchanges() {
        let store = InMemoryStore::new(10);
        store.save_turn("hi", "hello there").await.unwrap();
        store
            .save_exchange(&call("calculator", "expression", "1 + 1"), "2")
            .await
            .unwrap();

        let context = store.latest_context("and now?", &NoopSink).await.unwrap();
        // user, assistant, assistant_call, function, user
        assert_eq!(context.len(), 5);
        assert!(context[2].function_call.is_some());
        assert_eq!(context[3].name.as_deref(), Some("calculator"));
        assert_eq!(context[4].content.as_deref(), Some("and now?"));
    }

    #[tokio::test]
    async fn old_turns_fall_out_of_context() {
        let store = InMemoryStore::new(2);
        for i in 0..5 {
            store
                .save_turn(&format!("q{i}"), &format!("a{i}"))
                .await
                .unwrap();
        }

        let context = store.latest_context("next", &NoopSink).await.unwrap();
        // 2 turns * 2 messages + instruction
        assert_eq!(context.len(), 5);
        assert_eq!(context[0].content.as_deref(), Some("q3"));
    }

    #[tokio::test]
    async fn clear_working_drops_exchanges_but_not_turns() {
        let store = InMemoryStore::new(10);
        store.save_turn("q", "a").await.unwrap();
        store
            .save_exchange(&call("echo", "__arg1", "x"), "x")
            .await
            .unwrap();

        store.clear_working().await.unwrap();
        assert_eq!(store.working_count().await, 0);
        assert_eq!(store.turn_count().await, 1);
    }

    #[tokio::test]
    async fn load_history_matches_keywords() {
        let store = InMemoryStore::new(10);
        store
            .save_turn("what is the capital of France", "Paris")
            .await
            .unwrap();
        store.save_turn("how tall is Everest", "8849 m").await.unwrap();

        let hit = store.load_history("france").await.unwrap();
        assert!(hit.contains("Paris"));
        assert!(!hit.contains("Everest"));

        let miss = store.load_history("zebras").await.unwrap();
        assert_eq!(miss, "No matching history.");
    }
}
