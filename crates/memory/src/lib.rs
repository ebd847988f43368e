//! Conversation memory backends for Maestro agents.
//!
//! Two implementations of the core `MemoryService` trait: a two-tier
//! in-process store, and a no-op backend for memoryless agents.

pub mod in_memory;
pub mod noop;

pub use in_memory::InMemoryStore;
pub use noop::NoopMemory;
