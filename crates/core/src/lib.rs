//! # Maestro Core
//!
//! Domain types, traits, and error definitions for the Maestro
//! function-calling agent framework. This crate has **zero framework
//! dependencies**: it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping model backends via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod error;
pub mod memory;
pub mod message;
pub mod output;
pub mod plugin;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{Agent, AgentOutput};
pub use error::{AgentError, ConfigError, MemoryError, ProviderError, Result, ToolError};
pub use memory::MemoryService;
pub use message::{Conversation, FunctionCall, Message, Role};
pub use output::{NoopSink, OutputSink, TracingSink};
pub use plugin::Plugin;
pub use provider::{
    BackendResponse, FragmentKind, FragmentStream, FunctionSpec, Provider, RawFunctionCall,
    StreamFragment,
};
pub use tool::{ErrorPolicy, Tool, ToolFault, ToolInput, FALLBACK_ARG};
