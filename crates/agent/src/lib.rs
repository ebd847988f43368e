//! Function-calling dispatch loop and agent implementations.
//!
//! The machinery that turns a set of plugins plus a model backend into a
//! runnable agent: catalog construction, argument parsing, completion
//! driving (batch and streaming), and the dispatch loop itself.

pub mod catalog;
pub mod driver;
pub mod loop_runner;
pub mod memory_agent;
pub mod parse;
pub mod plugin_manager;
pub mod setup;

pub use catalog::FunctionCatalog;
pub use driver::{CompletionOutcome, DriverResult};
pub use loop_runner::FunctionAgent;
pub use memory_agent::{LoadMemoryTool, MemoryAgent};
pub use plugin_manager::{PluginManager, PluginResponse, NO_EVIDENCE};
pub use setup::{
    function_agent_from_config, memory_agent_from_config, memory_from_config,
    pricing_from_config, provider_from_config,
};
