//! Plugins: the things an agent can dispatch a function call to.
//!
//! A plugin is either a plain tool or a whole sub-agent. The catalog and
//! dispatch machinery treat both uniformly through this enum.

use std::sync::Arc;

use serde_json::Value;

use crate::agent::Agent;
use crate::tool::Tool;

/// A dispatchable capability registered with an agent.
#[derive(Clone)]
pub enum Plugin {
    Tool(Arc<dyn Tool>),
    SubAgent(Arc<dyn Agent>),
}

impl Plugin {
    pub fn name(&self) -> &str {
        match self {
            Self::Tool(tool) => tool.name(),
            Self::SubAgent(agent) => agent.name(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Tool(tool) => tool.description(),
            Self::SubAgent(agent) => agent.description(),
        }
    }

    /// The declared argument schema. Tools may decline to declare one;
    /// agents always carry an instruction-string schema.
    pub fn args_schema(&self) -> Option<Value> {
        match self {
            Self::Tool(tool) => tool.args_schema(),
            Self::SubAgent(agent) => Some(agent.args_schema()),
        }
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tool(tool) => f.debug_tuple("Tool").field(&tool.name()).finish(),
            Self::SubAgent(agent) => f.debug_tuple("SubAgent").field(&agent.name()).finish(),
        }
    }
}
