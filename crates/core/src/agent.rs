//! The agent abstraction.
//!
//! An agent takes a natural-language instruction and produces a final
//! answer plus accounting. Agents are composable: any agent can be
//! registered as a plugin of another agent and invoked like a tool.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::output::OutputSink;

/// The result of a complete agent run: the final answer and the total
/// accounting for every completion made along the way, including
/// sub-agent runs.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    pub output: String,
    pub monetary_cost: f64,
    pub token_usage: u64,
}

impl AgentOutput {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            monetary_cost: 0.0,
            token_usage: 0,
        }
    }
}

/// A runnable agent, invocable either directly or as a sub-agent plugin
/// of an enclosing agent.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique name within an enclosing catalog.
    fn name(&self) -> &str;

    /// Natural-language description shown to an enclosing model.
    fn description(&self) -> &str;

    /// Argument schema used when this agent appears as a plugin. Agents
    /// take a single instruction string.
    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "instruction": {
                    "type": "string",
                    "description": "The instruction to carry out"
                }
            },
            "required": ["instruction"]
        })
    }

    /// Run the agent to completion on one instruction.
    async fn run(&self, instruction: &str, sink: &dyn OutputSink) -> Result<AgentOutput>;

    /// Run the agent with incremental output. The default delegates to
    /// [`Agent::run`]; agents with a true streaming path override this.
    async fn stream(&self, instruction: &str, sink: &dyn OutputSink) -> Result<AgentOutput> {
        self.run(instruction, sink).await
    }
}
