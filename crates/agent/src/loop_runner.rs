//! The function-calling dispatch loop.
//!
//! Each turn advertises the plugin catalog, runs one completion, and
//! either finishes on a plain-text answer or invokes the requested
//! plugin and feeds the observation back for the next turn.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use maestro_core::agent::{Agent, AgentOutput};
use maestro_core::error::{AgentError, ConfigError, Result};
use maestro_core::message::{Conversation, FunctionCall, Message};
use maestro_core::output::{NoopSink, OutputSink};
use maestro_core::plugin::Plugin;
use maestro_core::provider::Provider;
use maestro_core::tool::{ToolInput, FALLBACK_ARG};
use maestro_telemetry::{PricingTable, UsageMeter};

use crate::catalog::FunctionCatalog;
use crate::driver::{self, CompletionOutcome};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// An agent that answers instructions by looping model completions
/// against a plugin catalog until the model produces a final answer.
pub struct FunctionAgent {
    name: String,
    description: String,
    provider: Arc<dyn Provider>,
    plugins: Mutex<Vec<Plugin>>,
    conversation: Mutex<Conversation>,
    pricing: Arc<PricingTable>,
    max_turns: u32,
    cancel: CancellationToken,
}

impl FunctionAgent {
    /// Create an agent with the default system prompt and no plugins.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            provider,
            plugins: Mutex::new(Vec::new()),
            conversation: Mutex::new(Conversation::new(DEFAULT_SYSTEM_PROMPT)),
            pricing: Arc::new(PricingTable::with_defaults()),
            max_turns: 25,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the system prompt. Only possible before the first run has
    /// pushed messages, which is always true at build time.
    pub fn with_system_prompt(
        mut self,
        prompt: impl Into<String>,
    ) -> std::result::Result<Self, ConfigError> {
        self.conversation.get_mut().set_system_message(prompt)?;
        Ok(self)
    }

    /// Register a plugin.
    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.get_mut().push(plugin);
        self
    }

    /// Register several plugins at once.
    pub fn with_plugins(mut self, plugins: impl IntoIterator<Item = Plugin>) -> Self {
        self.plugins.get_mut().extend(plugins);
        self
    }

    /// Use a custom pricing table for cost accounting.
    pub fn with_pricing(mut self, pricing: Arc<PricingTable>) -> Self {
        self.pricing = pricing;
        self
    }

    /// Set the completion budget per run.
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Attach a cancellation token, checked between loop iterations.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    async fn run_inner(
        &self,
        instruction: &str,
        sink: &dyn OutputSink,
        streaming: bool,
    ) -> Result<AgentOutput> {
        let mut conversation = self.conversation.lock().await;
        conversation.clear();
        conversation.push(Message::user(instruction));

        info!(agent = %self.name, streaming, "starting run");
        let mut meter = UsageMeter::new();

        for turn in 1..=self.max_turns {
            if self.cancel.is_cancelled() {
                warn!(agent = %self.name, turn, "run cancelled");
                return Err(AgentError::Cancelled);
            }

            // Rebuilt each turn so plugins registered mid-run are seen.
            let catalog = FunctionCatalog::build(self.plugins.lock().await.clone())?;
            debug!(turn, functions = catalog.len(), "dispatch loop turn");

            sink.thinking();
            let result = if streaming {
                driver::stream_complete(
                    self.provider.as_ref(),
                    conversation.messages(),
                    catalog.specs(),
                    sink,
                )
                .await?
            } else {
                driver::complete(
                    self.provider.as_ref(),
                    conversation.messages(),
                    catalog.specs(),
                )
                .await?
            };
            meter.record_completion(
                &self.pricing,
                self.provider.model(),
                result.prompt_tokens,
                result.completion_tokens,
            );

            match result.outcome {
                CompletionOutcome::Answer(text) => {
                    conversation.push(Message::assistant(&text));
                    debug_assert!(conversation.check_invariants());
                    sink.done(if streaming { None } else { Some(&text) });
                    return Ok(meter.into_output(text));
                }
                CompletionOutcome::Call(call) => {
                    let Some(plugin) = catalog.get(&call.name) else {
                        warn!(function = %call.name, "model called an unknown function");
                        return Err(AgentError::UnknownTool(call.name));
                    };
                    conversation.push(Message::assistant_call(call.clone()));
                    let observation = dispatch_call(plugin, &call, sink, &mut meter).await?;
                    conversation.push(Message::function_result(&call.name, &observation));
                    debug_assert!(conversation.check_invariants());
                }
            }
        }

        warn!(agent = %self.name, limit = self.max_turns, "turn budget exhausted");
        Err(AgentError::TurnLimitExceeded {
            limit: self.max_turns,
        })
    }
}

#[async_trait]
impl Agent for FunctionAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, instruction: &str, sink: &dyn OutputSink) -> Result<AgentOutput> {
        self.run_inner(instruction, sink, false).await
    }

    async fn stream(&self, instruction: &str, sink: &dyn OutputSink) -> Result<AgentOutput> {
        self.run_inner(instruction, sink, true).await
    }
}

/// Invoke a resolved plugin and return its observation text.
///
/// Sub-agent runs execute against a silent sink, and their accounting is
/// folded into the enclosing run's meter.
pub(crate) async fn dispatch_call(
    plugin: &Plugin,
    call: &FunctionCall,
    sink: &dyn OutputSink,
    meter: &mut UsageMeter,
) -> Result<String> {
    match plugin {
        Plugin::Tool(tool) => {
            sink.update_status(&format!("calling {} ...", tool.name()));
            let observation = tool.run(ToolInput::Args(call.arguments.clone())).await?;
            Ok(observation)
        }
        Plugin::SubAgent(agent) => {
            sink.update_status(&format!("delegating to {} ...", agent.name()));
            let instruction = sub_agent_instruction(&call.arguments);
            let output = agent.run(&instruction, &NoopSink).await?;
            meter.record_sub_run(&output);
            Ok(output.output)
        }
    }
}

/// Extract the instruction string for a sub-agent call. Falls back to
/// rendering the whole argument object when neither expected key is
/// present.
fn sub_agent_instruction(arguments: &serde_json::Map<String, Value>) -> String {
    arguments
        .get("instruction")
        .or_else(|| arguments.get(FALLBACK_ARG))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| Value::Object(arguments.clone()).to_string())
}
