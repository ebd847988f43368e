//! A dispatch-loop agent with persistent conversation memory.
//!
//! Instead of starting every run from a bare instruction, the memory
//! agent seeds the conversation from a [`MemoryService`]: recent turns,
//! then the working function-call exchanges, then the instruction. Every
//! exchange and completed turn is written back, and a `load_memory` tool
//! is registered on first use so the model can pull older history into
//! context on demand.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use maestro_core::agent::{Agent, AgentOutput};
use maestro_core::error::{AgentError, Result};
use maestro_core::memory::MemoryService;
use maestro_core::message::{Conversation, Message};
use maestro_core::output::OutputSink;
use maestro_core::plugin::Plugin;
use maestro_core::provider::Provider;
use maestro_core::tool::{Tool, ToolFault, ToolInput};
use maestro_telemetry::{PricingTable, UsageMeter};

use crate::catalog::FunctionCatalog;
use crate::driver::{self, CompletionOutcome};
use crate::loop_runner::dispatch_call;

const LOAD_MEMORY_NAME: &str = "load_memory";

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant with access to earlier conversations. \
     Use the load_memory function when the user refers to something not in the \
     current context.";

/// Tool that retrieves past history from the memory service.
pub struct LoadMemoryTool {
    memory: Arc<dyn MemoryService>,
}

impl LoadMemoryTool {
    pub fn new(memory: Arc<dyn MemoryService>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for LoadMemoryTool {
    fn name(&self) -> &str {
        LOAD_MEMORY_NAME
    }

    fn description(&self) -> &str {
        "Retrieve earlier conversation history matching a query."
    }

    fn args_schema(&self) -> Option<Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords describing what to look for in past conversations"
                }
            },
            "required": ["query"]
        }))
    }

    async fn call(&self, input: ToolInput) -> std::result::Result<String, ToolFault> {
        let query = match &input {
            ToolInput::Text(text) => text.clone(),
            ToolInput::Args(map) => map
                .get("query")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolFault::new("Missing 'query' argument"))?
                .to_owned(),
        };
        self.memory
            .load_history(&query)
            .await
            .map_err(|e| ToolFault::new(e.to_string()))
    }
}

/// A [`FunctionAgent`](crate::FunctionAgent) variant whose conversation
/// persists across runs through a memory service.
pub struct MemoryAgent {
    name: String,
    description: String,
    provider: Arc<dyn Provider>,
    plugins: Mutex<Vec<Plugin>>,
    memory: Arc<dyn MemoryService>,
    system_prompt: String,
    pricing: Arc<PricingTable>,
    max_turns: u32,
    cancel: CancellationToken,
}

impl MemoryAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        provider: Arc<dyn Provider>,
        memory: Arc<dyn MemoryService>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            provider,
            plugins: Mutex::new(Vec::new()),
            memory,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            pricing: Arc::new(PricingTable::with_defaults()),
            max_turns: 25,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.get_mut().push(plugin);
        self
    }

    pub fn with_plugins(mut self, plugins: impl IntoIterator<Item = Plugin>) -> Self {
        self.plugins.get_mut().extend(plugins);
        self
    }

    pub fn with_pricing(mut self, pricing: Arc<PricingTable>) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Register the `load_memory` tool if no plugin claims the name yet.
    /// Deferred to run time so user plugins registered after construction
    /// can still take precedence.
    async fn ensure_memory_tool(&self) {
        let mut plugins = self.plugins.lock().await;
        if !plugins.iter().any(|p| p.name() == LOAD_MEMORY_NAME) {
            debug!("registering {LOAD_MEMORY_NAME} tool");
            plugins.push(Plugin::Tool(Arc::new(LoadMemoryTool::new(
                self.memory.clone(),
            ))));
        }
    }

    async fn run_inner(
        &self,
        instruction: &str,
        sink: &dyn OutputSink,
        streaming: bool,
    ) -> Result<AgentOutput> {
        self.ensure_memory_tool().await;

        let mut conversation = Conversation::new(&self.system_prompt);
        for message in self.memory.latest_context(instruction, sink).await? {
            conversation.push(message);
        }

        info!(agent = %self.name, context = conversation.len(), streaming, "starting run");
        let mut meter = UsageMeter::new();

        for turn in 1..=self.max_turns {
            if self.cancel.is_cancelled() {
                warn!(agent = %self.name, turn, "run cancelled");
                return Err(AgentError::Cancelled);
            }

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
                    self.memory.save_turn(instruction, &text).await?;
                    self.memory.clear_working().await?;
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
                    self.memory.save_exchange(&call, &observation).await?;
                    conversation.push(Message::function_result(&call.name, &observation));
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
impl Agent for MemoryAgent {
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

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_core::error::ProviderError;
    use maestro_core::output::NoopSink;
    use maestro_core::provider::{BackendResponse, FunctionSpec, RawFunctionCall};
    use maestro_memory::InMemoryStore;
    use std::collections::VecDeque;

    struct MockProvider {
        script: Mutex<VecDeque<BackendResponse>>,
    }

    impl MockProvider {
        fn new(script: Vec<BackendResponse>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }
        fn model(&self) -> &str {
            "mock-model"
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _functions: &[FunctionSpec],
        ) -> std::result::Result<BackendResponse, ProviderError> {
            self.script
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| ProviderError::MalformedResponse("script exhausted".into()))
        }
    }

    fn answer(text: &str) -> BackendResponse {
        BackendResponse {
            content: Some(text.into()),
            prompt_tokens: 10,
            completion_tokens: 5,
            ..Default::default()
        }
    }

    fn call(name: &str, arguments: &str) -> BackendResponse {
        BackendResponse {
            function_call: Some(RawFunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            }),
            ..Default::default()
        }
    }

    fn agent(script: Vec<BackendResponse>, store: Arc<InMemoryStore>) -> MemoryAgent {
        MemoryAgent::new(
            "maestro",
            "memory test agent",
            MockProvider::new(script),
            store,
        )
    }

    #[tokio::test]
    async fn memory_tool_registered_on_first_run() {
        let store = Arc::new(InMemoryStore::new(10));
        let agent = agent(vec![answer("hi")], store);

        assert_eq!(agent.plugins.lock().await.len(), 0);
        agent.run("hello", &NoopSink).await.unwrap();

        let plugins = agent.plugins.lock().await;
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].name(), LOAD_MEMORY_NAME);
    }

    #[tokio::test]
    async fn completed_turn_is_saved_and_working_cleared() {
        let store = Arc::new(InMemoryStore::new(10));
        let agent = agent(
            vec![
                call(LOAD_MEMORY_NAME, r#"{"query": "anything"}"#),
                answer("done"),
            ],
            store.clone(),
        );

        agent.run("remember this", &NoopSink).await.unwrap();

        assert_eq!(store.turn_count().await, 1);
        assert_eq!(store.working_count().await, 0);
    }

    #[tokio::test]
    async fn second_run_sees_the_first_turn() {
        let store = Arc::new(InMemoryStore::new(10));

        let first = agent(vec![answer("Paris")], store.clone());
        first
            .run("what is the capital of France?", &NoopSink)
            .await
            .unwrap();

        let context = store.latest_context("next question", &NoopSink).await.unwrap();
        // previous user + assistant + new instruction
        assert_eq!(context.len(), 3);
        assert_eq!(context[1].content.as_deref(), Some("Paris"));
    }

    #[tokio::test]
    async fn load_memory_tool_reads_history() {
        let store = Arc::new(InMemoryStore::new(10));
        store
            .save_turn("tell me about rust", "Rust is a systems language")
            .await
            .unwrap();

        let tool = LoadMemoryTool::new(store);
        let mut map = serde_json::Map::new();
        map.insert("query".into(), serde_json::json!("rust"));
        let out = tool.run(ToolInput::Args(map)).await.unwrap();
        assert!(out.contains("systems language"));
    }

    #[tokio::test]
    async fn user_plugin_with_same_name_takes_precedence() {
        struct Custom;

        #[async_trait]
        impl Tool for Custom {
            fn name(&self) -> &str {
                LOAD_MEMORY_NAME
            }
            fn description(&self) -> &str {
                "custom memory loader"
            }
            async fn call(&self, _input: ToolInput) -> std::result::Result<String, ToolFault> {
                Ok("custom".into())
            }
        }

        let store = Arc::new(InMemoryStore::new(10));
        let agent = agent(vec![answer("ok")], store)
            .with_plugin(Plugin::Tool(Arc::new(Custom)));

        agent.run("hello", &NoopSink).await.unwrap();

        // No second load_memory registration
        let plugins = agent.plugins.lock().await;
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].description(), "custom memory loader");
    }
}
