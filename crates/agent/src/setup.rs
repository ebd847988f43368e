//! Agent assembly from configuration.
//!
//! Turns a loaded [`AppConfig`] into running pieces: a provider bound to
//! the configured endpoint and model, a pricing table with any custom
//! overrides applied, a memory backend, and fully wired agents.

use std::sync::Arc;

use tracing::debug;

use maestro_config::AppConfig;
use maestro_core::error::{ConfigError, ProviderError};
use maestro_core::memory::MemoryService;
use maestro_core::plugin::Plugin;
use maestro_core::provider::Provider;
use maestro_memory::{InMemoryStore, NoopMemory};
use maestro_providers::OpenAiCompatProvider;
use maestro_telemetry::{ModelPricing, PricingTable};

use crate::loop_runner::FunctionAgent;
use crate::memory_agent::MemoryAgent;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Build the pricing table: the built-in defaults with the configured
/// per-model overrides applied on top.
pub fn pricing_from_config(config: &AppConfig) -> PricingTable {
    let table = PricingTable::with_defaults();
    for (model, rates) in &config.custom_pricing {
        debug!(%model, "applying custom pricing");
        table.set(
            model,
            ModelPricing::new(rates.prompt_per_m, rates.completion_per_m),
        );
    }
    table
}

/// Build the configured model backend.
///
/// Fails with [`ProviderError::AuthenticationFailed`] when no API key is
/// configured, before any request is made.
pub fn provider_from_config(
    config: &AppConfig,
) -> Result<OpenAiCompatProvider, ProviderError> {
    let Some(api_key) = config.api_key.as_deref() else {
        return Err(ProviderError::AuthenticationFailed(
            "No API key configured (set api_key or MAESTRO_API_KEY)".into(),
        ));
    };
    let base_url = config.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
    Ok(
        OpenAiCompatProvider::new("openai", base_url, api_key, config.model.as_str())?
            .with_temperature(config.temperature),
    )
}

/// Build the configured memory backend: an in-process two-tier store
/// when memory is enabled, the no-op backend otherwise.
pub fn memory_from_config(config: &AppConfig) -> Arc<dyn MemoryService> {
    if config.memory.enabled {
        Arc::new(InMemoryStore::new(config.memory.recent_turns))
    } else {
        Arc::new(NoopMemory)
    }
}

/// Wire a [`FunctionAgent`] from configuration: identity, system prompt,
/// turn budget, pricing, and the given plugins.
pub fn function_agent_from_config(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    plugins: Vec<Plugin>,
) -> Result<FunctionAgent, ConfigError> {
    let mut agent = FunctionAgent::new(
        config.agent.name.clone(),
        config.agent.description.clone(),
        provider,
    )
    .with_pricing(Arc::new(pricing_from_config(config)))
    .with_max_turns(config.agent.max_turns)
    .with_plugins(plugins);

    if let Some(prompt) = &config.agent.system_prompt {
        agent = agent.with_system_prompt(prompt.clone())?;
    }
    Ok(agent)
}

/// Wire a [`MemoryAgent`] from configuration, with the memory backend
/// selected by the `[memory]` section.
pub fn memory_agent_from_config(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    plugins: Vec<Plugin>,
) -> MemoryAgent {
    let mut agent = MemoryAgent::new(
        config.agent.name.clone(),
        config.agent.description.clone(),
        provider,
        memory_from_config(config),
    )
    .with_pricing(Arc::new(pricing_from_config(config)))
    .with_max_turns(config.agent.max_turns)
    .with_plugins(plugins);

    if let Some(prompt) = &config.agent.system_prompt {
        agent = agent.with_system_prompt(prompt.clone());
    }
    agent
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use maestro_config::PricingOverrideConfig;
    use maestro_core::agent::Agent;
    use maestro_core::error::AgentError;
    use maestro_core::message::Message;
    use maestro_core::output::NoopSink;
    use maestro_core::provider::{BackendResponse, FunctionSpec, RawFunctionCall};
    use tokio::sync::Mutex;

    /// Records the messages of the first completion and always answers.
    struct Recording {
        seen: Mutex<Vec<Message>>,
        response: BackendResponse,
    }

    impl Recording {
        fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                response: BackendResponse {
                    content: Some(text.into()),
                    ..Default::default()
                },
            })
        }

        fn calling(name: &str, arguments: &str) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                response: BackendResponse {
                    function_call: Some(RawFunctionCall {
                        name: name.into(),
                        arguments: arguments.into(),
                    }),
                    ..Default::default()
                },
            })
        }
    }

    #[async_trait]
    impl Provider for Recording {
        fn name(&self) -> &str {
            "recording"
        }
        fn model(&self) -> &str {
            "mock-model"
        }

        async fn complete(
            &self,
            messages: &[Message],
            _functions: &[FunctionSpec],
        ) -> Result<BackendResponse, ProviderError> {
            let mut seen = self.seen.lock().await;
            if seen.is_empty() {
                seen.extend_from_slice(messages);
            }
            Ok(self.response.clone())
        }
    }

    fn config() -> AppConfig {
        AppConfig::default()
    }

    #[test]
    fn custom_pricing_overrides_apply() {
        let mut config = config();
        config.custom_pricing.insert(
            "local-llama".into(),
            PricingOverrideConfig {
                prompt_per_m: 1.0,
                completion_per_m: 2.0,
            },
        );

        let table = pricing_from_config(&config);
        let cost = table.compute_cost("local-llama", 1_000_000, 1_000_000);
        assert!((cost - 3.0).abs() < 1e-10);
        // Defaults survive alongside the override
        assert!(table.compute_cost("gpt-4o-mini", 1_000_000, 0) > 0.0);
    }

    #[test]
    fn provider_requires_an_api_key() {
        let err = provider_from_config(&config()).unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));

        let mut with_key = config();
        with_key.api_key = Some("sk-test".into());
        let provider = provider_from_config(&with_key).unwrap();
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[tokio::test]
    async fn memory_backend_follows_the_toggle() {
        let mut enabled = config();
        enabled.memory.enabled = true;
        enabled.memory.recent_turns = 3;
        let store = memory_from_config(&enabled);
        store.save_turn("q", "a").await.unwrap();
        let context = store.latest_context("next", &NoopSink).await.unwrap();
        assert_eq!(context.len(), 3);

        let noop = memory_from_config(&config());
        noop.save_turn("q", "a").await.unwrap();
        let context = noop.latest_context("next", &NoopSink).await.unwrap();
        assert_eq!(context.len(), 1);
    }

    #[tokio::test]
    async fn configured_system_prompt_reaches_the_model() {
        let mut config = config();
        config.agent.system_prompt = Some("Your name is Maestro.".into());

        let provider = Recording::answering("hello");
        let agent =
            function_agent_from_config(&config, provider.clone(), vec![]).unwrap();
        agent.run("hi", &NoopSink).await.unwrap();

        let seen = provider.seen.lock().await;
        assert_eq!(seen[0].content.as_deref(), Some("Your name is Maestro."));
    }

    #[tokio::test]
    async fn configured_turn_budget_is_enforced() {
        let mut config = config();
        config.agent.max_turns = 2;

        let provider = Recording::calling("load_memory", r#"{"query": "anything"}"#);
        let agent = memory_agent_from_config(&config, provider, vec![]);

        let err = agent.run("loop", &NoopSink).await.unwrap_err();
        assert!(matches!(err, AgentError::TurnLimitExceeded { limit: 2 }));
    }
}
