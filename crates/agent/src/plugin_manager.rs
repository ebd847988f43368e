//! Plugin manager: a forgiving dispatch surface over a plugin set.
//!
//! Unlike the dispatch loop, which treats an unknown function name as
//! fatal, the manager answers every request with an observation. Unknown
//! names and propagated failures come back as a sentinel so callers that
//! cannot recover from errors (evaluation harnesses, scripted drivers)
//! always get text to continue with.

use serde_json::{Map, Value};
use tracing::warn;

use maestro_core::error::ConfigError;
use maestro_core::message::FunctionCall;
use maestro_core::output::OutputSink;
use maestro_core::plugin::Plugin;
use maestro_telemetry::UsageMeter;

use crate::catalog::FunctionCatalog;
use crate::loop_runner::dispatch_call;

/// Observation text returned when a request cannot be served.
pub const NO_EVIDENCE: &str = "No evidence found";

/// The outcome of one managed invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginResponse {
    pub observation: String,
    /// Cost folded in from sub-agent runs, zero for plain tools.
    pub monetary_cost: f64,
    pub token_usage: u64,
}

/// Dispatches calls by name against a fixed plugin set.
#[derive(Debug)]
pub struct PluginManager {
    catalog: FunctionCatalog,
}

impl PluginManager {
    /// Build a manager over a plugin set. Duplicate names are rejected
    /// up front, same as the dispatch loop.
    pub fn new(plugins: Vec<Plugin>) -> Result<Self, ConfigError> {
        Ok(Self {
            catalog: FunctionCatalog::build(plugins)?,
        })
    }

    /// Names of the managed plugins, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.catalog.specs().iter().map(|s| s.name.as_str()).collect()
    }

    /// Invoke a plugin by name.
    ///
    /// Unknown names and invocation failures both produce the
    /// [`NO_EVIDENCE`] sentinel instead of an error.
    pub async fn run(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        sink: &dyn OutputSink,
    ) -> PluginResponse {
        let Some(plugin) = self.catalog.get(name) else {
            warn!(function = %name, "request for unknown plugin");
            return PluginResponse {
                observation: NO_EVIDENCE.into(),
                monetary_cost: 0.0,
                token_usage: 0,
            };
        };

        let call = FunctionCall {
            name: name.to_owned(),
            arguments,
        };
        let mut meter = UsageMeter::new();
        match dispatch_call(plugin, &call, sink, &mut meter).await {
            Ok(observation) => PluginResponse {
                observation,
                monetary_cost: meter.monetary_cost(),
                token_usage: meter.token_usage(),
            },
            Err(e) => {
                warn!(function = %name, error = %e, "managed invocation failed");
                PluginResponse {
                    observation: NO_EVIDENCE.into(),
                    monetary_cost: meter.monetary_cost(),
                    token_usage: meter.token_usage(),
                }
            }
        }
    }
}
