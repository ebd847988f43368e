//! The tool abstraction: a named, describable, invocable capability.
//!
//! Tools declare an optional JSON Schema for their arguments and a
//! configurable policy for how declared faults surface back into the
//! conversation. The provided [`Tool::run`] wrapper performs input
//! validation and policy application around the implementor's
//! [`Tool::call`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ToolError;

/// Arguments delivered to a tool invocation.
///
/// `Text` is the degenerate single-string form used when a tool declares
/// no schema; `Args` is the structured form matching a declared schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    Text(String),
    Args(Map<String, Value>),
}

impl ToolInput {
    /// The raw text for schema-less tools. Structured arguments are
    /// rendered back to JSON.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Args(map) => Value::Object(map.clone()).to_string(),
        }
    }
}

/// A declared, recoverable failure raised by a tool body.
///
/// Distinct from infrastructure errors: a fault is part of the tool's
/// contract and is routed through the tool's [`ErrorPolicy`].
#[derive(Debug, Clone)]
pub struct ToolFault {
    pub message: String,
}

impl ToolFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ToolFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// How a declared [`ToolFault`] surfaces back into the dispatch loop.
#[derive(Clone, Default)]
pub enum ErrorPolicy {
    /// Convert the fault into a hard [`ToolError::Fault`], aborting the run.
    #[default]
    Propagate,
    /// Return the fault message as the observation text so the model can
    /// see the failure and react to it.
    Report,
    /// Return this fixed text as the observation, ignoring the fault
    /// message entirely.
    Message(String),
    /// Derive the observation from the fault via a caller-supplied hook.
    Handler(Arc<dyn Fn(&ToolFault) -> String + Send + Sync>),
}

impl fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Propagate => f.write_str("Propagate"),
            Self::Report => f.write_str("Report"),
            Self::Message(m) => f.debug_tuple("Message").field(m).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name within a catalog.
    fn name(&self) -> &str;

    /// Natural-language description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the arguments, or `None` to accept a single
    /// free-form string.
    fn args_schema(&self) -> Option<Value> {
        None
    }

    /// Policy applied when [`Tool::call`] raises a [`ToolFault`].
    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Propagate
    }

    /// The tool body. Implementors raise [`ToolFault`] for declared,
    /// recoverable failures.
    async fn call(&self, input: ToolInput) -> std::result::Result<String, ToolFault>;

    /// Validate input, invoke the body, and apply the error policy.
    /// This is the entry point the dispatch loop uses.
    async fn run(&self, input: ToolInput) -> std::result::Result<String, ToolError> {
        let input = validate_input(self.name(), self.args_schema().as_ref(), input)?;
        match self.call(input).await {
            Ok(observation) => Ok(observation),
            Err(fault) => {
                debug!(tool = self.name(), fault = %fault, "tool raised a fault");
                match self.error_policy() {
                    ErrorPolicy::Propagate => Err(ToolError::Fault {
                        tool_name: self.name().to_owned(),
                        message: fault.message,
                    }),
                    ErrorPolicy::Report => Ok(fault.message),
                    ErrorPolicy::Message(text) => Ok(text),
                    ErrorPolicy::Handler(handler) => Ok(handler(&fault)),
                }
            }
        }
    }
}

/// The single-argument key used when a tool declares no schema.
pub const FALLBACK_ARG: &str = "__arg1";

/// Normalize and validate tool input against the declared schema.
///
/// - With a schema, structured arguments are filtered down to the keys
///   the schema declares; surplus keys are dropped silently.
/// - Without a schema, a structured payload is only accepted if it is
///   exactly the fallback single-string wrapper, which is unwrapped back
///   to plain text.
pub fn validate_input(
    tool_name: &str,
    schema: Option<&Value>,
    input: ToolInput,
) -> std::result::Result<ToolInput, ToolError> {
    match (schema, input) {
        (Some(schema), ToolInput::Args(map)) => {
            let declared = schema
                .get("properties")
                .and_then(Value::as_object)
                .map(|props| props.keys().cloned().collect::<Vec<_>>())
                .unwrap_or_default();
            let filtered: Map<String, Value> = map
                .into_iter()
                .filter(|(k, _)| declared.iter().any(|d| d == k))
                .collect();
            Ok(ToolInput::Args(filtered))
        }
        (Some(schema), ToolInput::Text(text)) => {
            // Plain text is acceptable against a schema with exactly one
            // required string property.
            let required = schema
                .get("required")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            let properties = schema
                .get("properties")
                .and_then(Value::as_object)
                .map(Map::len)
                .unwrap_or(0);
            if properties == 1 && required <= 1 {
                Ok(ToolInput::Text(text))
            } else {
                Err(ToolError::InvalidArguments(format!(
                    "tool {tool_name} declares {properties} properties but received plain text"
                )))
            }
        }
        (None, ToolInput::Text(text)) => Ok(ToolInput::Text(text)),
        (None, ToolInput::Args(mut map)) => {
            // Schema-less tools only accept the fallback wrapper.
            match map.remove(FALLBACK_ARG) {
                Some(Value::String(text)) if map.is_empty() => Ok(ToolInput::Text(text)),
                _ => Err(ToolError::InvalidArguments(format!(
                    "tool {tool_name} takes a single string argument"
                ))),
            }
        }
    }
}
