//! Function catalog construction.
//!
//! Turns a plugin list into the function declarations advertised to the
//! model, and keeps the name-to-plugin dispatch map the loop resolves
//! calls against. Built fresh at the start of every run so late plugin
//! registrations are picked up.

use std::collections::HashMap;

use maestro_core::error::ConfigError;
use maestro_core::plugin::Plugin;
use maestro_core::provider::FunctionSpec;
use maestro_core::tool::FALLBACK_ARG;
use serde_json::Value;

/// The advertised function list plus the dispatch map behind it.
pub struct FunctionCatalog {
    entries: HashMap<String, Plugin>,
    specs: Vec<FunctionSpec>,
}

impl FunctionCatalog {
    /// Build a catalog from a plugin list.
    ///
    /// Fails on the first duplicate name: silently shadowing a plugin
    /// would leave the model calling a different capability than the
    /// one its description promised.
    pub fn build(plugins: Vec<Plugin>) -> Result<Self, ConfigError> {
        let mut entries = HashMap::with_capacity(plugins.len());
        let mut specs = Vec::with_capacity(plugins.len());

        for plugin in plugins {
            let name = plugin.name().to_owned();
            if entries.contains_key(&name) {
                return Err(ConfigError::DuplicateToolName(name));
            }

            specs.push(FunctionSpec {
                name: name.clone(),
                description: plugin.description().to_owned(),
                parameters: resolve_parameters(&plugin)?,
            });
            entries.insert(name, plugin);
        }

        Ok(Self { entries, specs })
    }

    /// The function declarations, in registration order.
    pub fn specs(&self) -> &[FunctionSpec] {
        &self.specs
    }

    /// Resolve a model-issued call target.
    pub fn get(&self, name: &str) -> Option<&Plugin> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl std::fmt::Debug for FunctionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionCatalog")
            .field("specs", &self.specs)
            .finish_non_exhaustive()
    }
}

/// Resolve the parameters schema advertised for a plugin.
///
/// An explicitly declared schema passes through verbatim after a shape
/// check. A plugin without one gets the single-string fallback schema,
/// whose sole argument the dispatch path later unwraps back into plain
/// text.
pub fn resolve_parameters(plugin: &Plugin) -> Result<Value, ConfigError> {
    match plugin.args_schema() {
        Some(schema) => {
            let properties = schema
                .get("properties")
                .and_then(Value::as_object)
                .ok_or_else(|| ConfigError::MalformedSchema {
                    tool: plugin.name().to_owned(),
                    reason: "schema must be an object with a 'properties' object".into(),
                })?;
            if properties.is_empty() {
                return Err(ConfigError::MalformedSchema {
                    tool: plugin.name().to_owned(),
                    reason: "schema declares no properties".into(),
                });
            }
            Ok(schema)
        }
        None => Ok(fallback_schema()),
    }
}

/// The single-string schema advertised for plugins without one.
pub fn fallback_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            FALLBACK_ARG: {
                "type": "string",
                "description": "The input to the tool, as a single string."
            }
        },
        "required": [FALLBACK_ARG]
    })
}
