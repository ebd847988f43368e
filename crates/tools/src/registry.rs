//! Name-based construction of the built-in tools.
//!
//! Configuration layers materialize plugin lists from string
//! identifiers; this is the mapping they resolve against.

use std::sync::Arc;

use maestro_core::plugin::Plugin;

use crate::{CalculatorTool, EchoTool, WebLookupTool};

/// Identifiers accepted by [`create`].
pub const NAMES: &[&str] = &["calculator", "echo", "web_lookup"];

/// Construct a built-in tool by identifier. Returns `None` for unknown
/// identifiers and for tools whose construction fails.
pub fn create(name: &str) -> Option<Plugin> {
    match name {
        "calculator" => Some(Plugin::Tool(Arc::new(CalculatorTool))),
        "echo" => Some(Plugin::Tool(Arc::new(EchoTool))),
        "web_lookup" => WebLookupTool::new()
            .ok()
            .map(|tool| Plugin::Tool(Arc::new(tool))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_name_constructs() {
        for name in NAMES {
            let plugin = create(name).unwrap();
            assert_eq!(plugin.name(), *name);
        }
    }

    #[test]
    fn unknown_name_is_none() {
        assert!(create("teleport").is_none());
    }
}
