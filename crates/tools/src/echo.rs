//! Echo tool: returns its input verbatim.
//!
//! Declares no argument schema, so it is dispatched through the
//! single-string fallback path. Mostly useful for wiring tests and as a
//! template for schema-less tools.

use async_trait::async_trait;
use maestro_core::tool::{Tool, ToolFault, ToolInput};

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the input text unchanged."
    }

    async fn call(&self, input: ToolInput) -> Result<String, ToolFault> {
        Ok(input.as_text())
    }
}
