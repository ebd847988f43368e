//! Built-in tools for Maestro agents.
//!
//! Each tool implements the core `Tool` trait. `CalculatorTool` and
//! `WebLookupTool` declare explicit argument schemas; `EchoTool` takes a
//! single free-form string.

pub mod calculator;
pub mod echo;
pub mod registry;
pub mod web_lookup;

pub use calculator::CalculatorTool;
pub use echo::EchoTool;
pub use web_lookup::WebLookupTool;
