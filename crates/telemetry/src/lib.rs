//! Cost estimation and usage accounting for Maestro agent runs.
//!
//! Provides a built-in pricing table for common chat models, runtime
//! overrides for custom deployments, and a meter that folds per-call
//! usage (including sub-agent runs) into run totals.

pub mod pricing;
pub mod usage;

pub use pricing::{ModelPricing, PricingTable};
pub use usage::UsageMeter;
