//! Built-in pricing table for chat-completion models.
//!
//! Prices are in USD per 1 million tokens, split into prompt and
//! completion rates. Custom deployments can override entries at runtime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M prompt tokens in USD.
    pub prompt_per_m: f64,
    /// Price per 1M completion tokens in USD.
    pub completion_per_m: f64,
}

impl ModelPricing {
    pub fn new(prompt_per_m: f64, completion_per_m: f64) -> Self {
        Self {
            prompt_per_m,
            completion_per_m,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 * self.prompt_per_m
            + completion_tokens as f64 * self.completion_per_m)
            / 1_000_000.0
    }
}

/// Thread-safe pricing table with built-in defaults and runtime overrides.
pub struct PricingTable {
    prices: RwLock<HashMap<String, ModelPricing>>,
}

impl PricingTable {
    /// Create a pricing table with built-in model prices.
    pub fn with_defaults() -> Self {
        let mut prices = HashMap::new();

        prices.insert("gpt-3.5-turbo".into(), ModelPricing::new(0.5, 1.5));
        prices.insert("gpt-3.5-turbo-16k".into(), ModelPricing::new(3.0, 4.0));
        prices.insert("gpt-4".into(), ModelPricing::new(30.0, 60.0));
        prices.insert("gpt-4-32k".into(), ModelPricing::new(60.0, 120.0));
        prices.insert("gpt-4-turbo".into(), ModelPricing::new(10.0, 30.0));
        prices.insert("gpt-4o".into(), ModelPricing::new(2.5, 10.0));
        prices.insert("gpt-4o-mini".into(), ModelPricing::new(0.15, 0.6));
        prices.insert("o1".into(), ModelPricing::new(15.0, 60.0));
        prices.insert("o1-mini".into(), ModelPricing::new(3.0, 12.0));
        prices.insert("o3-mini".into(), ModelPricing::new(1.1, 4.4));

        Self {
            prices: RwLock::new(prices),
        }
    }

    /// Create an empty pricing table.
    pub fn empty() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    /// Look up pricing for a model. Returns None if not found.
    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        let prices = self.prices.read().unwrap();
        prices.get(model).copied()
    }

    /// Add or update pricing for a model.
    pub fn set(&self, model: impl Into<String>, pricing: ModelPricing) {
        let mut prices = self.prices.write().unwrap();
        prices.insert(model.into(), pricing);
    }

    /// Compute cost for a model call, returning 0.0 if the model is not
    /// in the table. Unknown models are free rather than an error so a
    /// run never fails on accounting alone.
    ///
    /// Tries an exact match first, then the longest table entry that is a
    /// prefix of the model name, so dated snapshots like
    /// `gpt-4o-mini-2024-07-18` resolve to `gpt-4o-mini`.
    pub fn compute_cost(&self, model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        let prices = self.prices.read().unwrap();

        if let Some(p) = prices.get(model) {
            return p.cost(prompt_tokens, completion_tokens);
        }

        let model_lower = model.to_lowercase();
        let mut best: Option<(&str, &ModelPricing)> = None;
        for (key, pricing) in prices.iter() {
            if model_lower.starts_with(&key.to_lowercase()) {
                if best.is_none_or(|(k, _)| key.len() > k.len()) {
                    best = Some((key.as_str(), pricing));
                }
            }
        }

        match best {
            Some((_, p)) => p.cost(prompt_tokens, completion_tokens),
            None => 0.0,
        }
    }

    /// List all known model names, sorted.
    pub fn models(&self) -> Vec<String> {
        let prices = self.prices.read().unwrap();
        let mut names: Vec<String> = prices.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.prices.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}
