//! Run-level usage accounting.

use maestro_core::AgentOutput;
use tracing::debug;

use crate::pricing::PricingTable;

/// Accumulates token usage and monetary cost across the completions of
/// one agent run, including amounts folded in from sub-agent runs.
#[derive(Debug, Default)]
pub struct UsageMeter {
    prompt_tokens: u64,
    completion_tokens: u64,
    monetary_cost: f64,
}

impl UsageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one model completion, pricing it against `table`.
    pub fn record_completion(
        &mut self,
        table: &PricingTable,
        model: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) {
        let cost = table.compute_cost(model, prompt_tokens, completion_tokens);
        self.prompt_tokens += u64::from(prompt_tokens);
        self.completion_tokens += u64::from(completion_tokens);
        self.monetary_cost += cost;
        debug!(
            model,
            prompt_tokens, completion_tokens, cost, "recorded completion"
        );
    }

    /// Fold in the accounting of a finished sub-agent run.
    pub fn record_sub_run(&mut self, output: &AgentOutput) {
        self.completion_tokens += output.token_usage;
        self.monetary_cost += output.monetary_cost;
    }

    pub fn token_usage(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn monetary_cost(&self) -> f64 {
        self.monetary_cost
    }

    /// Produce the final output record for a run.
    pub fn into_output(self, answer: impl Into<String>) -> AgentOutput {
        AgentOutput {
            output: answer.into(),
            monetary_cost: self.monetary_cost,
            token_usage: self.prompt_tokens + self.completion_tokens,
        }
    }
}
