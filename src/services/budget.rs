//! Per-project and daily token/dollar tracking.
//!
//! Dissipation boundary: each project run has a dollar cap, with a daily cap
//! across runs on top. No retries once a cap is hit; the scheduler routes a
//! blown budget to its own terminal status.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::ports::AgentUsage;

/// Built-in rates, overridable via config `model_pricing`.
/// Format: model id -> (input cost, output cost) per million tokens.
const DEFAULT_MODEL_PRICING: &[(&str, (f64, f64))] = &[
    ("claude-haiku-4-5-20251001", (0.80, 4.00)),
    ("claude-sonnet-4-5-20250929", (3.00, 15.00)),
    ("claude-opus-4-1", (15.00, 75.00)),
    ("gpt-4o", (2.50, 10.00)),
    ("gpt-4o-mini", (0.15, 0.60)),
    ("gpt-4-turbo", (10.00, 30.00)),
    ("o3", (10.00, 40.00)),
    ("o3-mini", (1.10, 4.40)),
    ("gemini-2.5-pro", (1.25, 10.00)),
    ("gemini-2.5-flash", (0.15, 0.60)),
    ("gemini-2.5-flash-lite", (0.075, 0.30)),
];

/// Rates applied when a model id matches nothing in the table.
const FALLBACK_RATES: (f64, f64) = (0.80, 4.00);

const DAY_SECS: u64 = 86_400;

/// Model pricing lookup with fuzzy family matching.
#[derive(Debug, Clone)]
pub struct PricingTable {
    rates: BTreeMap<String, (f64, f64)>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            rates: DEFAULT_MODEL_PRICING
                .iter()
                .map(|(model, rates)| ((*model).to_string(), *rates))
                .collect(),
        }
    }
}

impl PricingTable {
    /// Layer user-configured rates over the built-in table.
    pub fn with_overrides(
        mut self,
        overrides: impl IntoIterator<Item = (String, (f64, f64))>,
    ) -> Self {
        self.rates.extend(overrides);
        self
    }

    /// Look up (input, output) cost per million tokens. Falls back to a
    /// family prefix match (a dated model id matches its undated alias and
    /// vice versa), then to the cheapest known rates.
    pub fn rates_for(&self, model: &str) -> (f64, f64) {
        if let Some(&rates) = self.rates.get(model) {
            return rates;
        }
        for (key, &rates) in &self.rates {
            let family = key.rsplit_once('-').map_or(key.as_str(), |(prefix, _)| prefix);
            if key.starts_with(model) || model.starts_with(family) {
                return rates;
            }
        }
        tracing::warn!(model, "unknown model, using fallback rates");
        FALLBACK_RATES
    }
}

#[derive(Debug)]
struct Inner {
    project_spend: f64,
    project_tokens_in: u64,
    project_tokens_out: u64,
    daily_spend: f64,
    day_start: Instant,
}

impl Inner {
    fn maybe_reset_day(&mut self) {
        if self.day_start.elapsed().as_secs() >= DAY_SECS {
            self.daily_spend = 0.0;
            self.day_start = Instant::now();
        }
    }
}

/// Tracks project spend in dollars against two caps. Cheap to clone; clones
/// share the same counters.
#[derive(Debug, Clone)]
pub struct BudgetTracker {
    per_project_cap: f64,
    daily_cap: f64,
    input_cost_per_million: f64,
    output_cost_per_million: f64,
    inner: Arc<RwLock<Inner>>,
}

impl BudgetTracker {
    pub fn new(per_project_cap: f64, daily_cap: f64) -> Self {
        Self {
            per_project_cap,
            daily_cap,
            input_cost_per_million: 0.0,
            output_cost_per_million: 0.0,
            inner: Arc::new(RwLock::new(Inner {
                project_spend: 0.0,
                project_tokens_in: 0,
                project_tokens_out: 0,
                daily_spend: 0.0,
                day_start: Instant::now(),
            })),
        }
    }

    /// Price token usage at the given model's rates.
    pub fn with_model(mut self, model: &str, pricing: &PricingTable) -> Self {
        let (input, output) = pricing.rates_for(model);
        self.input_cost_per_million = input;
        self.output_cost_per_million = output;
        self
    }

    pub fn per_project_cap(&self) -> f64 {
        self.per_project_cap
    }

    pub fn tokens_to_dollars(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64).mul_add(
            self.input_cost_per_million / 1_000_000.0,
            (output_tokens as f64) * self.output_cost_per_million / 1_000_000.0,
        )
    }

    /// Reset per-project tracking for a new run. Daily spend carries over.
    pub async fn start_project(&self) {
        let mut inner = self.inner.write().await;
        inner.project_spend = 0.0;
        inner.project_tokens_in = 0;
        inner.project_tokens_out = 0;
    }

    /// Seed project counters from persisted run state. A tracker that has
    /// already recorded spend in this process keeps its own counters, so
    /// calling this on every burst is safe.
    pub async fn restore(&self, total_tokens: u64, spend: f64) {
        let mut inner = self.inner.write().await;
        if inner.project_spend == 0.0
            && inner.project_tokens_in == 0
            && inner.project_tokens_out == 0
        {
            inner.project_tokens_in = total_tokens;
            inner.project_spend = spend;
        }
    }

    /// Record token usage. Returns `false` once either cap is exceeded.
    pub async fn record_tokens(&self, input_tokens: u64, output_tokens: u64) -> bool {
        let cost = self.tokens_to_dollars(input_tokens, output_tokens);
        self.record(input_tokens, output_tokens, cost).await
    }

    /// Record one agent invocation. Uses the backend-reported cost when
    /// present, rate-table pricing otherwise.
    pub async fn record_usage(&self, usage: &AgentUsage) -> bool {
        let cost = if usage.cost_usd > 0.0 {
            usage.cost_usd
        } else {
            self.tokens_to_dollars(usage.input_tokens, usage.output_tokens)
        };
        self.record(usage.input_tokens, usage.output_tokens, cost)
            .await
    }

    async fn record(&self, input_tokens: u64, output_tokens: u64, cost: f64) -> bool {
        let mut inner = self.inner.write().await;
        inner.maybe_reset_day();
        inner.project_spend += cost;
        inner.project_tokens_in += input_tokens;
        inner.project_tokens_out += output_tokens;
        inner.daily_spend += cost;

        if inner.project_spend > self.per_project_cap {
            tracing::warn!(
                spend = inner.project_spend,
                cap = self.per_project_cap,
                "per-project budget exceeded"
            );
            return false;
        }
        if inner.daily_spend > self.daily_cap {
            tracing::warn!(
                spend = inner.daily_spend,
                cap = self.daily_cap,
                "daily budget exceeded"
            );
            return false;
        }
        true
    }

    /// Record one agent invocation and fail the call when a cap is hit.
    /// The usage is recorded either way; the run owes for the tokens it
    /// already consumed.
    pub async fn charge(&self, usage: &AgentUsage) -> PipelineResult<()> {
        if self.record_usage(usage).await {
            return Ok(());
        }
        let spend = self.project_spend().await;
        Err(PipelineError::BudgetExceeded(format!(
            "spent ${spend:.2} of ${:.2} cap",
            self.per_project_cap
        )))
    }

    /// Check the project cap without recording anything.
    pub async fn is_exceeded(&self) -> bool {
        let inner = self.inner.read().await;
        inner.project_spend > self.per_project_cap
    }

    pub async fn project_spend(&self) -> f64 {
        self.inner.read().await.project_spend
    }

    /// (input, output) tokens recorded for the current project.
    pub async fn project_tokens(&self) -> (u64, u64) {
        let inner = self.inner.read().await;
        (inner.project_tokens_in, inner.project_tokens_out)
    }

    /// Dollars left under the project cap, floored at zero.
    pub async fn budget_remaining(&self) -> f64 {
        let inner = self.inner.read().await;
        (self.per_project_cap - inner.project_spend).max(0.0)
    }

    /// Fraction of the project cap spent, in percent. May exceed 100.
    pub async fn spend_percentage(&self) -> f64 {
        if self.per_project_cap <= 0.0 {
            return 100.0;
        }
        let inner = self.inner.read().await;
        inner.project_spend / self.per_project_cap * 100.0
    }

    pub async fn daily_spend(&self) -> f64 {
        let mut inner = self.inner.write().await;
        inner.maybe_reset_day();
        inner.daily_spend
    }
}
