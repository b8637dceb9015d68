//! Token usage and cost accounting
//!
//! Keeps the running token total across sends and converts it to an
//! estimated cost from the operator-configured per-1000-token price.

/// Parse the free-text price field, substituting 0 for anything unusable
pub fn parse_price(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price >= 0.0)
        .unwrap_or(0.0)
}

/// Estimated cost for `tokens` at `price_per_1k` per 1000 tokens
///
/// Full precision is retained; rounding happens only at display time.
pub fn compute_cost(tokens: u64, price_per_1k: f64) -> f64 {
    tokens as f64 / 1000.0 * price_per_1k.max(0.0)
}

/// Character-based token estimate, used for pre-send display
///
/// Roughly 4 characters per token; the API's own usage numbers are
/// authoritative once a response arrives.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Running totals for the current session
#[derive(Debug, Default)]
pub struct UsageTracker {
    total_tokens: u64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the billed tokens of one exchange
    pub fn record(&mut self, tokens: u64) {
        self.total_tokens += tokens;
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn cost(&self, price_per_1k: f64) -> f64 {
        compute_cost(self.total_tokens, price_per_1k)
    }

    /// One-line display of the running totals
    pub fn summary(&self, price_per_1k: f64) -> String {
        format!(
            "Usage: {} tokens | Cost: ${:.4}",
            self.total_tokens,
            self.cost(price_per_1k)
        )
    }
}
