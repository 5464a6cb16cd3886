//! Billing-rate collaborator.

/// Supplies the price of one token, used to turn token counts into
/// billed / saved amounts.
///
/// The value is stored as given; the ledger ignores negative or non-finite
/// results when recording.
pub trait RateProvider: Send + Sync {
    fn cost_per_token(&self) -> f64;
}

/// A constant per-token price.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FixedRate(pub f64);

impl FixedRate {
    pub fn new(cost_per_token: f64) -> Self {
        Self(cost_per_token)
    }
}

impl RateProvider for FixedRate {
    fn cost_per_token(&self) -> f64 {
        self.0
    }
}

impl<F> RateProvider for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn cost_per_token(&self) -> f64 {
        self()
    }
}
