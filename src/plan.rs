//! Usage plans and monthly request limits.
//!
//! A [`UsagePlan`] caps the number of requests per UTC calendar month.
//! [`UsagePlan::check`] classifies a month's usage as `Within`, `Warning`
//! (at or above 80% of the limit) or `Exceeded` (at or above the limit).
//! Refusing requests is left to the caller.
//!
//! # Example
//!
//! ```rust
//! use mimir::plan::{PlanStatus, UsagePlan};
//!
//! let plan = UsagePlan::free();
//! assert!(matches!(plan.check(850), PlanStatus::Warning { used: 850, limit: 1000 }));
//! assert!(plan.check(1000).is_exceeded());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fraction of the monthly limit at which usage is reported as a warning.
pub const WARNING_THRESHOLD: f64 = 0.8;

/// Monthly request allowance for the free tier.
pub const FREE_MONTHLY_REQUESTS: u64 = 1_000;

/// Monthly request allowance for the premium tier.
pub const PREMIUM_MONTHLY_REQUESTS: u64 = 50_000;

/// A named usage plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePlan {
    pub name: String,
    /// Requests allowed per UTC calendar month; `None` means no limit.
    pub monthly_request_limit: Option<u64>,
}

impl Default for UsagePlan {
    fn default() -> Self {
        Self::free()
    }
}

impl UsagePlan {
    pub fn new(name: impl Into<String>, monthly_request_limit: Option<u64>) -> Self {
        Self {
            name: name.into(),
            monthly_request_limit,
        }
    }

    pub fn free() -> Self {
        Self::new("free", Some(FREE_MONTHLY_REQUESTS))
    }

    pub fn premium() -> Self {
        Self::new("premium", Some(PREMIUM_MONTHLY_REQUESTS))
    }

    pub fn unlimited() -> Self {
        Self::new("unlimited", None)
    }

    /// Look up a built-in plan by name (case-insensitive).
    pub fn builtin(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "free" => Some(Self::free()),
            "premium" => Some(Self::premium()),
            "unlimited" => Some(Self::unlimited()),
            _ => None,
        }
    }

    /// Classify `used` requests this month against the plan's limit.
    pub fn check(&self, used: u64) -> PlanStatus {
        let Some(limit) = self.monthly_request_limit else {
            return PlanStatus::Unlimited;
        };
        // a zero limit is exhausted from the start
        if limit == 0 || used >= limit {
            return PlanStatus::Exceeded { used, limit };
        }
        if used as f64 / limit as f64 >= WARNING_THRESHOLD {
            PlanStatus::Warning { used, limit }
        } else {
            PlanStatus::Within { used, limit }
        }
    }
}

/// Result of checking a month's usage against a [`UsagePlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanStatus {
    /// Below the warning threshold.
    Within { used: u64, limit: u64 },
    /// At or above 80% of the limit, below 100%.
    Warning { used: u64, limit: u64 },
    /// At or above the limit.
    Exceeded { used: u64, limit: u64 },
    /// The plan has no limit.
    Unlimited,
}

impl PlanStatus {
    pub fn is_exceeded(&self) -> bool {
        matches!(self, PlanStatus::Exceeded { .. })
    }

    /// Requests left this month, `None` for unlimited plans.
    pub fn remaining(&self) -> Option<u64> {
        match *self {
            PlanStatus::Within { used, limit }
            | PlanStatus::Warning { used, limit }
            | PlanStatus::Exceeded { used, limit } => Some(limit.saturating_sub(used)),
            PlanStatus::Unlimited => None,
        }
    }

    /// `used / limit`, `None` for unlimited plans.
    pub fn utilization(&self) -> Option<f64> {
        match *self {
            PlanStatus::Within { used, limit }
            | PlanStatus::Warning { used, limit }
            | PlanStatus::Exceeded { used, limit } => {
                Some(if limit == 0 { 1.0 } else { used as f64 / limit as f64 })
            }
            PlanStatus::Unlimited => None,
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Within { used, limit } => write!(f, "{used}/{limit} requests"),
            PlanStatus::Warning { used, limit } => {
                write!(f, "{used}/{limit} requests (approaching limit)")
            }
            PlanStatus::Exceeded { used, limit } => {
                write!(f, "{used}/{limit} requests (limit exceeded)")
            }
            PlanStatus::Unlimited => f.write_str("unlimited"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_limits() {
        assert_eq!(UsagePlan::free().monthly_request_limit, Some(1_000));
        assert_eq!(UsagePlan::premium().monthly_request_limit, Some(50_000));
        assert_eq!(UsagePlan::unlimited().monthly_request_limit, None);
        assert_eq!(UsagePlan::builtin("Premium"), Some(UsagePlan::premium()));
        assert_eq!(UsagePlan::builtin("enterprise"), None);
    }

    #[test]
    fn check_thresholds() {
        let plan = UsagePlan::free();
        assert_eq!(plan.check(0), PlanStatus::Within { used: 0, limit: 1000 });
        assert_eq!(plan.check(799), PlanStatus::Within { used: 799, limit: 1000 });
        assert_eq!(plan.check(800), PlanStatus::Warning { used: 800, limit: 1000 });
        assert_eq!(plan.check(999), PlanStatus::Warning { used: 999, limit: 1000 });
        assert_eq!(plan.check(1000), PlanStatus::Exceeded { used: 1000, limit: 1000 });
        assert_eq!(plan.check(1500).remaining(), Some(0));
    }

    #[test]
    fn unlimited_never_exceeds() {
        let status = UsagePlan::unlimited().check(u64::MAX);
        assert_eq!(status, PlanStatus::Unlimited);
        assert_eq!(status.remaining(), None);
        assert_eq!(status.utilization(), None);
    }

    #[test]
    fn zero_limit_is_exceeded() {
        let plan = UsagePlan::new("closed", Some(0));
        assert!(plan.check(0).is_exceeded());
        assert_eq!(plan.check(0).utilization(), Some(1.0));
    }
}
