//! Counter buckets and scope selectors for the usage ledger.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MimirError;

/// Usage counters for one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageBucket {
    /// Requests seen, cached or billed.
    pub requests: u64,
    /// Tokens billed by the upstream API.
    pub tokens_used: u64,
    /// Tokens served from cache instead.
    pub tokens_saved: u64,
    /// Amount billed for `tokens_used`.
    pub cost_billed: f64,
    /// Amount avoided thanks to cache hits.
    pub cost_saved: f64,
}

impl UsageBucket {
    /// Add another bucket's counters into this one. Integer counters
    /// saturate at `u64::MAX`.
    pub fn merge(&mut self, other: &UsageBucket) {
        self.requests = self.requests.saturating_add(other.requests);
        self.tokens_used = self.tokens_used.saturating_add(other.tokens_used);
        self.tokens_saved = self.tokens_saved.saturating_add(other.tokens_saved);
        self.cost_billed += other.cost_billed;
        self.cost_saved += other.cost_saved;
    }

    /// Whether nothing was ever recorded into this bucket.
    pub fn is_empty(&self) -> bool {
        self.requests == 0
    }

    /// Share of the would-be cost that was avoided:
    /// `cost_saved / (cost_saved + cost_billed)`, or 0.0 with no cost at all.
    pub fn savings_ratio(&self) -> f64 {
        let total = self.cost_saved + self.cost_billed;
        if total > 0.0 {
            self.cost_saved / total
        } else {
            0.0
        }
    }
}

/// Which ledger bucket to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageScope {
    /// Current UTC calendar day.
    Today,
    /// Current UTC calendar month.
    Month,
    /// Everything ever recorded.
    AllTime,
}

impl UsageScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageScope::Today => "today",
            UsageScope::Month => "month",
            UsageScope::AllTime => "all_time",
        }
    }
}

impl fmt::Display for UsageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UsageScope {
    type Err = MimirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "today" | "day" => Ok(UsageScope::Today),
            "month" | "this_month" | "this-month" => Ok(UsageScope::Month),
            "all_time" | "all-time" | "total" => Ok(UsageScope::AllTime),
            other => Err(MimirError::Configuration(format!(
                "unknown usage scope '{other}' (expected today, month or all_time)"
            ))),
        }
    }
}

/// Point-in-time copy of one ledger bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub scope: UsageScope,
    /// `YYYY-MM-DD` for today, `YYYY-MM` for the month, `None` for all time.
    pub period: Option<String>,
    pub usage: UsageBucket,
}

/// This month's usage with its savings run-rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyProjection {
    /// `YYYY-MM`.
    pub month: String,
    pub usage: UsageBucket,
    /// `cost_saved` divided by the day of the month.
    pub average_daily_saved: f64,
    /// `average_daily_saved` over a 30-day month.
    pub projected_monthly_saved: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_every_counter() {
        let mut a = UsageBucket {
            requests: 1,
            tokens_used: 10,
            tokens_saved: 0,
            cost_billed: 0.5,
            cost_saved: 0.0,
        };
        let b = UsageBucket {
            requests: 2,
            tokens_used: 0,
            tokens_saved: 20,
            cost_billed: 0.0,
            cost_saved: 1.5,
        };
        a.merge(&b);
        assert_eq!(a.requests, 3);
        assert_eq!(a.tokens_used, 10);
        assert_eq!(a.tokens_saved, 20);
        assert!((a.cost_billed - 0.5).abs() < 1e-12);
        assert!((a.cost_saved - 1.5).abs() < 1e-12);
    }

    #[test]
    fn merge_saturates() {
        let mut a = UsageBucket {
            requests: u64::MAX - 1,
            tokens_used: u64::MAX,
            ..Default::default()
        };
        let b = UsageBucket {
            requests: 5,
            tokens_used: 1,
            tokens_saved: 3,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.requests, u64::MAX);
        assert_eq!(a.tokens_used, u64::MAX);
        assert_eq!(a.tokens_saved, 3);
    }

    #[test]
    fn savings_ratio_handles_zero() {
        assert_eq!(UsageBucket::default().savings_ratio(), 0.0);
        let bucket = UsageBucket {
            cost_billed: 3.0,
            cost_saved: 1.0,
            ..Default::default()
        };
        assert!((bucket.savings_ratio() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn scope_parses_aliases() {
        assert_eq!("today".parse::<UsageScope>().unwrap(), UsageScope::Today);
        assert_eq!("this_month".parse::<UsageScope>().unwrap(), UsageScope::Month);
        assert_eq!("All-Time".parse::<UsageScope>().unwrap(), UsageScope::AllTime);
        assert!("weekly".parse::<UsageScope>().is_err());
    }

    #[test]
    fn scope_display_round_trips() {
        for scope in [UsageScope::Today, UsageScope::Month, UsageScope::AllTime] {
            assert_eq!(scope.to_string().parse::<UsageScope>().unwrap(), scope);
        }
    }
}
