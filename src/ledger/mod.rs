//! Usage accounting.
//!
//! [`UsageLedger`] keeps three live [`UsageBucket`]s (today, this month
//! and all time) fed by cache hits ([`UsageLedger::record_hit`]) and
//! billed upstream calls ([`UsageLedger::record_billed`]).
//!
//! # Rollover
//!
//! Periods are UTC calendar days (`YYYY-MM-DD`) and months (`YYYY-MM`).
//! There is no timer: every recording call first compares the period keys
//! computed from the clock with the stored ones. When a key changed, the
//! old bucket is folded into a history map under its old key and a zeroed
//! bucket takes its place. Re-checking within the same period is a no-op.
//!
//! History merges rather than overwrites, so a clock that steps backwards
//! into an already-archived day never loses counts. `all_time` is never
//! rolled over, which keeps `all_time.requests` equal to the sum of every
//! request recorded.

mod bucket;

pub use bucket::{MonthlyProjection, UsageBucket, UsageScope, UsageSnapshot};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::Clock;
use crate::telemetry;

/// Serializable ledger contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LedgerState {
    pub day_key: String,
    pub month_key: String,
    pub today: UsageBucket,
    pub this_month: UsageBucket,
    pub all_time: UsageBucket,
    #[serde(default)]
    pub daily_history: BTreeMap<String, UsageBucket>,
    #[serde(default)]
    pub monthly_history: BTreeMap<String, UsageBucket>,
}

impl LedgerState {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            day_key: day_key(now),
            month_key: month_key(now),
            today: UsageBucket::default(),
            this_month: UsageBucket::default(),
            all_time: UsageBucket::default(),
            daily_history: BTreeMap::new(),
            monthly_history: BTreeMap::new(),
        }
    }

    /// Structural checks for state read back from a snapshot.
    pub fn validate(&self) -> std::result::Result<(), String> {
        parse_day_key(&self.day_key)
            .ok_or_else(|| format!("invalid day key '{}'", self.day_key))?;
        parse_month_key(&self.month_key)
            .ok_or_else(|| format!("invalid month key '{}'", self.month_key))?;
        if let Some(bad) = self.daily_history.keys().find(|k| parse_day_key(k).is_none()) {
            return Err(format!("invalid day key '{bad}' in history"));
        }
        if let Some(bad) = self
            .monthly_history
            .keys()
            .find(|k| parse_month_key(k).is_none())
        {
            return Err(format!("invalid month key '{bad}' in history"));
        }

        let daily = request_total(self.daily_history.values(), &self.today)?;
        let monthly = request_total(self.monthly_history.values(), &self.this_month)?;
        let total = self.all_time.requests;
        if daily != total || monthly != total {
            return Err(format!(
                "request totals disagree: all_time={total}, daily={daily}, monthly={monthly}"
            ));
        }
        Ok(())
    }
}

/// Archived plus live request count, or an error if it does not fit in a `u64`.
fn request_total<'a>(
    history: impl Iterator<Item = &'a UsageBucket>,
    live: &'a UsageBucket,
) -> std::result::Result<u64, String> {
    history
        .chain(std::iter::once(live))
        .try_fold(0u64, |acc, b| acc.checked_add(b.requests))
        .ok_or_else(|| "request totals overflow".to_string())
}

/// Per-day, per-month and all-time usage counters.
#[derive(Debug)]
pub struct UsageLedger {
    state: LedgerState,
    clock: Arc<dyn Clock>,
}

impl UsageLedger {
    /// Create a zeroed ledger whose current periods come from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: LedgerState::fresh(clock.now()),
            clock,
        }
    }

    pub(crate) fn from_state(state: LedgerState, clock: Arc<dyn Clock>) -> Self {
        Self { state, clock }
    }

    pub(crate) fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Record a request answered from cache.
    pub fn record_hit(&mut self, tokens_saved: u64, cost_saved: f64) {
        self.rollover();
        let cost_saved = non_negative(cost_saved);
        for bucket in self.live_buckets() {
            bucket.requests = bucket.requests.saturating_add(1);
            bucket.tokens_saved = bucket.tokens_saved.saturating_add(tokens_saved);
            bucket.cost_saved += cost_saved;
        }
        metrics::counter!(telemetry::TOKENS_SAVED_TOTAL).increment(tokens_saved);
    }

    /// Record a request that went to the upstream API and was billed.
    pub fn record_billed(&mut self, tokens_used: u64, cost_billed: f64) {
        self.rollover();
        let cost_billed = non_negative(cost_billed);
        for bucket in self.live_buckets() {
            bucket.requests = bucket.requests.saturating_add(1);
            bucket.tokens_used = bucket.tokens_used.saturating_add(tokens_used);
            bucket.cost_billed += cost_billed;
        }
        metrics::counter!(telemetry::TOKENS_BILLED_TOTAL).increment(tokens_used);
    }

    /// Archive `today` / `this_month` if the clock has left their period.
    ///
    /// Called by every recording method; calling it again within the same
    /// period changes nothing.
    pub fn rollover(&mut self) {
        let now = self.clock.now();

        let day = day_key(now);
        if day != self.state.day_key {
            let old_key = std::mem::replace(&mut self.state.day_key, day);
            let old = std::mem::take(&mut self.state.today);
            if !old.is_empty() {
                self.state
                    .daily_history
                    .entry(old_key.clone())
                    .or_default()
                    .merge(&old);
            }
            debug!(from = %old_key, to = %self.state.day_key, "daily usage rollover");
        }

        let month = month_key(now);
        if month != self.state.month_key {
            let old_key = std::mem::replace(&mut self.state.month_key, month);
            let old = std::mem::take(&mut self.state.this_month);
            if !old.is_empty() {
                self.state
                    .monthly_history
                    .entry(old_key.clone())
                    .or_default()
                    .merge(&old);
            }
            debug!(from = %old_key, to = %self.state.month_key, "monthly usage rollover");
        }
    }

    /// Counters for the current UTC day.
    ///
    /// If nothing was recorded since the day changed, this is a zeroed
    /// bucket; the ledger itself is not modified.
    pub fn today(&self) -> UsageBucket {
        if day_key(self.clock.now()) == self.state.day_key {
            self.state.today
        } else {
            UsageBucket::default()
        }
    }

    /// Counters for the current UTC month. Same staleness rule as [`today`](Self::today).
    pub fn this_month(&self) -> UsageBucket {
        if month_key(self.clock.now()) == self.state.month_key {
            self.state.this_month
        } else {
            UsageBucket::default()
        }
    }

    /// Counters since the ledger was created.
    pub fn all_time(&self) -> UsageBucket {
        self.state.all_time
    }

    /// Copy of the bucket for `scope`, labelled with its period.
    pub fn snapshot(&self, scope: UsageScope) -> UsageSnapshot {
        let now = self.clock.now();
        match scope {
            UsageScope::Today => UsageSnapshot {
                scope,
                period: Some(day_key(now)),
                usage: self.today(),
            },
            UsageScope::Month => UsageSnapshot {
                scope,
                period: Some(month_key(now)),
                usage: self.this_month(),
            },
            UsageScope::AllTime => UsageSnapshot {
                scope,
                period: None,
                usage: self.all_time(),
            },
        }
    }

    /// Sum of the last `days` UTC calendar days, today included.
    pub fn recent_days(&self, days: u32) -> UsageBucket {
        let today = self.clock.now().date_naive();
        let mut total = UsageBucket::default();
        for offset in 0..days {
            let Some(date) = today.checked_sub_days(Days::new(u64::from(offset))) else {
                break;
            };
            let key = date.format(DAY_FORMAT).to_string();
            if key == self.state.day_key {
                total.merge(&self.state.today);
            }
            if let Some(archived) = self.state.daily_history.get(&key) {
                total.merge(archived);
            }
        }
        total
    }

    /// This month's savings averaged over the days elapsed so far and
    /// extended to a 30-day month.
    pub fn month_projection(&self) -> MonthlyProjection {
        let now = self.clock.now();
        let usage = self.this_month();
        let average_daily_saved = usage.cost_saved / f64::from(now.day());
        MonthlyProjection {
            month: month_key(now),
            usage,
            average_daily_saved,
            projected_monthly_saved: average_daily_saved * PROJECTION_DAYS,
        }
    }

    /// Archived per-day buckets, keyed `YYYY-MM-DD`.
    pub fn daily_history(&self) -> &BTreeMap<String, UsageBucket> {
        &self.state.daily_history
    }

    /// Archived per-month buckets, keyed `YYYY-MM`.
    pub fn monthly_history(&self) -> &BTreeMap<String, UsageBucket> {
        &self.state.monthly_history
    }

    fn live_buckets(&mut self) -> [&mut UsageBucket; 3] {
        [
            &mut self.state.today,
            &mut self.state.this_month,
            &mut self.state.all_time,
        ]
    }
}

const DAY_FORMAT: &str = "%Y-%m-%d";
const MONTH_FORMAT: &str = "%Y-%m";
const PROJECTION_DAYS: f64 = 30.0;

/// UTC calendar day key, e.g. `2026-03-01`.
pub fn day_key(now: DateTime<Utc>) -> String {
    now.format(DAY_FORMAT).to_string()
}

/// UTC calendar month key, e.g. `2026-03`.
pub fn month_key(now: DateTime<Utc>) -> String {
    now.format(MONTH_FORMAT).to_string()
}

fn parse_day_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DAY_FORMAT).ok()
}

fn parse_month_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{key}-01"), DAY_FORMAT).ok()
}

/// Costs come from an external rate provider; never let a bad figure
/// (negative or NaN) drive a counter down.
fn non_negative(cost: f64) -> f64 {
    if cost.is_finite() && cost > 0.0 { cost } else { 0.0 }
}
