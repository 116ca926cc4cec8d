use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Per-device usage counter persisted in the usage store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub device_id: String,
    pub daily_usage: DailyUsage,
    pub total_usage: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub count: u32,
}

impl UsageRecord {
    pub fn new(device_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.to_string(),
            daily_usage: DailyUsage {
                date: now.date_naive(),
                count: 0,
            },
            total_usage: 0,
            created_at: now,
        }
    }

    /// Zeroes the daily counter when it belongs to an earlier UTC day.
    /// Returns true if a reset happened.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        if self.daily_usage.date != today {
            self.daily_usage = DailyUsage { date: today, count: 0 };
            true
        } else {
            false
        }
    }

    pub fn increment(&mut self) {
        self.daily_usage.count = self.daily_usage.count.saturating_add(1);
        self.total_usage = self.total_usage.saturating_add(1);
    }

    pub fn decrement(&mut self) {
        self.daily_usage.count = self.daily_usage.count.saturating_sub(1);
        self.total_usage = self.total_usage.saturating_sub(1);
    }
}

/// Outcome of a quota evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}
