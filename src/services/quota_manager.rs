use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    errors::Result,
    models::{QuotaDecision, UsageRecord},
    services::usage_store::{usage_key, UsageStore},
};

/// Per-device daily request ceiling.
///
/// Read-modify-write cycles are serialized within this process. The store has
/// no compare-and-swap, so several instances sharing one Redis can still
/// admit a few requests past the limit under concurrent load.
pub struct QuotaManager {
    store: Arc<dyn UsageStore>,
    daily_limit: u32,
    write_lock: Mutex<()>,
}

impl QuotaManager {
    pub fn new(store: Arc<dyn UsageStore>, daily_limit: u32) -> Self {
        Self {
            store,
            daily_limit,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn UsageStore> {
        &self.store
    }

    /// Denies without writing when the limit is reached, otherwise charges one
    /// request and persists the record.
    pub async fn check_and_consume(
        &self,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision> {
        let _guard = self.write_lock.lock().await;

        let mut record = self.load(device_id, now).await?;
        let decision = self.decide(&record, now);
        if !decision.allowed {
            tracing::info!(device_id, limit = self.daily_limit, "Daily limit reached");
            return Ok(decision);
        }

        record.increment();
        self.store.put(&usage_key(device_id), &record).await?;
        Ok(QuotaDecision {
            allowed: true,
            remaining: self.daily_limit.saturating_sub(record.daily_usage.count),
            reset_at: next_reset(now),
        })
    }

    /// Gives back a request charged by [`check_and_consume`] at `charged_at`.
    /// A charge from an earlier UTC day is already gone and is left alone.
    ///
    /// [`check_and_consume`]: QuotaManager::check_and_consume
    pub async fn release(&self, device_id: &str, charged_at: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let key = usage_key(device_id);
        let Some(mut record) = self.store.get(&key).await? else {
            return Ok(());
        };
        if record.daily_usage.date != charged_at.date_naive() {
            return Ok(());
        }

        record.decrement();
        self.store.put(&key, &record).await?;
        tracing::debug!(device_id, count = record.daily_usage.count, "Released daily usage");
        Ok(())
    }

    async fn load(&self, device_id: &str, now: DateTime<Utc>) -> Result<UsageRecord> {
        let mut record = self
            .store
            .get(&usage_key(device_id))
            .await?
            .unwrap_or_else(|| UsageRecord::new(device_id, now));

        if record.roll_over(now) {
            tracing::debug!(device_id, "Daily usage reset for new day");
        }
        Ok(record)
    }

    fn decide(&self, record: &UsageRecord, now: DateTime<Utc>) -> QuotaDecision {
        let used = record.daily_usage.count;
        QuotaDecision {
            allowed: used < self.daily_limit,
            remaining: self.daily_limit.saturating_sub(used),
            reset_at: next_reset(now),
        }
    }
}

/// Start of the next UTC day.
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or_else(|| now + Duration::days(1))
}
