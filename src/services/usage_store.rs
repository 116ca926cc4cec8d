//! Key-value persistence for [`UsageRecord`]s.
//!
//! Both backends offer plain get/put with no compare-and-swap, so the quota
//! counter built on top of them is best-effort under concurrent requests.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{errors::Result, models::UsageRecord, services::redis::RedisService};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<UsageRecord>>;

    async fn put(&self, key: &str, record: &UsageRecord) -> Result<()>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

pub fn usage_key(device_id: &str) -> String {
    format!("usage:{}", device_id)
}

/// Stores each record as a JSON string under its key.
pub struct RedisUsageStore {
    redis: RedisService,
}

impl RedisUsageStore {
    pub fn new(redis: RedisService) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl UsageStore for RedisUsageStore {
    async fn get(&self, key: &str) -> Result<Option<UsageRecord>> {
        let mut conn = self.redis.connection();
        let raw: Option<String> = conn.get(key).await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, record: &UsageRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let mut conn = self.redis.connection();
        conn.set::<_, _, ()>(key, json).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.redis.ping().await
    }
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryUsageStore {
    records: RwLock<HashMap<String, UsageRecord>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn get(&self, key: &str) -> Result<Option<UsageRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, record: &UsageRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(key.to_string(), record.clone());
        Ok(())
    }
}
