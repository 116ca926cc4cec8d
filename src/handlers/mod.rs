use std::sync::Arc;

use crate::{
    config::Config,
    services::{
        gemini::GeminiClient, metrics::MetricsService, quota_manager::QuotaManager,
        usage_store::UsageStore,
    },
};

pub mod analyze;
pub mod docs;
pub mod health;
pub mod metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub quota: Arc<QuotaManager>,
    pub gemini: Arc<GeminiClient>,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn UsageStore>) -> anyhow::Result<Self> {
        let gemini = GeminiClient::new(config.upstream.clone())?;
        Self::with_client(config, store, gemini)
    }

    pub fn with_client(
        config: Config,
        store: Arc<dyn UsageStore>,
        gemini: GeminiClient,
    ) -> anyhow::Result<Self> {
        let quota = QuotaManager::new(store, config.daily_limit);
        Ok(Self {
            config,
            quota: Arc::new(quota),
            gemini: Arc::new(gemini),
            metrics: Arc::new(MetricsService::new()?),
        })
    }
}
