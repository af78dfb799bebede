//! Keyed registry of independent engines

use stampede_config::EngineConfig;
use stampede_core::{EntityKind, Result, StampedeError};
use stampede_http::RequestDriver;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::engine::LoadTestEngine;

/// Holds a default engine plus any number of isolated engines keyed by ID.
///
/// Every engine created here shares the same request driver, and with it the
/// underlying connection pool. Tests in one engine are invisible to the others.
pub struct EngineRegistry {
    driver: Arc<dyn RequestDriver>,
    config: EngineConfig,
    default_engine: LoadTestEngine,
    engines: RwLock<HashMap<String, LoadTestEngine>>,
}

impl EngineRegistry {
    /// Fails if `config` does not validate; every engine shares it.
    pub fn new(driver: Arc<dyn RequestDriver>, config: EngineConfig) -> Result<Self> {
        let default_engine = LoadTestEngine::new(driver.clone(), config.clone())?;
        Ok(Self {
            driver,
            config,
            default_engine,
            engines: RwLock::new(HashMap::new()),
        })
    }

    pub fn default_engine(&self) -> &LoadTestEngine {
        &self.default_engine
    }

    /// Engine registered under `engine_id`, created on first use
    pub async fn get_or_create(&self, engine_id: &str) -> LoadTestEngine {
        if let Some(engine) = self.engines.read().await.get(engine_id) {
            return engine.clone();
        }

        let mut engines = self.engines.write().await;
        engines
            .entry(engine_id.to_string())
            .or_insert_with(|| {
                info!(engine_id, "Creating load test engine");
                LoadTestEngine::from_validated(self.driver.clone(), self.config.clone())
            })
            .clone()
    }

    pub async fn get(&self, engine_id: &str) -> Result<LoadTestEngine> {
        self.engines
            .read()
            .await
            .get(engine_id)
            .cloned()
            .ok_or_else(|| StampedeError::not_found(EntityKind::Engine, engine_id))
    }

    /// Unregister an engine. Tests it is running keep running until they finish.
    pub async fn remove(&self, engine_id: &str) -> Result<LoadTestEngine> {
        self.engines
            .write()
            .await
            .remove(engine_id)
            .ok_or_else(|| StampedeError::not_found(EntityKind::Engine, engine_id))
    }

    pub async fn engine_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.engines.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
