//! Async shell around the synchronous engine core.
//!
//! Construction is an explicit factory step; the async `initialize` loads
//! persisted state exactly once, with concurrent callers awaiting the same
//! in-flight load. Analysis requests can be debounced: each new request
//! supersedes the pending one, and only the last intent inside the window
//! runs. Saves are fire-and-forget: a failed write is logged and dropped,
//! never surfaced, since the state is rebuildable analytics rather than a
//! ledger.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OnceCell, RwLock};

use crate::config::EngineConfig;
use crate::engine::{LiveContext, WeaknessEngine};
use crate::persistence::StateStore;
use crate::types::{DashboardSummary, KeystrokeEvent, WeaknessReport};

pub struct EngineService {
    config: EngineConfig,
    inner: Arc<RwLock<WeaknessEngine>>,
    store: Option<Arc<dyn StateStore>>,
    init: OnceCell<()>,
    debounce_generation: AtomicU64,
}

impl EngineService {
    pub fn new(config: EngineConfig, store: Option<Arc<dyn StateStore>>) -> Self {
        let engine = WeaknessEngine::new(config.clone());
        Self {
            config,
            inner: Arc::new(RwLock::new(engine)),
            store,
            init: OnceCell::new(),
            debounce_generation: AtomicU64::new(0),
        }
    }

    /// Load persisted state once. Safe to call from every entry point:
    /// concurrent callers share the single in-flight load, and any malformed
    /// or missing blob degrades to the empty default.
    pub async fn initialize(&self) {
        self.init
            .get_or_init(|| async {
                let Some(store) = self.store.clone() else {
                    return;
                };
                let config = self.config.clone();
                let loaded = tokio::task::spawn_blocking(move || store.load())
                    .await
                    .unwrap_or_else(|join_err| {
                        Err(crate::error::EngineError::Storage(join_err.to_string()))
                    });

                match loaded {
                    Ok(Some(blob)) => match WeaknessEngine::deserialize(config, &blob) {
                        Ok(engine) => {
                            let mut guard = self.inner.write().await;
                            *guard = engine;
                            tracing::debug!("engine state restored from store");
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "persisted state unreadable, starting fresh");
                        }
                    },
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "state store load failed, starting fresh");
                    }
                }
            })
            .await;
    }

    pub async fn record_keystroke(&self, event: &KeystrokeEvent) {
        self.initialize().await;
        let mut engine = self.inner.write().await;
        engine.record_keystroke(event);
    }

    pub async fn analyze(&self, key: char) -> WeaknessReport {
        self.initialize().await;
        let mut engine = self.inner.write().await;
        engine.analyze(key)
    }

    /// Debounced analysis: requests arriving within the configured window
    /// collapse into one. The surviving request returns `Some(report)`;
    /// superseded requests resolve to `None`.
    pub async fn analyze_debounced(&self, key: char) -> Option<WeaknessReport> {
        self.analyze_debounced_after(key, self.config.debounce_ms).await
    }

    /// Same as [`analyze_debounced`](Self::analyze_debounced) with an
    /// explicit coalescing window.
    pub async fn analyze_debounced_after(
        &self,
        key: char,
        delay_ms: u64,
    ) -> Option<WeaknessReport> {
        self.initialize().await;

        let generation = self.debounce_generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        if self.debounce_generation.load(Ordering::SeqCst) != generation {
            return None;
        }

        let report = {
            let mut engine = self.inner.write().await;
            engine.analyze(key)
        };
        self.spawn_save().await;
        Some(report)
    }

    pub async fn dashboard(&self) -> DashboardSummary {
        self.initialize().await;
        let engine = self.inner.read().await;
        engine.dashboard()
    }

    pub async fn predict_risk(&self, ctx: &LiveContext) -> f64 {
        self.initialize().await;
        let engine = self.inner.read().await;
        engine.predict_risk(ctx)
    }

    pub async fn end_session(&self) {
        self.initialize().await;
        {
            let mut engine = self.inner.write().await;
            engine.end_session();
        }
        self.spawn_save().await;
    }

    /// Wipe all tracked state and persist the empty snapshot.
    pub async fn reset(&self) {
        self.initialize().await;
        {
            let mut engine = self.inner.write().await;
            engine.reset();
        }
        self.spawn_save().await;
    }

    pub async fn snapshot_blob(&self) -> Result<String, crate::error::EngineError> {
        self.initialize().await;
        let engine = self.inner.read().await;
        engine.serialize()
    }

    /// Fire-and-forget persistence; failures are logged, never returned.
    async fn spawn_save(&self) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let blob = {
            let engine = self.inner.read().await;
            match engine.serialize() {
                Ok(blob) => blob,
                Err(err) => {
                    tracing::warn!(error = %err, "snapshot serialization failed, skipping save");
                    return;
                }
            }
        };
        tokio::task::spawn_blocking(move || {
            if let Err(err) = store.save(&blob) {
                tracing::warn!(error = %err, "state store save failed");
            }
        });
    }
}
