//! Application state.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use vigil_models::RunKey;
use vigil_pipeline::AnomalyPipeline;
use vigil_storage::ArtifactLayout;

use crate::config::ApiConfig;

/// Serializes runs of the same key. Runs of different keys proceed in parallel.
#[derive(Debug, Clone, Default)]
pub struct RunLocks {
    locks: Arc<Mutex<HashMap<RunKey, Arc<AsyncMutex<()>>>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other run of `key` is in flight.
    pub async fn acquire(&self, key: &RunKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // drop entries nobody holds or waits on
            locks.retain(|k, l| k == key || Arc::strong_count(l) > 1);
            locks.entry(key.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Run `work` on its own task while holding `guard`.
    ///
    /// The guard lives as long as the work does, so a caller that stops
    /// waiting on the handle (a dropped request) cannot let another run of
    /// the same key start underneath it.
    pub fn spawn_holding<T>(
        guard: OwnedMutexGuard<()>,
        work: impl Future<Output = T> + Send + 'static,
    ) -> JoinHandle<T>
    where
        T: Send + 'static,
    {
        tokio::spawn(async move {
            let output = work.await;
            drop(guard);
            output
        })
    }

    /// Keys with a lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<AnomalyPipeline>,
    pub run_locks: RunLocks,
}

impl AppState {
    pub fn new(config: ApiConfig, pipeline: AnomalyPipeline) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
            run_locks: RunLocks::new(),
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        self.pipeline.layout()
    }
}
