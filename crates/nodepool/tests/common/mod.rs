//! Shared fixtures for pool integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use nodepool::{BackendFuture, ComputeBackend, EagerNodePool, LocalBackend};
use nodepool_core::{BackendNode, NodeTemplate, PoolConfig};
use nodepool_state::StateStore;

pub const GROUP: &str = "pool";

/// Local backend with switchable faults and artificial latency.
pub struct ScriptedBackend {
    inner: LocalBackend,
    /// Max nodes per creation request; `u32::MAX` means unlimited.
    creation_limit: AtomicU32,
    fail_create: AtomicBool,
    fail_destroy: AtomicBool,
    create_calls: AtomicU32,
    latency: Duration,
}

impl ScriptedBackend {
    pub fn new(state: StateStore) -> Self {
        Self {
            inner: LocalBackend::new(state),
            creation_limit: AtomicU32::new(u32::MAX),
            fail_create: AtomicBool::new(false),
            fail_destroy: AtomicBool::new(false),
            create_calls: AtomicU32::new(0),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn limit_creation(&self, limit: u32) {
        self.creation_limit.store(limit, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_destroys(&self, fail: bool) {
        self.fail_destroy.store(fail, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count(GROUP).unwrap()
    }

    async fn pause(&self) {
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl ComputeBackend for ScriptedBackend {
    fn list_nodes_in_group<'a>(&'a self, group: &'a str) -> BackendFuture<'a, Vec<BackendNode>> {
        Box::pin(async move {
            self.pause().await;
            self.inner.list_nodes_in_group(group).await
        })
    }

    fn create_nodes<'a>(
        &'a self,
        template: &'a NodeTemplate,
        count: u32,
        group: &'a str,
    ) -> BackendFuture<'a, Vec<BackendNode>> {
        Box::pin(async move {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(anyhow::anyhow!("quota exhausted in {group}"));
            }
            let limit = self.creation_limit.load(Ordering::SeqCst);
            self.inner.create_nodes(template, count.min(limit), group).await
        })
    }

    fn destroy_node<'a>(&'a self, id: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.pause().await;
            if self.fail_destroy.load(Ordering::SeqCst) {
                return Err(anyhow::anyhow!("backend refused to destroy {id}"));
            }
            self.inner.destroy_node(id).await
        })
    }
}

pub fn config(min: u32, max: u32, remove_destroyed: bool) -> PoolConfig {
    PoolConfig {
        min_size: min,
        max_size: max,
        group_prefix: GROUP.to_string(),
        remove_destroyed,
        ..PoolConfig::default()
    }
}

pub struct Harness {
    pub pool: Arc<EagerNodePool>,
    pub backend: Arc<ScriptedBackend>,
    pub state: StateStore,
}

pub async fn start(config: PoolConfig) -> Harness {
    start_with(config, |backend| backend).await
}

pub async fn start_with(
    config: PoolConfig,
    customize: impl FnOnce(ScriptedBackend) -> ScriptedBackend,
) -> Harness {
    let state = StateStore::open_in_memory().unwrap();
    let backend = Arc::new(customize(ScriptedBackend::new(state.clone())));
    let pool = EagerNodePool::start(config, backend.clone(), Arc::new(state.clone()))
        .await
        .unwrap();
    Harness {
        pool: Arc::new(pool),
        backend,
        state,
    }
}
