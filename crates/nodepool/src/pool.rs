//! Eager node pool — the public control-plane surface.
//!
//! `EagerNodePool` is only constructed once the pool has been warmed to
//! `min_size`. Allocation and destroy run through a single `ControlPlane`
//! behind one async mutex, so every read-decide-write sequence (including
//! any provisioning it triggers) is serialized pool-wide. Backend calls are
//! awaited while the lock is held; waiters are served in lock order.
//!
//! Introspection (`current_size`, `idle_nodes`, ...) does not take the lock
//! and returns point-in-time snapshots meant for observability only.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use nodepool_core::{NodeTemplate, PoolConfig};

use crate::allocator::{Allocator, FrontendNode, check_no_dangling};
use crate::backend::{BackendView, ComputeBackend};
use crate::error::PoolResult;
use crate::metadata::MetadataStore;
use crate::reclaimer::{Reclaimer, Reclamation};
use crate::sizer::PoolSizer;

/// Point-in-time pool sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolStats {
    /// Live backend nodes.
    pub current: u32,
    /// Backend nodes without an assignment.
    pub idle: u32,
    /// Backend nodes with an assignment.
    pub used: u32,
    pub min: u32,
    pub max: u32,
}

/// Lifetime counters of a pool instance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolCounters {
    /// Successful allocations.
    pub allocations: u64,
    /// Released assignments, including destroys that failed afterwards.
    pub releases: u64,
    /// Nodes created on demand by allocations.
    pub provisioned: u64,
    /// Nodes created to replace destroyed ones.
    pub replaced: u64,
}

/// The serialized half of the pool. Only reachable through the lock.
struct ControlPlane {
    allocator: Allocator,
    reclaimer: Reclaimer,
    counters: PoolCounters,
}

impl ControlPlane {
    async fn allocate(
        &mut self,
        group: &str,
        name: &str,
        template: &NodeTemplate,
    ) -> PoolResult<FrontendNode> {
        let allocation = self.allocator.allocate(group, name, template).await?;
        self.counters.allocations += 1;
        self.counters.provisioned += u64::from(allocation.provisioned);
        Ok(allocation.frontend)
    }

    async fn destroy(&mut self, id: &str) -> PoolResult<Reclamation> {
        let assignment = self.reclaimer.release(id).await?;
        self.counters.releases += 1;
        let reclamation = self.reclaimer.dispose(id, assignment).await?;
        if reclamation.replacement.is_some() {
            self.counters.replaced += 1;
        }
        Ok(reclamation)
    }
}

/// A bounded pool of pre-provisioned backend nodes.
pub struct EagerNodePool {
    control: Mutex<ControlPlane>,
    view: BackendView,
    store: Arc<dyn MetadataStore>,
    config: Arc<PoolConfig>,
}

impl EagerNodePool {
    /// Validate the config, warm the pool to `min_size` and return it.
    ///
    /// The pool is not usable unless this succeeds.
    pub async fn start(
        config: PoolConfig,
        backend: Arc<dyn ComputeBackend>,
        store: Arc<dyn MetadataStore>,
    ) -> PoolResult<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let sizer = PoolSizer::new(backend.clone(), config.clone());
        sizer.ensure_minimum().await?;

        let view = sizer.view().clone();
        let control = ControlPlane {
            allocator: Allocator::new(store.clone(), sizer.clone(), config.clone()),
            reclaimer: Reclaimer::new(backend, store.clone(), sizer, config.clone()),
            counters: PoolCounters::default(),
        };

        info!(
            group = %config.group_prefix,
            min = config.min_size,
            max = config.max_size,
            remove_destroyed = config.remove_destroyed,
            "eager node pool started"
        );
        Ok(Self {
            control: Mutex::new(control),
            view,
            store,
            config,
        })
    }

    // ── Control plane ──────────────────────────────────────────────

    /// Hand an idle node to `group`/`name`, growing the pool if all nodes
    /// are assigned. Returns the node and its effective credentials.
    pub async fn allocate(
        &self,
        group: &str,
        name: &str,
        template: &NodeTemplate,
    ) -> PoolResult<FrontendNode> {
        let mut control = self.control.lock().await;
        control.allocate(group, name, template).await
    }

    /// Release the node assigned under `id` according to the destroy policy.
    pub async fn destroy(&self, id: &str) -> PoolResult<Reclamation> {
        let mut control = self.control.lock().await;
        control.destroy(id).await
    }

    /// Lifetime counters. Waits for any in-flight operation.
    pub async fn counters(&self) -> PoolCounters {
        self.control.lock().await.counters
    }

    // ── Introspection ──────────────────────────────────────────────

    /// Number of live backend nodes.
    pub async fn current_size(&self) -> PoolResult<u32> {
        Ok(self.view.list().await?.len() as u32)
    }

    /// Backend nodes without an assignment.
    pub async fn idle_nodes(&self) -> PoolResult<u32> {
        Ok(self.stats().await?.idle)
    }

    /// Backend nodes with an assignment.
    pub async fn used_nodes(&self) -> PoolResult<u32> {
        Ok(self.stats().await?.used)
    }

    pub fn min_nodes(&self) -> u32 {
        self.config.min_size
    }

    pub fn max_nodes(&self) -> u32 {
        self.config.max_size
    }

    /// All sizes from a single backend listing.
    pub async fn stats(&self) -> PoolResult<PoolStats> {
        let backend_nodes = self.view.list().await?;
        let assigned = self.store.load_all(&backend_nodes)?;
        check_no_dangling(&backend_nodes, &assigned)?;

        let current = backend_nodes.len() as u32;
        let used = assigned.len() as u32;
        debug!(current, used, "pool stats sampled");
        Ok(PoolStats {
            current,
            idle: current - used,
            used,
            min: self.config.min_size,
            max: self.config.max_size,
        })
    }

    /// The frontend view of an assigned node.
    pub async fn get_node(&self, id: &str) -> PoolResult<Option<FrontendNode>> {
        let Some(node) = self.view.list().await?.into_iter().find(|n| n.id == id) else {
            return Ok(None);
        };
        Ok(self
            .store
            .get(id)?
            .map(|assignment| FrontendNode::new(node, assignment)))
    }

    /// Every assigned node, ordered by backend id.
    pub async fn list_nodes(&self) -> PoolResult<Vec<FrontendNode>> {
        let backend_nodes = self.view.list().await?;
        let mut assignments: HashMap<String, _> = self
            .store
            .load_all(&backend_nodes)?
            .into_iter()
            .map(|a| (a.backend_node_id.clone(), a))
            .collect();

        Ok(backend_nodes
            .into_iter()
            .filter_map(|node| {
                let assignment = assignments.remove(&node.id)?;
                Some(FrontendNode::new(node, assignment))
            })
            .collect())
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}
