//! Reclaimer — releases assignments and applies the destroy policy.
//!
//! The mapping is removed before the backend is touched; a node whose
//! termination then fails is left idle in the pool. With `remove_destroyed`
//! the backend node is terminated and, if the pool dropped below
//! `min_size`, exactly one replacement is provisioned before returning.
//! Without it the node keeps running and is idle again.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use nodepool_core::{BackendNode, NodeId, PoolConfig};
use nodepool_state::PoolAssignment;

use crate::backend::{BackendView, ComputeBackend};
use crate::error::{PoolError, PoolResult};
use crate::metadata::MetadataStore;
use crate::sizer::PoolSizer;

/// What a destroy did to the pool.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Reclamation {
    pub node_id: NodeId,
    /// Frontend group the node was released from.
    pub group: String,
    /// Whether the backend node was terminated.
    pub destroyed: bool,
    /// Node provisioned to restore the minimum, if any.
    pub replacement: Option<BackendNode>,
}

pub struct Reclaimer {
    backend: Arc<dyn ComputeBackend>,
    view: BackendView,
    store: Arc<dyn MetadataStore>,
    sizer: PoolSizer,
    config: Arc<PoolConfig>,
}

impl Reclaimer {
    pub fn new(
        backend: Arc<dyn ComputeBackend>,
        store: Arc<dyn MetadataStore>,
        sizer: PoolSizer,
        config: Arc<PoolConfig>,
    ) -> Self {
        Self {
            backend,
            view: sizer.view().clone(),
            store,
            sizer,
            config,
        }
    }

    /// Release the node assigned under `id` and apply the destroy policy.
    pub async fn destroy(&self, id: &str) -> PoolResult<Reclamation> {
        let assignment = self.release(id).await?;
        self.dispose(id, assignment).await
    }

    /// Remove the assignment of `id`. Nothing on the backend changes.
    ///
    /// Fails with `NotFound` unless `id` is a live pool node with an
    /// assignment.
    pub async fn release(&self, id: &str) -> PoolResult<PoolAssignment> {
        let backend_nodes = self.view.list().await?;
        if !backend_nodes.iter().any(|n| n.id == id) {
            return Err(PoolError::NotFound(id.to_string()));
        }
        let assignment = self
            .store
            .get(id)?
            .ok_or_else(|| PoolError::NotFound(id.to_string()))?;

        info!(node_id = %id, group = %assignment.frontend_group, "destroying node");
        self.store.delete_mapping(id)?;
        Ok(assignment)
    }

    /// Apply the destroy policy to a node whose assignment was released.
    ///
    /// If termination fails the node stays in the backend without a
    /// mapping, so it counts as idle and the next allocation may hand it
    /// out again.
    pub async fn dispose(&self, id: &str, assignment: PoolAssignment) -> PoolResult<Reclamation> {
        if !self.config.remove_destroyed {
            info!(node_id = %id, "node released back to the pool");
            return Ok(Reclamation {
                node_id: id.to_string(),
                group: assignment.frontend_group,
                destroyed: false,
                replacement: None,
            });
        }

        if let Err(e) = self.backend.destroy_node(id).await {
            warn!(
                node_id = %id,
                error = %e,
                "backend destroy failed after mapping removal, node is idle and may be reassigned"
            );
            return Err(PoolError::Backend(e));
        }

        let current = self.view.list().await?.len() as u32;
        let mut replacement = None;
        if current < self.config.min_size {
            info!(
                node_id = %id,
                current,
                min = self.config.min_size,
                "pool below minimum size, replacing destroyed node"
            );
            let created = match self.sizer.grow_pool(1).await {
                Ok(created) => created,
                Err(e) => {
                    warn!(node_id = %id, error = %e, "replacement failed, pool remains below minimum size");
                    return Err(PoolError::ProvisioningFailed {
                        requested: 1,
                        created: 0,
                    });
                }
            };
            match created.into_iter().next() {
                Some(node) => {
                    info!(node_id = %id, replacement = %node.id, "node replaced");
                    replacement = Some(node);
                }
                None => {
                    warn!(node_id = %id, "replacement failed, pool remains below minimum size");
                    return Err(PoolError::ProvisioningFailed {
                        requested: 1,
                        created: 0,
                    });
                }
            }
        }

        info!(node_id = %id, "node destroyed");
        Ok(Reclamation {
            node_id: id.to_string(),
            group: assignment.frontend_group,
            destroyed: true,
            replacement,
        })
    }
}
