//! Pool sizer — provisions backend nodes and keeps the pool at its minimum.

use std::sync::Arc;

use tracing::{debug, info, warn};

use nodepool_core::{BackendNode, NodeTemplate, PoolConfig};

use crate::backend::{BackendView, ComputeBackend};
use crate::error::{PoolError, PoolResult};

/// Grows the pool through the compute backend.
///
/// Every node is created from the pool's template with the admin-access
/// credentials merged in, in the pool's backend group.
#[derive(Clone)]
pub struct PoolSizer {
    backend: Arc<dyn ComputeBackend>,
    view: BackendView,
    config: Arc<PoolConfig>,
    template: NodeTemplate,
}

impl PoolSizer {
    pub fn new(backend: Arc<dyn ComputeBackend>, config: Arc<PoolConfig>) -> Self {
        let view = BackendView::new(backend.clone(), &config.group_prefix);
        let template = config.provisioning_template();
        Self {
            backend,
            view,
            config,
            template,
        }
    }

    /// Top the pool up to `min_size`.
    ///
    /// Fails with `ProvisioningFailed` when the backend delivers fewer nodes
    /// than the deficit; a pool that fails here is not ready to serve.
    pub async fn ensure_minimum(&self) -> PoolResult<Vec<BackendNode>> {
        let current = self.view.list().await?.len() as u32;
        let deficit = self.config.min_size.saturating_sub(current);
        info!(
            group = %self.config.group_prefix,
            existing = current,
            min = self.config.min_size,
            allocating = deficit,
            "initializing node pool"
        );

        let created = self.grow_pool(deficit).await?;
        if (created.len() as u32) < deficit {
            return Err(PoolError::ProvisioningFailed {
                requested: deficit,
                created: created.len() as u32,
            });
        }

        info!(group = %self.config.group_prefix, "pool initialized");
        Ok(created)
    }

    /// Ask the backend for `count` new nodes and return the ones it created.
    ///
    /// Fewer nodes than requested is not an error here; callers check.
    pub async fn grow_pool(&self, count: u32) -> PoolResult<Vec<BackendNode>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        debug!(
            group = %self.config.group_prefix,
            count,
            image = %self.template.image,
            hardware = %self.template.hardware,
            "requesting backend nodes"
        );
        let created = self
            .backend
            .create_nodes(&self.template, count, &self.config.group_prefix)
            .await?;

        if (created.len() as u32) < count {
            warn!(
                group = %self.config.group_prefix,
                requested = count,
                created = created.len(),
                "backend created fewer nodes than requested"
            );
        } else {
            debug!(group = %self.config.group_prefix, created = created.len(), "backend nodes created");
        }
        Ok(created)
    }

    pub fn view(&self) -> &BackendView {
        &self.view
    }
}
