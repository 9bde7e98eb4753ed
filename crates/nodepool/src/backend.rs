//! Compute backend seam and the pool's view of it.
//!
//! The backend owns node lifecycle (create, list, destroy). The pool only
//! ever sees immutable [`BackendNode`] snapshots returned by these calls.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use nodepool_core::{BackendNode, NodeTemplate};

use crate::error::PoolResult;

/// Boxed future returned by backend calls.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// The compute provider that actually runs pool nodes.
///
/// Implementations own their retry policy; the pool never retries a failed
/// call.
pub trait ComputeBackend: Send + Sync {
    /// All nodes currently known in `group`.
    fn list_nodes_in_group<'a>(&'a self, group: &'a str) -> BackendFuture<'a, Vec<BackendNode>>;

    /// Create up to `count` nodes in `group`. Returning fewer than `count`
    /// is a valid outcome.
    fn create_nodes<'a>(
        &'a self,
        template: &'a NodeTemplate,
        count: u32,
        group: &'a str,
    ) -> BackendFuture<'a, Vec<BackendNode>>;

    /// Terminate a node.
    fn destroy_node<'a>(&'a self, id: &'a str) -> BackendFuture<'a, ()>;
}

/// Read-only view of the nodes belonging to the pool's group.
#[derive(Clone)]
pub struct BackendView {
    backend: Arc<dyn ComputeBackend>,
    group_prefix: String,
}

impl BackendView {
    pub fn new(backend: Arc<dyn ComputeBackend>, group_prefix: &str) -> Self {
        Self {
            backend,
            group_prefix: group_prefix.to_string(),
        }
    }

    /// Current live nodes of the pool, ordered by id.
    ///
    /// Terminated nodes are not pool members even if the backend still
    /// reports them.
    pub async fn list(&self) -> PoolResult<Vec<BackendNode>> {
        let mut nodes: Vec<BackendNode> = self
            .backend
            .list_nodes_in_group(&self.group_prefix)
            .await?
            .into_iter()
            .filter(|node| node.is_live())
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(group = %self.group_prefix, count = nodes.len(), "backend nodes listed");
        Ok(nodes)
    }

    pub fn group_prefix(&self) -> &str {
        &self.group_prefix
    }
}
