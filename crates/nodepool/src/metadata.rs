//! Node metadata store — which frontend identity owns which backend node.

use std::time::{SystemTime, UNIX_EPOCH};

use nodepool_core::{BackendNode, LoginCredentials, TemplateOptions};
use nodepool_state::{PoolAssignment, StateResult, StateStore};

/// Persistent mapping from backend nodes to their frontend assignment.
///
/// Writes must be visible to the next `load_all` made by the same process.
pub trait MetadataStore: Send + Sync {
    /// Assignments of the given nodes. Records for nodes outside
    /// `backend_nodes` are never returned.
    fn load_all(&self, backend_nodes: &[BackendNode]) -> StateResult<Vec<PoolAssignment>>;

    /// Record that `group`/`name` now owns `node`.
    fn store(
        &self,
        node: &BackendNode,
        group: &str,
        name: &str,
        credentials: &LoginCredentials,
        options: &TemplateOptions,
    ) -> StateResult<PoolAssignment>;

    /// Remove the assignment of a node. Returns true if one existed.
    fn delete_mapping(&self, node_id: &str) -> StateResult<bool>;

    /// The assignment record of a node, if any.
    fn get(&self, node_id: &str) -> StateResult<Option<PoolAssignment>>;
}

impl MetadataStore for StateStore {
    fn load_all(&self, backend_nodes: &[BackendNode]) -> StateResult<Vec<PoolAssignment>> {
        self.get_assignments(backend_nodes.iter().map(|n| n.id.as_str()))
    }

    fn store(
        &self,
        node: &BackendNode,
        group: &str,
        name: &str,
        credentials: &LoginCredentials,
        options: &TemplateOptions,
    ) -> StateResult<PoolAssignment> {
        let assignment = PoolAssignment {
            backend_node_id: node.id.clone(),
            frontend_group: group.to_string(),
            frontend_name: name.to_string(),
            credentials: credentials.clone(),
            tags: options.tags.clone(),
            user_metadata: options.user_metadata.clone(),
            assigned_at: epoch_secs(),
        };
        self.put_assignment(&assignment)?;
        Ok(assignment)
    }

    fn delete_mapping(&self, node_id: &str) -> StateResult<bool> {
        self.delete_assignment(node_id)
    }

    fn get(&self, node_id: &str) -> StateResult<Option<PoolAssignment>> {
        self.get_assignment(node_id)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
