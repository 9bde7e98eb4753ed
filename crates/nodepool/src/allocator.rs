//! Allocator — hands idle backend nodes to frontend requesters.
//!
//! ```text
//! backend  = BackendView.list()
//! assigned = MetadataStore.load_all(backend)
//! fail CapacityExceeded      if |assigned| + 1 > max
//! idle     = backend − assigned
//! if idle is empty:
//!     PoolSizer.grow_pool(1), refresh backend
//!     fail ProvisioningFailed if idle is still empty
//! node     = first idle node (by id)
//! MetadataStore.store(node, group, name, credentials)
//! ```
//!
//! Callers must hold the pool's control lock: the read-decide-write sequence
//! above is only correct when no other allocation or destroy interleaves.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use nodepool_core::{BackendNode, LoginCredentials, NodeTemplate, PoolConfig};
use nodepool_state::PoolAssignment;

use crate::backend::BackendView;
use crate::error::{PoolError, PoolResult};
use crate::metadata::MetadataStore;
use crate::sizer::PoolSizer;

/// A backend node as seen by its frontend owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrontendNode {
    pub node: BackendNode,
    pub group: String,
    pub name: String,
    /// Credentials in effect for the owner.
    pub credentials: LoginCredentials,
    pub assigned_at: u64,
}

impl FrontendNode {
    pub fn new(node: BackendNode, assignment: PoolAssignment) -> Self {
        Self {
            node,
            group: assignment.frontend_group,
            name: assignment.frontend_name,
            credentials: assignment.credentials,
            assigned_at: assignment.assigned_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.node.id
    }
}

/// Result of a successful allocation.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub frontend: FrontendNode,
    /// Backend nodes created to satisfy this allocation.
    pub provisioned: u32,
}

pub struct Allocator {
    view: BackendView,
    store: Arc<dyn MetadataStore>,
    sizer: PoolSizer,
    config: Arc<PoolConfig>,
}

impl Allocator {
    pub fn new(store: Arc<dyn MetadataStore>, sizer: PoolSizer, config: Arc<PoolConfig>) -> Self {
        Self {
            view: sizer.view().clone(),
            store,
            sizer,
            config,
        }
    }

    /// Assign an idle node to `group`/`name`, growing the pool if needed.
    ///
    /// No assignment is written on any failure path.
    pub async fn allocate(
        &self,
        group: &str,
        name: &str,
        template: &NodeTemplate,
    ) -> PoolResult<Allocation> {
        if group.trim().is_empty() {
            return Err(PoolError::InvalidRequest("group must not be empty".to_string()));
        }
        if name.trim().is_empty() {
            return Err(PoolError::InvalidRequest("name must not be empty".to_string()));
        }

        info!(%group, %name, "assigning pool node to frontend group");
        let max = self.config.max_size;

        let backend_nodes = self.view.list().await?;
        let assigned = self.store.load_all(&backend_nodes)?;
        check_no_dangling(&backend_nodes, &assigned)?;

        let used = assigned.len() as u32;
        if used + 1 > max {
            error!(%group, used, max, "maximum pool size reached");
            return Err(PoolError::CapacityExceeded {
                requested: 1,
                current: used,
                max,
            });
        }

        let assigned_ids: HashSet<&str> = assigned
            .iter()
            .map(|a| a.backend_node_id.as_str())
            .collect();
        let mut idle = idle_nodes(backend_nodes.clone(), &assigned_ids);
        let mut provisioned = 0;

        if idle.is_empty() {
            let current = backend_nodes.len() as u32;
            if current + 1 > max {
                error!(%group, current, max, "maximum pool size reached");
                return Err(PoolError::CapacityExceeded {
                    requested: 1,
                    current,
                    max,
                });
            }

            info!(
                %group,
                requested = 1,
                current = used,
                next = used + 1,
                max,
                "all pool nodes are assigned, requiring additional nodes"
            );
            let created = self.sizer.grow_pool(1).await?;
            provisioned = created.len() as u32;

            // The assignment snapshot is still valid: growth only adds nodes.
            idle = idle_nodes(self.view.list().await?, &assigned_ids);
            if idle.is_empty() {
                return Err(PoolError::ProvisioningFailed {
                    requested: 1,
                    created: provisioned,
                });
            }
            info!(%group, provisioned, "additional nodes added to the pool and ready");
        }

        let node = idle.swap_remove(0);
        let credentials = template
            .options
            .login
            .clone()
            .unwrap_or_else(|| self.config.admin_access.credentials());

        let assignment = self
            .store
            .store(&node, group, name, &credentials, &template.options)?;
        info!(%group, %name, node_id = %node.id, "pool node assigned");

        Ok(Allocation {
            frontend: FrontendNode::new(node, assignment),
            provisioned,
        })
    }
}

/// Nodes without an assignment, in backend order.
pub(crate) fn idle_nodes(
    backend_nodes: Vec<BackendNode>,
    assigned_ids: &HashSet<&str>,
) -> Vec<BackendNode> {
    backend_nodes
        .into_iter()
        .filter(|node| !assigned_ids.contains(node.id.as_str()))
        .collect()
}

/// Every loaded assignment must refer to a node in the snapshot.
pub(crate) fn check_no_dangling(
    backend_nodes: &[BackendNode],
    assigned: &[PoolAssignment],
) -> PoolResult<()> {
    let ids: HashSet<&str> = backend_nodes.iter().map(|n| n.id.as_str()).collect();
    if let Some(dangling) = assigned
        .iter()
        .find(|a| !ids.contains(a.backend_node_id.as_str()))
    {
        return Err(PoolError::InvariantViolation(format!(
            "assignment for {} has no backend node",
            dangling.backend_node_id
        )));
    }
    if assigned.len() > backend_nodes.len() {
        return Err(PoolError::InvariantViolation(format!(
            "{} assignments for {} backend nodes",
            assigned.len(),
            backend_nodes.len()
        )));
    }
    debug!(backend = backend_nodes.len(), assigned = assigned.len(), "pool snapshot consistent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalBackend;
    use nodepool_core::NodeState;
    use nodepool_state::StateStore;

    fn setup(min: u32, max: u32) -> (Allocator, StateStore) {
        let state = StateStore::open_in_memory().unwrap();
        let backend = Arc::new(LocalBackend::new(state.clone()));
        let config = Arc::new(PoolConfig {
            min_size: min,
            max_size: max,
            group_prefix: "pool".to_string(),
            ..PoolConfig::default()
        });
        let sizer = PoolSizer::new(backend, config.clone());
        let allocator = Allocator::new(Arc::new(state.clone()), sizer, config);
        (allocator, state)
    }

    fn node(id: &str) -> BackendNode {
        BackendNode {
            id: id.to_string(),
            group: "pool".to_string(),
            name: id.to_string(),
            state: NodeState::Running,
            addresses: vec![],
            created_at: 1000,
        }
    }

    #[tokio::test]
    async fn allocate_grows_empty_pool() {
        let (allocator, state) = setup(0, 2);

        let allocation = allocator
            .allocate("g1", "n1", &NodeTemplate::default())
            .await
            .unwrap();
        assert_eq!(allocation.provisioned, 1);
        assert_eq!(allocation.frontend.group, "g1");
        assert_eq!(state.list_assignments().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn allocate_merges_admin_credentials() {
        let (allocator, _) = setup(0, 2);

        let allocation = allocator
            .allocate("g1", "n1", &NodeTemplate::default())
            .await
            .unwrap();
        assert_eq!(allocation.frontend.credentials.user, "nodepool");
    }

    #[tokio::test]
    async fn allocate_keeps_explicit_login() {
        let (allocator, _) = setup(0, 2);
        let mut template = NodeTemplate::default();
        template.options.login = Some(LoginCredentials::for_user("alice"));

        let allocation = allocator.allocate("g1", "n1", &template).await.unwrap();
        assert_eq!(allocation.frontend.credentials.user, "alice");
    }

    #[tokio::test]
    async fn allocate_rejects_empty_identity() {
        let (allocator, state) = setup(0, 2);

        let err = allocator
            .allocate("", "n1", &NodeTemplate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::InvalidRequest(_)));
        let err = allocator
            .allocate("g1", " ", &NodeTemplate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::InvalidRequest(_)));
        assert!(state.list_assignments().unwrap().is_empty());
    }

    #[tokio::test]
    async fn allocate_fails_at_capacity_without_writing() {
        let (allocator, state) = setup(0, 1);
        let template = NodeTemplate::default();
        allocator.allocate("g1", "n1", &template).await.unwrap();

        let err = allocator.allocate("g1", "n2", &template).await.unwrap_err();
        assert!(matches!(
            err,
            PoolError::CapacityExceeded { requested: 1, current: 1, max: 1 }
        ));
        assert_eq!(state.list_assignments().unwrap().len(), 1);
    }

    #[test]
    fn idle_nodes_excludes_assigned() {
        let assigned: HashSet<&str> = ["pool-0002"].into_iter().collect();
        let idle = idle_nodes(vec![node("pool-0001"), node("pool-0002")], &assigned);
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].id, "pool-0001");
    }

    #[test]
    fn dangling_assignment_is_an_invariant_violation() {
        let assignment = PoolAssignment {
            backend_node_id: "gone".to_string(),
            frontend_group: "g1".to_string(),
            frontend_name: "n1".to_string(),
            credentials: LoginCredentials::for_user("nodepool"),
            tags: vec![],
            user_metadata: Default::default(),
            assigned_at: 1000,
        };
        let err = check_no_dangling(&[node("pool-0001")], &[assignment]).unwrap_err();
        assert!(matches!(err, PoolError::InvariantViolation(_)));
    }
}
