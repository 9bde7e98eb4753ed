//! Persisted record types for the node pool state store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use nodepool_core::{LoginCredentials, NodeId};

/// The record that a frontend identity currently owns a backend node.
///
/// Created when a node is handed out and deleted when it is released; a
/// record is never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolAssignment {
    pub backend_node_id: NodeId,
    /// Group the requester asked for.
    pub frontend_group: String,
    /// Name the requester asked for.
    pub frontend_name: String,
    /// Credentials in effect for the frontend owner.
    pub credentials: LoginCredentials,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub user_metadata: HashMap<String, String>,
    /// Unix timestamp (seconds) when the node was assigned.
    pub assigned_at: u64,
}

impl PoolAssignment {
    /// Key for the assignments table.
    pub fn table_key(&self) -> &str {
        &self.backend_node_id
    }
}

/// Counter key for the local backend's per-group node sequence.
pub fn sequence_key(group: &str) -> String {
    format!("seq:{group}")
}
