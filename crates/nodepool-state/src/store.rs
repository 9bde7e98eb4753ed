//! StateStore — redb-backed state persistence for the node pool.
//!
//! Provides typed CRUD operations over pool assignments and local backend
//! node records. All values are JSON-serialized into redb's `&[u8]` value
//! columns. The store supports both on-disk and in-memory backends (the
//! latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use nodepool_core::BackendNode;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(ASSIGNMENTS).map_err(map_err!(Table))?;
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(COUNTERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Assignments ────────────────────────────────────────────────

    /// Insert or replace the assignment for its backend node.
    pub fn put_assignment(&self, assignment: &PoolAssignment) -> StateResult<()> {
        let key = assignment.table_key();
        let value = serde_json::to_vec(assignment).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ASSIGNMENTS).map_err(map_err!(Table))?;
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, group = %assignment.frontend_group, "assignment stored");
        Ok(())
    }

    /// Get the assignment for a backend node, if any.
    pub fn get_assignment(&self, node_id: &str) -> StateResult<Option<PoolAssignment>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ASSIGNMENTS).map_err(map_err!(Table))?;
        match table.get(node_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let assignment: PoolAssignment =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(assignment))
            }
            None => Ok(None),
        }
    }

    /// Get the assignments for the given node ids in a single read.
    ///
    /// Ids without an assignment are skipped.
    pub fn get_assignments<'a, I>(&self, node_ids: I) -> StateResult<Vec<PoolAssignment>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ASSIGNMENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for node_id in node_ids {
            if let Some(guard) = table.get(node_id).map_err(map_err!(Read))? {
                let assignment: PoolAssignment =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                results.push(assignment);
            }
        }
        Ok(results)
    }

    /// List every stored assignment, including ones whose node is gone.
    pub fn list_assignments(&self) -> StateResult<Vec<PoolAssignment>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ASSIGNMENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let assignment: PoolAssignment =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(assignment);
        }
        Ok(results)
    }

    /// Delete the assignment for a node. Returns true if it existed.
    pub fn delete_assignment(&self, node_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(ASSIGNMENTS).map_err(map_err!(Table))?;
            existed = table.remove(node_id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%node_id, existed, "assignment deleted");
        Ok(existed)
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a node record.
    pub fn put_node(&self, node: &BackendNode) -> StateResult<()> {
        let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            table
                .insert(node.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a node by ID.
    pub fn get_node(&self, node_id: &str) -> StateResult<Option<BackendNode>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        match table.get(node_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let node: BackendNode =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// List all nodes created in a group.
    pub fn list_nodes_in_group(&self, group: &str) -> StateResult<Vec<BackendNode>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let node: BackendNode =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if node.group == group {
                results.push(node);
            }
        }
        Ok(results)
    }

    /// Delete a node by ID. Returns true if it existed.
    pub fn delete_node(&self, node_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            existed = table.remove(node_id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Counters ───────────────────────────────────────────────────

    /// Increment a counter and return its new value (first call yields 1).
    pub fn next_sequence(&self, key: &str) -> StateResult<u64> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let next;
        {
            let mut table = txn.open_table(COUNTERS).map_err(map_err!(Table))?;
            let current = table
                .get(key)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(0);
            next = current + 1;
            table.insert(key, next).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodepool_core::{LoginCredentials, NodeState};
    use std::collections::HashMap;

    fn test_node(id: &str, group: &str) -> BackendNode {
        BackendNode {
            id: id.to_string(),
            group: group.to_string(),
            name: id.to_string(),
            state: NodeState::Running,
            addresses: vec!["10.0.0.1".to_string()],
            created_at: 1000,
        }
    }

    fn test_assignment(node_id: &str, group: &str) -> PoolAssignment {
        PoolAssignment {
            backend_node_id: node_id.to_string(),
            frontend_group: group.to_string(),
            frontend_name: format!("{group}-web"),
            credentials: LoginCredentials::for_user("nodepool"),
            tags: vec!["ci".to_string()],
            user_metadata: HashMap::new(),
            assigned_at: 1000,
        }
    }

    // ── Assignment CRUD ────────────────────────────────────────────

    #[test]
    fn assignment_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let assignment = test_assignment("pool-0001", "g1");

        store.put_assignment(&assignment).unwrap();
        let retrieved = store.get_assignment("pool-0001").unwrap();

        assert_eq!(retrieved, Some(assignment));
    }

    #[test]
    fn assignment_get_nonexistent_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_assignment("nope").unwrap().is_none());
    }

    #[test]
    fn get_assignments_skips_unassigned_ids() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_assignment(&test_assignment("pool-0001", "g1")).unwrap();
        store.put_assignment(&test_assignment("pool-0003", "g2")).unwrap();

        let found = store
            .get_assignments(["pool-0001", "pool-0002", "pool-0003"])
            .unwrap();
        let ids: Vec<_> = found.iter().map(|a| a.backend_node_id.as_str()).collect();
        assert_eq!(ids, vec!["pool-0001", "pool-0003"]);
    }

    #[test]
    fn assignment_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_assignment(&test_assignment("pool-0001", "g1")).unwrap();

        assert!(store.delete_assignment("pool-0001").unwrap());
        assert!(!store.delete_assignment("pool-0001").unwrap());
        assert!(store.list_assignments().unwrap().is_empty());
    }

    // ── Node CRUD ──────────────────────────────────────────────────

    #[test]
    fn node_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let node = test_node("pool-0001", "pool");

        store.put_node(&node).unwrap();
        assert_eq!(store.get_node("pool-0001").unwrap(), Some(node));
    }

    #[test]
    fn node_list_filters_by_group() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_node(&test_node("a-0001", "a")).unwrap();
        store.put_node(&test_node("a-0002", "a")).unwrap();
        store.put_node(&test_node("b-0001", "b")).unwrap();

        assert_eq!(store.list_nodes_in_group("a").unwrap().len(), 2);
        assert_eq!(store.list_nodes_in_group("b").unwrap().len(), 1);
        assert!(store.list_nodes_in_group("c").unwrap().is_empty());
    }

    #[test]
    fn node_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_node(&test_node("pool-0001", "pool")).unwrap();

        assert!(store.delete_node("pool-0001").unwrap());
        assert!(store.get_node("pool-0001").unwrap().is_none());
    }

    // ── Counters ───────────────────────────────────────────────────

    #[test]
    fn sequences_are_independent_and_monotonic() {
        let store = StateStore::open_in_memory().unwrap();
        assert_eq!(store.next_sequence("seq:a").unwrap(), 1);
        assert_eq!(store.next_sequence("seq:a").unwrap(), 2);
        assert_eq!(store.next_sequence("seq:b").unwrap(), 1);
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.put_assignment(&test_assignment("pool-0001", "g1")).unwrap();
            store.next_sequence("seq:pool").unwrap();
        }

        let store = StateStore::open(&db_path).unwrap();
        let assignment = store.get_assignment("pool-0001").unwrap();
        assert_eq!(assignment.unwrap().frontend_group, "g1");
        assert_eq!(store.next_sequence("seq:pool").unwrap(), 2);
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_assignments().unwrap().is_empty());
        assert!(store.list_nodes_in_group("any").unwrap().is_empty());
        assert!(!store.delete_assignment("nope").unwrap());
        assert!(!store.delete_node("nope").unwrap());
    }
}
