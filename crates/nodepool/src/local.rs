//! Local backend — a simulated compute provider backed by the state store.
//!
//! Nodes are records in the store's `nodes` table and come up `Running`
//! immediately. Ids are `{group}-{seq:04}` with the sequence persisted per
//! group, so ids are never reused across restarts. Used for dry runs of the
//! daemon and as the default backend in tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use nodepool_core::{BackendNode, NodeState, NodeTemplate};
use nodepool_state::{StateResult, StateStore, sequence_key};

use crate::backend::{BackendFuture, ComputeBackend};

pub struct LocalBackend {
    state: StateStore,
    /// Max nodes delivered per `create_nodes` call.
    creation_limit: Option<u32>,
    create_calls: AtomicU32,
    last_template: Mutex<Option<NodeTemplate>>,
}

impl LocalBackend {
    pub fn new(state: StateStore) -> Self {
        Self {
            state,
            creation_limit: None,
            create_calls: AtomicU32::new(0),
            last_template: Mutex::new(None),
        }
    }

    /// Deliver at most `limit` nodes per creation request.
    pub fn with_creation_limit(mut self, limit: u32) -> Self {
        self.creation_limit = Some(limit);
        self
    }

    /// Create `count` nodes in `group` directly, bypassing the limit.
    pub fn create(&self, group: &str, count: u32) -> StateResult<Vec<BackendNode>> {
        let mut created = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let seq = self.state.next_sequence(&sequence_key(group))?;
            let id = format!("{group}-{seq:04}");
            let node = BackendNode {
                id: id.clone(),
                group: group.to_string(),
                name: id,
                state: NodeState::Running,
                addresses: vec![format!("10.0.{}.{}", (seq >> 8) & 0xff, seq & 0xff)],
                created_at: epoch_secs(),
            };
            self.state.put_node(&node)?;
            created.push(node);
        }
        Ok(created)
    }

    /// Number of live nodes in `group`.
    pub fn node_count(&self, group: &str) -> StateResult<usize> {
        Ok(self.state.list_nodes_in_group(group)?.len())
    }

    /// Number of `create_nodes` calls served so far.
    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::Relaxed)
    }

    /// Template of the most recent `create_nodes` call.
    pub fn last_template(&self) -> Option<NodeTemplate> {
        self.last_template
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl ComputeBackend for LocalBackend {
    fn list_nodes_in_group<'a>(&'a self, group: &'a str) -> BackendFuture<'a, Vec<BackendNode>> {
        Box::pin(async move { Ok::<_, anyhow::Error>(self.state.list_nodes_in_group(group)?) })
    }

    fn create_nodes<'a>(
        &'a self,
        template: &'a NodeTemplate,
        count: u32,
        group: &'a str,
    ) -> BackendFuture<'a, Vec<BackendNode>> {
        Box::pin(async move {
            self.create_calls.fetch_add(1, Ordering::Relaxed);
            match self.last_template.lock() {
                Ok(mut guard) => *guard = Some(template.clone()),
                Err(poisoned) => *poisoned.into_inner() = Some(template.clone()),
            }

            let count = self.creation_limit.map_or(count, |limit| count.min(limit));
            let created = self.create(group, count)?;
            debug!(%group, image = %template.image, created = created.len(), "local nodes created");
            Ok::<_, anyhow::Error>(created)
        })
    }

    fn destroy_node<'a>(&'a self, id: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            if !self.state.delete_node(id)? {
                anyhow::bail!("no such node: {id}");
            }
            debug!(node_id = %id, "local node destroyed");
            Ok::<_, anyhow::Error>(())
        })
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
