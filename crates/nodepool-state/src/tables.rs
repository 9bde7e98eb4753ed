//! redb table definitions for the node pool state store.
//!
//! Record tables use `&str` keys (backend node ids) and `&[u8]` values
//! (JSON-serialized domain types).

use redb::TableDefinition;

/// Pool assignments keyed by backend node id.
pub const ASSIGNMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("assignments");

/// Local backend node records keyed by node id.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Monotonic counters keyed by name (e.g. `seq:{group}`).
pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");
