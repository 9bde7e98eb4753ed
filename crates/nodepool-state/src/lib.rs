//! nodepool-state — embedded state store for the node pool.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for pool assignments (which frontend identity owns which backend
//! node) and for the node records of the bundled local backend.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns,
//! keyed by backend node id. A node with no row in `assignments` is idle.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
