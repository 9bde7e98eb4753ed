//! nodepool — eager pool of pre-provisioned backend nodes.
//!
//! Keeps a bounded pool of compute nodes warm and hands them out to
//! frontend requesters (a group and a name). The pool:
//!
//! - Provisions up to `min_size` nodes before it is declared ready
//! - Assigns idle nodes, growing the pool on demand up to `max_size`
//! - Releases assignments and either destroys the node (replacing it when
//!   the pool drops below `min_size`) or keeps it for reuse
//!
//! # Architecture
//!
//! ```text
//! EagerNodePool
//!   ├── Mutex<ControlPlane>      (one lock, serializes allocate/destroy)
//!   │     ├── Allocator          (BackendView + MetadataStore + PoolSizer)
//!   │     └── Reclaimer          (MetadataStore + ComputeBackend + PoolSizer)
//!   └── BackendView + MetadataStore (lock-free introspection)
//! ```

pub mod allocator;
pub mod backend;
pub mod error;
pub mod local;
pub mod metadata;
pub mod pool;
pub mod reclaimer;
pub mod sizer;

pub use allocator::{Allocation, Allocator, FrontendNode};
pub use backend::{BackendFuture, BackendView, ComputeBackend};
pub use error::{PoolError, PoolResult};
pub use local::LocalBackend;
pub use metadata::MetadataStore;
pub use pool::{EagerNodePool, PoolCounters, PoolStats};
pub use reclaimer::{Reclaimer, Reclamation};
pub use sizer::PoolSizer;
