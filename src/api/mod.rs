//! Purpose: Define the stable public API boundary for nodebook.
//! Exports: Store interface, backends, server lifecycle, and error types.
//! Role: Public, additive-only surface; embedding applications depend on
//! this module rather than on `core` internals.
//! Invariants: Backend selection happens here, at construction time —
//! `MemoryStore::new()` or `RemoteStore::new()` + `connect`.

mod remote;

pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::memory::MemoryStore;
pub use crate::core::node::{Attrs, Node, NodeId, TitleMatch};
pub use crate::core::store::{NodeStore, StoreResult};
pub use crate::serve::{ServeConfig, Server, init_tracing};
pub use remote::RemoteStore;
