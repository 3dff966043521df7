//! Purpose: Shared library crate for the nodebook store and its HTTP transport.
//! Exports: `core` (node model, stores, wire codec), `api` (public surface), `serve` (server).
//! Role: Backend-agnostic node-tree CRUD used by embedding applications and tests.
//! Invariants: Application code depends on the `api` surface, not on `core` internals.
//! Invariants: The `MemoryStore` and `RemoteStore` backends stay observably equivalent.
pub mod api;
pub mod core;
pub mod serve;
