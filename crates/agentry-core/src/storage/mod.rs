//! Storage trait definitions (ports).
//!
//! These traits define the persistence interface that the infrastructure
//! layer (agentry-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod session_store;

pub use session_store::SessionStore;
