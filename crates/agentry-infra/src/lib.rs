//! Infrastructure implementations for Agentry.
//!
//! Implements the `SessionStore` port from `agentry-core`: an in-memory
//! store for tests and embedded use, and a SQLite store with split
//! reader/writer pools for durable persistence.

pub mod sqlite;
pub mod store;
