//! Shared domain types for Agentry.
//!
//! This crate contains the core domain types used across the Agentry engine:
//! Session, memory tiers, tool call records, artifacts, the structured LLM
//! response shape, engine events, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror,
//! schemars.

pub mod artifact;
pub mod error;
pub mod event;
pub mod llm;
pub mod memory;
pub mod session;
pub mod tool;
