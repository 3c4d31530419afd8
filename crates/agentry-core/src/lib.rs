//! Session engine, memory model, and tool dispatch for Agentry.
//!
//! This crate is the engine core: the per-iteration state machine
//! (`session::SessionEngine`), the three-tier memory model
//! (`memory::MemoryStore`), reference-token expansion
//! (`memory::ReferenceResolver`), anti-repetition safeguards
//! (`memory::LoopGuard`), tool dispatch (`tool::ToolDispatcher`), and
//! bounded child-session concurrency (`children::ChildCoordinator`).
//!
//! The crate defines the "ports" the engine depends on -- `llm::LlmClient`,
//! the tool executor traits, and `storage::SessionStore` -- and never
//! depends on any transport or storage technology itself.

pub mod children;
pub mod event;
pub mod llm;
pub mod memory;
pub mod session;
pub mod storage;
pub mod tool;
