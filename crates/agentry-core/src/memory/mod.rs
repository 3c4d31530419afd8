//! Three-tier session memory: store, reference resolution, loop guard.

pub mod guard;
pub mod resolver;
pub mod store;

pub use guard::{GuardDecision, IterationActivity, LoopGuard};
pub use resolver::ReferenceResolver;
pub use store::MemoryStore;
