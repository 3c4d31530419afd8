//! Session execution: input assembly, response parsing, the iteration
//! engine, and the active-session registry.

pub mod engine;
pub mod input;
pub mod registry;
pub mod response;

pub use engine::{EngineConfig, RunOutcome, SessionEngine};
pub use input::{InputAssembler, InputExtras};
pub use registry::{ActiveGuard, ActiveSessions};
pub use response::parse_agent_response;
