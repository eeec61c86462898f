//! Agent chain orchestration.

pub mod agent;
pub mod context;
pub mod extract;
pub mod orchestrator;

pub use agent::ChainAgent;
pub use context::AgentContext;
pub use orchestrator::{
    AgentExecution, ChainFailure, ChainOrchestrator, ChainProgress, ChainReport,
};
