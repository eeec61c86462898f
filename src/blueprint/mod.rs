//! Blueprint domain: input validation, the financial agent chain, and
//! strategy assembly.

pub mod agents;
pub mod input;
pub mod report;

pub use agents::default_chain;
pub use input::{GenerationInput, ProductStage, TargetMarket};
