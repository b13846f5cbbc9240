pub mod clause_ctx;
pub mod clause_flow;

pub use clause_ctx::ClauseCtx;
pub use clause_flow::{ClauseFlow, ClauseOutcome};
