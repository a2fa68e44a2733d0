//! Agent orchestration: one turn from inbound text to outbound reply.

pub mod loop_;
pub mod prompt;

pub use loop_::{AgentCore, ChatTurnRequest};
