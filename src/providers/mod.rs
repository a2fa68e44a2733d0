//! LLM provider layer.
//!
//! The core speaks OpenAI-compatible chat-completions JSON to a local proxy
//! that holds the real credentials. [`traits`] defines the wire types shared
//! with the agent loop; [`proxy`] is the HTTP client.

pub mod proxy;
pub mod traits;

pub use proxy::ProxyProvider;
pub use traits::{
    ChatMessage, ChatRequest, ChatResponse, ConversationMessage, Provider, ToolCall,
    ToolResultMessage,
};
