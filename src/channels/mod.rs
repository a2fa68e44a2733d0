//! Messaging front-ends and the outbound send gate.

pub mod rate_limiter;
pub mod telegram;
pub mod traits;

pub use rate_limiter::{is_group_chat, SendError, SendGate};
pub use telegram::TelegramChannel;
pub use traits::{ChannelBridge, ChannelSink};
