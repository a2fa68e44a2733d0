use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// Outbound surface the core needs from a messaging front-end.
///
/// The core owns no UI knowledge: when a command needs approval it hands the
/// sink a `(chat_id, command_id, command, reason)` tuple and the front-end
/// renders whatever approve/deny affordance its platform has.
#[async_trait]
pub trait ChannelSink: Send + Sync {
    /// Human-readable channel name for logs.
    fn name(&self) -> &str;

    /// Deliver text to a chat. Implementations route through the send gate.
    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;

    /// Render approve/deny UI for a pending dangerous command.
    async fn show_approval(
        &self,
        chat_id: i64,
        command_id: &str,
        command: &str,
        reason: &str,
    ) -> anyhow::Result<()>;
}

/// Late-bound channel registry.
///
/// The core is constructed before any front-end exists; the messaging layer
/// registers itself here at startup. Gateway-only deployments never register
/// and the core degrades to reporting pending ids in its responses.
#[derive(Default)]
pub struct ChannelBridge {
    sink: RwLock<Option<Arc<dyn ChannelSink>>>,
}

impl ChannelBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sink: Arc<dyn ChannelSink>) {
        *self.sink.write() = Some(sink);
    }

    pub fn sink(&self) -> Option<Arc<dyn ChannelSink>> {
        self.sink.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;

    #[async_trait]
    impl ChannelSink for NullSink {
        fn name(&self) -> &str {
            "null"
        }

        async fn send_text(&self, _chat_id: i64, _text: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn show_approval(
            &self,
            _chat_id: i64,
            _command_id: &str,
            _command: &str,
            _reason: &str,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn bridge_starts_empty_and_registers() {
        let bridge = ChannelBridge::new();
        assert!(bridge.sink().is_none());
        bridge.register(Arc::new(NullSink));
        assert_eq!(bridge.sink().unwrap().name(), "null");
    }
}
