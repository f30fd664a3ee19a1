//! LogSink - 何も配送しない既定の sink
//!
//! バッチをログに出すだけで、遷移は返さない（claim-and-release）。

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{OutboxMessage, SinkError, StatusTransition};
use crate::ports::MessageSink;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    async fn dispatch(
        &self,
        service: &str,
        batch: &[OutboxMessage],
    ) -> Result<Vec<StatusTransition>, SinkError> {
        for msg in batch {
            debug!(
                service,
                message_id = msg.id,
                attempt_count = msg.attempt_count,
                body_len = msg.body.len(),
                "Claimed message"
            );
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_no_transitions() {
        let batch = vec![OutboxMessage::new(1, "a", "{}"), OutboxMessage::new(2, "b", "{}")];
        let transitions = LogSink.dispatch("svc", &batch).await.unwrap();
        assert!(transitions.is_empty());
    }
}
