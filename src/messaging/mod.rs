// ============================================================================
// Messaging - subject event stream (producer and consumer sides)
// ============================================================================

mod consumer;
mod dlq;
mod publisher;
mod redpanda;

use std::time::Duration;

pub use consumer::{
    build_stream_consumer, run_kafka_consumer, ChangeEventHandler, ConsumeOutcome, ConsumerStats,
    LoggingEventHandler, TolerantEventConsumer,
};
pub use dlq::{DeadLetter, DeadLetterQueue, DlqStats};
pub use publisher::{EventPublisher, KafkaEventPublisher};
pub use redpanda::RedpandaClient;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("Circuit breaker open for event broker")]
    CircuitOpen,

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Producer configuration error: {0}")]
    Configuration(String),
}

impl PublishError {
    pub fn reason(&self) -> &'static str {
        match self {
            PublishError::Timeout(_) => "timeout",
            PublishError::CircuitOpen => "circuit_open",
            PublishError::Broker(_) => "broker",
            PublishError::Configuration(_) => "configuration",
        }
    }
}
