use async_trait::async_trait;
use chrono::Utc;
use futures_util::{FutureExt, Stream, StreamExt};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::Message;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;

use super::dlq::{DeadLetter, DeadLetterQueue};
use crate::events::{self, ChangeEvent};
use crate::metrics::Metrics;

// ============================================================================
// Tolerant Event Consumer
// ============================================================================
//
// Decode-or-skip loop for the subject event stream. A single bad message
// costs at most that one event: it is logged, counted and parked in the
// dead letter queue, and the loop moves on. Nothing raised while handling a
// message escapes `on_message`.
//
// ============================================================================

/// Downstream processing for decoded events (analytics side).
#[async_trait]
pub trait ChangeEventHandler: Send + Sync {
    async fn handle(&self, event: ChangeEvent) -> anyhow::Result<()>;
}

/// Logs every received event; the analytics service's default sink.
#[derive(Debug, Default, Clone)]
pub struct LoggingEventHandler;

#[async_trait]
impl ChangeEventHandler for LoggingEventHandler {
    async fn handle(&self, event: ChangeEvent) -> anyhow::Result<()> {
        tracing::info!(
            subject_id = %event.subject_id,
            name = %event.name,
            contact_address = %event.contact_address,
            "Received subject event"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Handled,
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub handled: u64,
    pub skipped: u64,
}

pub struct TolerantEventConsumer<H> {
    handler: H,
    dlq: Arc<DeadLetterQueue>,
    metrics: Option<Arc<Metrics>>,
}

impl<H: ChangeEventHandler> TolerantEventConsumer<H> {
    pub fn new(handler: H, dlq: Arc<DeadLetterQueue>) -> Self {
        Self {
            handler,
            dlq,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub async fn on_message(&self, payload: &[u8]) -> ConsumeOutcome {
        let event = match events::decode(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    payload_bytes = payload.len(),
                    "Skipping undecodable subject event"
                );
                self.skip(payload, e.reason(), e.to_string()).await;
                return ConsumeOutcome::Skipped;
            }
        };

        let subject_id = event.subject_id.clone();
        let handled = AssertUnwindSafe(self.handler.handle(event)).catch_unwind().await;

        match handled {
            Ok(Ok(())) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_event_consumed();
                }
                ConsumeOutcome::Handled
            }
            Ok(Err(e)) => {
                tracing::warn!(subject_id = %subject_id, error = %e, "Event handler failed, skipping");
                self.skip(payload, "handler_error", e.to_string()).await;
                ConsumeOutcome::Skipped
            }
            Err(_) => {
                tracing::error!(subject_id = %subject_id, "Event handler panicked, skipping");
                self.skip(payload, "handler_panic", "handler panicked".to_string()).await;
                ConsumeOutcome::Skipped
            }
        }
    }

    async fn skip(&self, payload: &[u8], reason: &'static str, error_message: String) {
        if let Some(metrics) = &self.metrics {
            metrics.record_event_skipped(reason);
        }
        self.dlq
            .push(DeadLetter {
                payload: payload.to_vec(),
                reason,
                error_message,
                received_at: Utc::now(),
            })
            .await;
    }

    /// Drive the consumer until the stream ends or shutdown is signalled.
    /// A dropped shutdown sender counts as a shutdown signal.
    pub async fn consume_stream<S>(&self, mut messages: S, mut shutdown: watch::Receiver<bool>) -> ConsumerStats
    where
        S: Stream<Item = Vec<u8>> + Unpin,
    {
        let mut stats = ConsumerStats::default();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!(?stats, "Event consumer shutting down");
                        break;
                    }
                }
                next = messages.next() => {
                    let Some(payload) = next else {
                        tracing::info!(?stats, "Event stream ended");
                        break;
                    };

                    stats.received += 1;
                    match self.on_message(&payload).await {
                        ConsumeOutcome::Handled => stats.handled += 1,
                        ConsumeOutcome::Skipped => stats.skipped += 1,
                    }
                }
            }
        }

        stats
    }
}

/// Build a stream consumer subscribed to the subject event topic.
pub fn build_stream_consumer(brokers: &str, group_id: &str, topic: &str) -> Result<StreamConsumer, KafkaError> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", group_id)
        .set("auto.offset.reset", "earliest")
        .set("enable.partition.eof", "false")
        .create()?;

    consumer.subscribe(&[topic])?;
    tracing::info!(topic, group_id, "Subscribed to subject events");

    Ok(consumer)
}

/// Feed Kafka payloads through the tolerant consumer. Receive errors from the
/// broker are logged and the loop keeps polling.
pub async fn run_kafka_consumer<H: ChangeEventHandler>(
    consumer: StreamConsumer,
    tolerant: Arc<TolerantEventConsumer<H>>,
    shutdown: watch::Receiver<bool>,
) -> ConsumerStats {
    let payloads = consumer.stream().filter_map(|message| async move {
        match message {
            Ok(message) => Some(message.payload().map(<[u8]>::to_vec).unwrap_or_default()),
            Err(e) => {
                tracing::warn!(error = %e, "Kafka receive error, continuing");
                None
            }
        }
    });

    tolerant.consume_stream(Box::pin(payloads), shutdown).await
}
