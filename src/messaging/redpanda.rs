use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};
use std::time::Duration;

use super::PublishError;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

/// Kafka-compatible producer (Redpanda in development) behind a circuit breaker.
pub struct RedpandaClient {
    producer: FutureProducer,
    send_timeout: Duration,
    circuit_breaker: CircuitBreaker,
}

impl RedpandaClient {
    pub fn new(brokers: &str, send_timeout: Duration) -> Result<Self, PublishError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", send_timeout.as_millis().to_string())
            .create()
            .map_err(|e| PublishError::Configuration(e.to_string()))?;

        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            cool_down: Duration::from_secs(30),
            success_threshold: 3,
        };

        Ok(Self {
            producer,
            send_timeout,
            circuit_breaker: CircuitBreaker::new("redpanda", cb_config),
        })
    }

    /// Wait for broker acknowledgement only; downstream consumption is not awaited.
    pub async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), PublishError> {
        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(topic).key(key).payload(payload);

                self.producer
                    .send(record, Timeout::After(self.send_timeout))
                    .await
                    .map_err(|(e, _)| e)
            })
            .await;

        match result {
            Ok(_) => {
                tracing::info!(topic, key, bytes = payload.len(), "Published to Redpanda");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::error!(topic, "Circuit breaker open - Redpanda unavailable");
                Err(PublishError::CircuitOpen)
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(error = %e, topic, "Failed to publish to Redpanda");
                Err(PublishError::Broker(e.to_string()))
            }
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }
}
