//! Process configuration read from `REGISTRY_*` environment variables.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a {expected}: {message}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        message: String,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Postgres URL. `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub kafka_brokers: String,
    pub events_topic: String,
    pub consumer_group: String,
    /// Remote billing endpoint. `None` uses the in-process billing service.
    pub billing_endpoint: Option<String>,
    pub provisioning_timeout: Duration,
    pub publish_timeout: Duration,
    pub metrics_port: u16,
    pub dlq_capacity: usize,
    pub jwt_secret: String,
    pub token_ttl: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            kafka_brokers: "localhost:9092".to_string(),
            events_topic: "subject".to_string(),
            consumer_group: "subject-analytics".to_string(),
            billing_endpoint: None,
            provisioning_timeout: Duration::from_millis(5_000),
            publish_timeout: Duration::from_millis(2_000),
            metrics_port: 9090,
            dlq_capacity: 1_000,
            jwt_secret: "subject-registry-dev-secret".to_string(),
            token_ttl: Duration::from_secs(10 * 60 * 60),
        }
    }
}

impl RegistryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let mut config = Self::default();

        config.database_url = env.string("REGISTRY_DATABASE_URL");
        config.billing_endpoint = env.string("REGISTRY_BILLING_ENDPOINT");

        if let Some(brokers) = env.string("REGISTRY_KAFKA_BROKERS") {
            config.kafka_brokers = brokers;
        }
        if let Some(topic) = env.string("REGISTRY_EVENTS_TOPIC") {
            config.events_topic = topic;
        }
        if let Some(group) = env.string("REGISTRY_CONSUMER_GROUP") {
            config.consumer_group = group;
        }
        if let Some(ms) = env.positive_u64("REGISTRY_PROVISIONING_TIMEOUT_MS")? {
            config.provisioning_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env.positive_u64("REGISTRY_PUBLISH_TIMEOUT_MS")? {
            config.publish_timeout = Duration::from_millis(ms);
        }
        if let Some(port) = env.u16("REGISTRY_METRICS_PORT")? {
            config.metrics_port = port;
        }
        if let Some(capacity) = env.positive_u64("REGISTRY_DLQ_CAPACITY")? {
            config.dlq_capacity = usize::try_from(capacity).map_err(|e| ConfigError::Invalid {
                name: "REGISTRY_DLQ_CAPACITY",
                expected: "usize",
                message: e.to_string(),
            })?;
        }
        if let Some(secret) = env.string("REGISTRY_JWT_SECRET") {
            config.jwt_secret = secret;
        }
        if let Some(secs) = env.positive_u64("REGISTRY_TOKEN_TTL_SECS")? {
            config.token_ttl = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn u16(&self, name: &'static str) -> Result<Option<u16>, ConfigError> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u16>().map(Some).map_err(|e| ConfigError::Invalid {
            name,
            expected: "u16",
            message: e.to_string(),
        })
    }

    fn positive_u64(&self, name: &'static str) -> Result<Option<u64>, ConfigError> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        match v.parse::<u64>() {
            Ok(0) => Err(ConfigError::Zero(name)),
            Ok(value) => Ok(Some(value)),
            Err(e) => Err(ConfigError::Invalid {
                name,
                expected: "u64",
                message: e.to_string(),
            }),
        }
    }
}
