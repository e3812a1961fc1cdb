use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use subject_registry::auth::{
    AuthService, InMemoryUserDirectory, JwtTokenIssuer, LoginRequest, Sha256PasswordVerifier, User,
};
use subject_registry::billing::{AccountProvisioner, BillingAccountService, GrpcBillingClient};
use subject_registry::config::RegistryConfig;
use subject_registry::domain::subject::{LifecycleTimeouts, SubjectLifecycle, SubjectProfile};
use subject_registry::messaging::{
    build_stream_consumer, run_kafka_consumer, DeadLetterQueue, KafkaEventPublisher,
    LoggingEventHandler, RedpandaClient, TolerantEventConsumer,
};
use subject_registry::metrics::{self, Metrics};
use subject_registry::store::{InMemorySubjectStore, PgSubjectStore, SubjectStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,subject_registry=debug")),
        )
        .init();

    tracing::info!("Starting subject registry");

    let config = RegistryConfig::from_env()?;
    tracing::debug!(
        brokers = %config.kafka_brokers,
        topic = %config.events_topic,
        postgres = config.database_url.is_some(),
        remote_billing = config.billing_endpoint.is_some(),
        "Configuration loaded"
    );

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("Metrics registry created with {} metric families", metrics.registry().gather().len());

    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(metrics_registry, metrics_port)) {
            tracing::error!(error = %e, "Metrics server error");
        }
    });

    // === 2. Subject store ===
    let store: Arc<dyn SubjectStore> = match &config.database_url {
        Some(url) => {
            let store = PgSubjectStore::connect(url).await?;
            store.ensure_schema().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("REGISTRY_DATABASE_URL not set, using in-memory subject store");
            Arc::new(InMemorySubjectStore::new())
        }
    };

    // === 3. Billing ===
    let billing_client = match &config.billing_endpoint {
        Some(endpoint) => Some(Arc::new(GrpcBillingClient::connect_lazy(
            endpoint,
            config.provisioning_timeout,
        )?)),
        None => None,
    };
    let provisioner: Arc<dyn AccountProvisioner> = match &billing_client {
        Some(client) => client.clone(),
        None => {
            tracing::warn!("REGISTRY_BILLING_ENDPOINT not set, using in-process billing service");
            Arc::new(BillingAccountService::new())
        }
    };

    // === 4. Event publisher (with circuit breaker) ===
    let redpanda = RedpandaClient::new(&config.kafka_brokers, config.publish_timeout)?;
    let publisher = Arc::new(KafkaEventPublisher::new(redpanda, config.events_topic.clone()));

    let lifecycle = SubjectLifecycle::new(store, provisioner, publisher.clone())
        .with_timeouts(LifecycleTimeouts {
            provisioning: config.provisioning_timeout,
            publish: config.publish_timeout,
        })
        .with_metrics(metrics.clone());

    // === 5. Downstream consumer ===
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dlq = Arc::new(DeadLetterQueue::new(config.dlq_capacity));
    let tolerant = Arc::new(
        TolerantEventConsumer::new(LoggingEventHandler, dlq.clone()).with_metrics(metrics.clone()),
    );
    let kafka_consumer = build_stream_consumer(
        &config.kafka_brokers,
        &config.consumer_group,
        &config.events_topic,
    )?;
    let consumer_task = tokio::spawn(run_kafka_consumer(kafka_consumer, tolerant, shutdown_rx.clone()));

    // === 6. Circuit breaker gauges ===
    let sampler_metrics = metrics.clone();
    let sampler_publisher = publisher.clone();
    let sampler_billing = billing_client.clone();
    let mut sampler_shutdown = shutdown_rx;
    let sampler_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let state = sampler_publisher.client().circuit_state();
                    sampler_metrics.update_circuit_breaker_state("redpanda", state.as_gauge());
                    if let Some(billing) = &sampler_billing {
                        let state = billing.circuit_state();
                        sampler_metrics.update_circuit_breaker_state("billing", state.as_gauge());
                    }
                }
                _ = sampler_shutdown.changed() => break,
            }
        }
    });

    // === 7. Demonstrate the subject lifecycle ===
    tracing::info!("Demonstrating subject lifecycle");

    let dob = NaiveDate::from_ymd_opt(1990, 1, 15).ok_or_else(|| anyhow::anyhow!("invalid demo date"))?;
    let profile = SubjectProfile::new("John Doe", "john.doe@example.com", dob, "123 Main St")?;

    match lifecycle.create(profile.clone()).await {
        Ok(subject) => {
            tracing::info!(subject_id = %subject.id, "Subject created");

            let moved = subject.profile().with_postal_address("456 Oak Ave");
            let updated = lifecycle.update(subject.id, moved).await?;
            tracing::info!(subject_id = %updated.id, postal_address = %updated.postal_address, "Subject updated");

            if let Err(e) = lifecycle.create(profile).await {
                tracing::info!(error = %e, "Second registration with the same address rejected");
            }

            let all = lifecycle.list().await?;
            tracing::info!(count = all.len(), "Registered subjects");

            lifecycle.delete(subject.id).await?;
            tracing::info!(subject_id = %subject.id, "Subject deleted");
        }
        Err(e) => tracing::error!(error = %e, kind = e.kind(), "Demo registration failed"),
    }

    // === 8. Demonstrate authentication ===
    let verifier = Sha256PasswordVerifier;
    let users = InMemoryUserDirectory::new();
    users
        .insert(User {
            email: "admin@example.com".to_string(),
            password_hash: verifier.encode("password123", "registry"),
            role: "ADMIN".to_string(),
        })
        .await;
    let ttl = chrono::Duration::from_std(config.token_ttl)?;
    let auth = AuthService::new(
        Arc::new(users),
        Arc::new(verifier),
        Arc::new(JwtTokenIssuer::new(config.jwt_secret.as_bytes(), ttl)),
    );
    let login = LoginRequest {
        email: "admin@example.com".to_string(),
        password: "password123".to_string(),
    };
    match auth.authenticate(&login).await? {
        Some(token) => tracing::info!(valid = auth.validate_token(&token), "Issued access token"),
        None => tracing::warn!("Demo login rejected"),
    }

    // === 9. Run until interrupted ===
    tracing::info!("Subject registry running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    if let Err(e) = shutdown_tx.send(true) {
        tracing::debug!(error = %e, "Shutdown signal had no receivers");
    }

    let stats = consumer_task.await?;
    sampler_task.await?;
    let dlq_stats = dlq.stats().await;
    tracing::info!(
        received = stats.received,
        handled = stats.handled,
        skipped = stats.skipped,
        dead_letters = dlq_stats.retained,
        "Consumer stopped"
    );

    Ok(())
}
