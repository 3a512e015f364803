//! Tunewave worker: runs the outbox relay and the song-action consumer.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tunewave::adapters::broker::{RedisStreamPublisher, RedisStreamSource};
use tunewave::adapters::postgres::{PostgresLikedTrackStore, PostgresOutboxRepository};
use tunewave::adapters::{IdempotentConsumer, OutboxRelay};
use tunewave::config::{AppConfig, ServerConfig};
use tunewave::domain::foundation::DomainError;

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load_validated().context("Failed to load configuration")?;
    init_tracing(&config.server);

    tracing::info!(
        environment = ?config.server.environment,
        instance = %config.server.instance_id,
        "Starting tunewave worker"
    );

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        tracing::info!("Migrations complete");
    }

    let redis = redis::Client::open(config.redis.url.as_str()).context("Invalid Redis URL")?;
    let redis_conn = tokio::time::timeout(
        config.redis.timeout(),
        redis.get_multiplexed_async_connection(),
    )
    .await
    .context("Timed out connecting to Redis")?
    .context("Failed to connect to Redis")?;
    tracing::info!("Redis connected");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: JoinSet<(&'static str, Result<(), DomainError>)> = JoinSet::new();

    if config.relay.enabled {
        let relay = OutboxRelay::with_config(
            Arc::new(PostgresOutboxRepository::new(pool.clone())),
            Arc::new(RedisStreamPublisher::new(redis_conn.clone())),
            config.relay.to_relay_config(),
        );
        let shutdown = shutdown_rx.clone();
        tasks.spawn(async move { ("outbox relay", relay.run(shutdown).await) });
    }

    if config.consumer.enabled {
        let source = RedisStreamSource::connect(
            redis_conn.clone(),
            config.consumer.to_source_config(&config.server.instance_id),
        )
        .await
        .context("Failed to join consumer group")?;
        let consumer = IdempotentConsumer::with_config(
            Arc::new(source),
            Arc::new(PostgresLikedTrackStore::new(pool.clone())),
            config.consumer.to_consumer_config(),
        );
        let shutdown = shutdown_rx.clone();
        tasks.spawn(async move { ("song-action consumer", consumer.run(shutdown).await) });
    }

    let mut failed = false;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown requested");
        }
        Some(joined) = tasks.join_next() => {
            failed |= report_exit(joined);
        }
    }

    // Loops finish the work in hand before returning.
    let _ = shutdown_tx.send(true);
    while let Some(joined) = tasks.join_next().await {
        failed |= report_exit(joined);
    }

    pool.close().await;

    if failed {
        anyhow::bail!("A pipeline loop stopped with a fatal error");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Logs how a loop ended. Returns true if it ended in error.
fn report_exit(
    joined: Result<(&'static str, Result<(), DomainError>), tokio::task::JoinError>,
) -> bool {
    match joined {
        Ok((name, Ok(()))) => {
            tracing::info!(task = name, "Loop stopped");
            false
        }
        Ok((name, Err(e))) => {
            tracing::error!(task = name, error = %e, "Loop stopped with fatal error");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Loop task panicked or was cancelled");
            true
        }
    }
}
