//! Loyalty core service.
//!
//! Wires the stores, ledger, reward handlers and background tasks from
//! configuration, serves the budget and issuance APIs and coordinates
//! graceful shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use loyalty_core::adapters::http::{
    budget_router, issuance_router, BudgetAppState, IssuanceAppState,
};
use loyalty_core::adapters::{
    CircuitBreakerRegistry, CompositeAlertSink, ConnectorRegistry, EventAlertSink,
    HttpVoucherConnector, HttpWebhookSender, InMemoryRewardsStore, InMemoryWebhookStore,
    PostgresRewardsStore, PostgresWebhookStore, TracingAlertSink,
};
use loyalty_core::application::background::spawn;
use loyalty_core::application::{
    BudgetLedger, ExpirySweeper, HandlerRegistry, IssuanceService, WebhookDispatcher,
};
use loyalty_core::config::{AppConfig, DatabaseConfig, ServerConfig};
use loyalty_core::ports::{EventSink, RewardsStore, WebhookStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load_validated().context("Failed to load configuration")?;
    init_tracing(&config.server)?;

    info!(
        environment = ?config.server.environment,
        persistent = config.database.url.is_some(),
        suppliers = config.rewards.suppliers.len(),
        "Starting loyalty core"
    );

    let (rewards_store, webhook_store) = create_stores(&config.database).await?;

    // Resilience
    let breakers = Arc::new(CircuitBreakerRegistry::new(
        config.resilience.circuit_breaker.to_breaker_config(),
    ));
    let retry = config.resilience.retry.to_policy();

    // Webhooks
    let sender = Arc::new(
        HttpWebhookSender::new(config.webhooks.request_timeout())
            .context("Failed to build webhook HTTP client")?,
    );
    let dispatcher = Arc::new(WebhookDispatcher::start(
        config.webhooks.dispatcher_settings(&retry),
        webhook_store,
        sender.clone(),
        breakers.clone(),
    ));
    let events: Arc<dyn EventSink> = dispatcher.clone();

    // Ledger
    let alerts = CompositeAlertSink::new()
        .with(Arc::new(TracingAlertSink))
        .with(Arc::new(EventAlertSink::new(events.clone())));
    let ledger = Arc::new(BudgetLedger::new(
        rewards_store.clone(),
        Arc::new(alerts),
        config.ledger.alert_thresholds(),
    ));

    // Reward handlers
    let connectors = Arc::new(ConnectorRegistry::new(breakers.clone()));
    for (name, supplier) in &config.rewards.suppliers {
        let connector = HttpVoucherConnector::new(supplier.connector_config())
            .with_context(|| format!("Failed to build connector for supplier {}", name))?;
        connectors.register(name.clone(), Arc::new(connector));
    }
    let handlers = Arc::new(HandlerRegistry::standard(
        config.rewards.handler_defaults(),
        connectors.clone(),
        sender,
        retry,
    ));
    let issuance = Arc::new(
        IssuanceService::new(rewards_store.clone(), ledger.clone(), handlers.clone())
            .with_events(events.clone()),
    );
    info!(
        handlers = handlers.len(),
        connectors = ?connectors.names(),
        "Issuance service ready"
    );

    // Background tasks
    let cancel = CancellationToken::new();
    let sweeper_handle = if config.sweeper.enabled {
        let sweeper = ExpirySweeper::new(
            rewards_store.clone(),
            ledger.clone(),
            config.sweeper.settings(),
        )
        .with_events(events.clone());
        Some(spawn(Arc::new(sweeper), cancel.child_token()))
    } else {
        warn!("Expiry sweeper disabled");
        None
    };

    // HTTP
    let app = budget_router(BudgetAppState::new(ledger))
        .merge(issuance_router(IssuanceAppState::new(
            issuance,
            cancel.child_token(),
        )))
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(TraceLayer::new_for_http());
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Loyalty API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    info!("Shutdown signal received, stopping background tasks");
    cancel.cancel();
    if let Some(handle) = sweeper_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "Expiry sweeper ended abnormally");
        }
    }

    match dispatcher.shutdown(config.server.shutdown_timeout()).await {
        Ok(stats) => info!(
            delivered = stats.delivered,
            failed = stats.failed,
            dropped = stats.dropped,
            "Webhook dispatcher drained"
        ),
        Err(e) => error!(error = %e, "Webhook dispatcher did not drain in time"),
    }

    info!("Loyalty core shutdown complete");
    Ok(())
}

/// JSON lines outside development, human-readable otherwise.
fn init_tracing(server: &ServerConfig) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&server.log_level))
        .context("Invalid log filter")?;

    let registry = tracing_subscriber::registry().with(filter);
    if server.json_logs() {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .context("Failed to install tracing subscriber")?;
    } else {
        registry
            .with(fmt::layer().with_target(true))
            .try_init()
            .context("Failed to install tracing subscriber")?;
    }
    Ok(())
}

/// Postgres stores when a URL is configured, in-memory otherwise.
async fn create_stores(
    database: &DatabaseConfig,
) -> Result<(Arc<dyn RewardsStore>, Arc<dyn WebhookStore>)> {
    let Some(url) = &database.url else {
        warn!("No database URL configured, using in-memory stores");
        return Ok((
            Arc::new(InMemoryRewardsStore::new()),
            Arc::new(InMemoryWebhookStore::new()),
        ));
    };

    let pool = PgPoolOptions::new()
        .min_connections(database.min_connections)
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout())
        .idle_timeout(database.idle_timeout())
        .connect(url)
        .await
        .context("Failed to create database connection pool")?;
    info!("Database connection pool established");

    if database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed");
    }

    Ok((
        Arc::new(PostgresRewardsStore::new(pool.clone())),
        Arc::new(PostgresWebhookStore::new(pool)),
    ))
}

/// Waits for CTRL+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received CTRL+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}
