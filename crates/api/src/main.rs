//! Order service entry point.

use api::config::{Config, LogFormat};
use messaging::{InMemoryQueue, PgQueueClient, QueueClient};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Runs the HTTP server and the inbound queue consumer until shutdown.
async fn serve<Q: QueueClient + Clone + 'static>(
    config: Config,
    queue: Q,
    metrics_handle: PrometheusHandle,
) {
    let state = api::create_default_state(queue.clone(), &config);
    let consumer = api::create_consumer(&state, queue, &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_task = tokio::spawn(async move { consumer.run(shutdown_rx).await });

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, inbound_queue = %config.inbound_queue_url, "starting order service");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    if let Err(e) = consumer_task.await {
        tracing::error!(error = %e, "queue consumer task failed");
    }

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the queue transport and run
    let settings = config.queue_settings();
    match config.database_url.clone() {
        Some(database_url) => {
            let queue = PgQueueClient::connect(&database_url, settings)
                .await
                .expect("failed to connect to database");
            queue
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL queue");
            if let Some(warning) = config.order_store_warning() {
                tracing::warn!("{warning}");
            }
            serve(config, queue, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory queue");
            serve(config, InMemoryQueue::with_settings(settings), metrics_handle).await;
        }
    }
}
