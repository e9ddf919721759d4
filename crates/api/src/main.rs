//! API server entry point.

use std::sync::Arc;

use api::{AppState, Config};
use domain::{MerchantDirectory, SettingsProvider};
use lifecycle_log::{InMemoryLifecycleStore, LifecycleStore, PostgresLifecycleStore};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
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

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let settings: Arc<dyn SettingsProvider> =
        Arc::new(config.load_settings().expect("failed to load pricing config"));
    let directory: Arc<dyn MerchantDirectory> =
        Arc::new(config.load_directory().expect("failed to load merchant directory"));

    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresLifecycleStore::new(pool);
            store.run_migrations().await.expect("migrations failed");
            tracing::info!("using PostgreSQL lifecycle store");
            serve(store, settings, directory, &config, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory lifecycle store");
            let store = InMemoryLifecycleStore::new();
            serve(store, settings, directory, &config, metrics_handle).await;
        }
    }
}

async fn serve<S: LifecycleStore + Clone + 'static>(
    store: S,
    settings: Arc<dyn SettingsProvider>,
    directory: Arc<dyn MerchantDirectory>,
    config: &Config,
    metrics_handle: PrometheusHandle,
) {
    let state = Arc::new(AppState::new(store, settings, directory, config));

    // Replay existing events into the read models before taking traffic
    state.refresh_views().await.expect("catch-up failed");

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(
        %addr,
        claim_retry_limit = config.claim_retry_limit,
        max_delivery_distance_km = %config.max_delivery_distance_km,
        "starting API server"
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
