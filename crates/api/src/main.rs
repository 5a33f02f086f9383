//! API server entry point.

use api::Backends;
use api::config::Config;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use storage::{
    CounterStore, InMemoryCache, InMemoryDurableStore, ObjectCache, PostgresDurableStore,
    RedisCounterStore,
};
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

/// Picks the durable store and builds the router over `counters`.
async fn build_app<C>(
    config: &Config,
    counters: C,
    counter_backend: &'static str,
    metrics_handle: PrometheusHandle,
) -> Router
where
    C: CounterStore + ObjectCache + Clone + 'static,
{
    let policy = config.policy();
    match &config.database_url {
        Some(url) => {
            let store = PostgresDurableStore::connect(url, config.database_max_connections)
                .await
                .expect("failed to connect to PostgreSQL");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL durable store");
            let backends = Backends {
                durable: "postgres",
                counters: counter_backend,
            };
            api::create_app(
                api::create_state(store, counters, policy, backends),
                metrics_handle,
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory durable store");
            let backends = Backends {
                durable: "memory",
                counters: counter_backend,
            };
            api::create_app(
                api::create_state(InMemoryDurableStore::new(), counters, policy, backends),
                metrics_handle,
            )
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    api::routes::metrics::describe();

    // 3. Create stores and application state
    let app = match &config.redis_url {
        Some(url) => {
            let counters = RedisCounterStore::connect(url)
                .await
                .expect("failed to connect to Redis");
            tracing::info!("using Redis counter store");
            build_app(&config, counters, "redis", metrics_handle).await
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-process counter store");
            build_app(&config, InMemoryCache::new(), "memory", metrics_handle).await
        }
    };

    // 4. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
