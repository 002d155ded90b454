use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use amend_core::attributes::AttributeDictionary;
use amend_core::engine::ChangeEngine;
use amend_db::{PgChangeStore, PgEmployeeStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amend_api::config::ServerConfig;
use amend_api::router::build_app_router;
use amend_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "amend_api=debug,amend_core=debug,amend_db=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        max_batch_size = config.max_batch_size,
        entity_store_timeout_secs = config.entity_store_timeout_secs,
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = amend_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    amend_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    amend_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Engine ---
    let dictionary = Arc::new(AttributeDictionary::employee_defaults());
    let changes = Arc::new(PgChangeStore::new(pool.clone()));
    let employees = Arc::new(PgEmployeeStore::new(pool, Arc::clone(&dictionary)));
    let engine = ChangeEngine::new(
        changes.clone(),
        changes,
        employees,
        dictionary,
        config.engine_config(),
    );
    tracing::info!(
        attributes = engine.dictionary().len(),
        "Change engine ready"
    );

    // --- App state ---
    let state = AppState {
        engine: Arc::new(engine),
        config: Arc::new(config.clone()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Duration::from_secs(
            config.shutdown_timeout_secs,
        )))
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix). In-flight requests get
/// `drain` to finish; after that the process exits regardless.
async fn shutdown_signal(drain: Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }

    tokio::spawn(async move {
        tokio::time::sleep(drain).await;
        tracing::warn!(
            drain_secs = drain.as_secs(),
            "In-flight requests did not drain in time, exiting"
        );
        std::process::exit(1);
    });
}
