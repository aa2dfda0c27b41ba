use anyhow::Context;
use library_lending::{
    adapters::{
        clock::SystemClock,
        memory::{InMemoryDocumentStore, InMemorySequenceSource},
        mock::BookAvailability as MockBookAvailability,
        postgres::{PostgresDocumentStore, PostgresSequenceSource},
    },
    api::{handlers::AppState, router::create_router},
    application::lending::ServiceDependencies,
    config::AppConfig,
    ports::{DocumentStore, SequenceSource},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Storage adapters: PostgreSQL when a database URL is configured, in-memory otherwise
    let (store, sequences): (Arc<dyn DocumentStore>, Arc<dyn SequenceSource>) =
        match &config.database.url {
            Some(database_url) => {
                tracing::info!("Connecting to PostgreSQL");

                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(config.database.max_connections)
                    .connect(database_url)
                    .await
                    .context("Failed to connect to database")?;

                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("Failed to run migrations")?;

                (
                    Arc::new(PostgresDocumentStore::new(pool.clone())),
                    Arc::new(PostgresSequenceSource::new(pool)),
                )
            }
            None => {
                tracing::warn!("No database URL configured, using in-memory storage");
                (
                    Arc::new(InMemoryDocumentStore::new()),
                    Arc::new(InMemorySequenceSource::new()),
                )
            }
        };

    let books = Arc::new(MockBookAvailability::with_default_copies(
        config.books.default_copies,
    ));

    // Create service dependencies
    let service_deps = ServiceDependencies::new(
        store,
        sequences,
        books,
        Arc::new(SystemClock),
        config.lending,
    );

    // Create application state
    let app_state = Arc::new(AppState { service_deps });

    // Create router
    let app = create_router(app_state);

    // Server configuration
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
