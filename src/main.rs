use cms_undo::{
    config::ServiceConfig,
    core::store::UndoStore,
    http::{self, AppState},
    persist::sqlite::SqliteBackend,
    runtime::handle::spawn_undo_service,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cms_undo=debug,tower_http=info".into()),
        )
        .with(fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;
    tracing::info!(
        database = %config.database_path.display(),
        session_lifetime_minutes = config.session_lifetime.num_minutes(),
        "starting undo service"
    );

    let store = UndoStore::new(config.diff_engine()?).with_session_lifetime(config.session_lifetime);
    let backend = SqliteBackend::open(&config.database_path)?;
    let undo = spawn_undo_service(store, Box::new(backend), config.runtime_config());

    let app = http::router(AppState::new(undo.clone()));
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    undo.shutdown().await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
