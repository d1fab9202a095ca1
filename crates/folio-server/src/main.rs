use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use folio_core::store::StatsStore;
use folio_server::state::AppState;

/// `folio health`: liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$FOLIO_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("FOLIO_PORT").unwrap_or_else(|_| "8000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }
    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("folio=info".parse()?)
                .add_directive("folio_server=info".parse()?)
                .add_directive("folio_duckdb=info".parse()?),
        )
        .json()
        .init();

    let cfg = folio_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/folio.db", cfg.data_dir);

    // Opening initialises tables and views.
    let db = folio_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    let store: Arc<dyn StatsStore> = Arc::new(db);
    let state = Arc::new(AppState::new(store, cfg.clone()));

    // Spawn background retention cleanup (visits/events older than retention_days).
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.run_retention_loop().await;
        });
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = folio_server::app::build_app(Arc::clone(&state));

    info!(
        port = cfg.port,
        environment = cfg.environment.as_str(),
        retention_days = cfg.retention_days,
        request_logging = cfg.request_logging,
        metrics = cfg.enable_metrics,
        "Folio API listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    // Peer addresses back the client IP when no proxy header is present.
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    info!("Folio API shut down");
    Ok(())
}
