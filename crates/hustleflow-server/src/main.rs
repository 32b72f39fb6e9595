use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use hustleflow_api::state::{AppState, AppStateInner};
use hustleflow_board::narrative::{HttpNarrator, MatchNarrator};
use hustleflow_board::Repository;
use hustleflow_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hustleflow=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = env_or("HUSTLEFLOW_HOST", "0.0.0.0");
    let port: u16 = env_or("HUSTLEFLOW_PORT", "4000").parse()?;
    let db_path = env_or("HUSTLEFLOW_DB_PATH", "hustleflow.db");
    let currency = env_or("HUSTLEFLOW_CURRENCY", "INR");
    let admin_token = std::env::var("HUSTLEFLOW_ADMIN_TOKEN").ok();
    let match_url = std::env::var("HUSTLEFLOW_MATCH_URL").ok();
    let sweep_secs: u64 = std::env::var("HUSTLEFLOW_SWEEP_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    if admin_token.is_none() {
        warn!("HUSTLEFLOW_ADMIN_TOKEN not set; moderation endpoints are disabled");
    }

    // Init database
    let db = Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let repo = Repository::new(db, currency, admin_token);
    let narrator: Option<Arc<dyn MatchNarrator>> = match_url.map(|url| {
        info!("Advisory match narrator enabled at {}", url);
        Arc::new(HttpNarrator::new(url, Duration::from_secs(10))) as Arc<dyn MatchNarrator>
    });
    let state: AppState = Arc::new(AppStateInner { repo, narrator });

    // Expired, unmatched requests are invisible either way; the sweep just
    // reclaims their rows.
    if sweep_secs > 0 {
        tokio::spawn(run_sweep_loop(state.clone(), sweep_secs));
    }

    let app = hustleflow_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("HustleFlow server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

/// Background task that prunes expired, unmatched requests on an interval.
async fn run_sweep_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let worker = state.clone();
        let result =
            tokio::task::spawn_blocking(move || worker.repo.prune_expired(chrono::Utc::now()))
                .await;

        match result {
            Ok(Ok(count)) if count > 0 => info!("Sweep: pruned {} expired requests", count),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Sweep error: {}", e),
            Err(e) => warn!("Sweep join error: {}", e),
        }
    }
}
