use std::env;
use std::time::Duration;

use anyhow::Result;
use ayurwell_api::{build_router, build_state, ApiConfig};
use ayurwell_observability::init_tracing;
use tracing::{info, warn};

const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("ayurwell_api");

    let bind = env::var("AYURWELL_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let state = build_state(ApiConfig::from_env()).await?;

    let housekeeping = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            ticker.tick().await;
            housekeeping.prune_rate_limits();
            match housekeeping.service.purge_expired_sessions().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "expired sessions purged"),
                Err(err) => warn!(error = %err, "session purge failed"),
            }
        }
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(bind = %bind, "ayurwell api started");

    axum::serve(listener, app).await?;
    Ok(())
}
