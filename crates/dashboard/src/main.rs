mod actions;
mod chart;
mod config;
mod series;
mod session;
mod view;
mod web;

use anyhow::Result;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use session::{SessionSettings, SessionStore};

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config file ─────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::load_or_default(&config_path)?;

    let port: u16 = env::var("WEB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(cfg.web.port);

    info!(
        hours = cfg.series.hours,
        interval_min = cfg.series.interval_min,
        samples = series::sample_count(cfg.series.hours, cfg.series.interval_min),
        seeded = cfg.series.seed.is_some(),
        idle_timeout_min = cfg.session.idle_timeout_min,
        "dashboard configured"
    );
    warn!("automatic mode, threshold and schedule are display-only; nothing evaluates them");

    // ── Sessions (ephemeral, per browser) ───────────────────────────
    let store = SessionStore::new(SessionSettings::from_config(&cfg));

    // ── Web server ──────────────────────────────────────────────────
    web::serve(store, port).await
}
