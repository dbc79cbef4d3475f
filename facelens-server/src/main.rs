use anyhow::{Context, Result};
use log::info;

use facelens_server::{AppState, router};
use facelens_store::open_store;
use facelens_utils::config::{AppSettings, default_settings_path};

#[tokio::main]
async fn main() -> Result<()> {
    let settings_path = default_settings_path();
    let settings = if settings_path.exists() {
        AppSettings::load_from_path(&settings_path)?
    } else {
        AppSettings::default()
    };

    facelens_utils::init_logging(log::LevelFilter::Info)?;
    facelens_utils::configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );

    let store = open_store(&settings.server).context("failed to open analysis store")?;

    let state = AppState {
        store,
        default_recent_limit: settings.server.default_recent_limit,
    };

    let listener = tokio::net::TcpListener::bind(&settings.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind_addr))?;
    info!("serving analyses API on {}", settings.server.bind_addr);

    axum::serve(listener, router(state))
        .await
        .context("server terminated unexpectedly")?;

    Ok(())
}
