pub mod dashboard;
pub mod views;

use std::path::Path;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use chrono_tz::Tz;
use tokio::net::TcpListener;
use tracing::info;

use crate::commands;
use crate::models::Config;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) client: crate::client::ApiClient,
    pub(crate) tz: Tz,
}

/// Read-only calendar dashboard for the logged-in lecturer. Every page
/// load re-fetches windows, blocked intervals and reservations, so the
/// view is as fresh as the backend allows without any client-side cache.
pub async fn serve(config: Config, config_path: &Path, addr: &str) -> Result<()> {
    let tz = config.tz()?;
    let client = commands::client_with_session(&config, config_path)?;

    let state = AppState { client, tz };

    let app = Router::new()
        .route("/", get(dashboard::dashboard_handler))
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Dashboard listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
