use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;

use pizza_restaurant_service::api::{self, AppState};

use super::DatabaseArgs;

pub async fn main(database: &DatabaseArgs, bind: SocketAddr) -> anyhow::Result<()> {
    let store = database.connect()?;
    let app = api::router(AppState { store });

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("Pizza restaurants API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
