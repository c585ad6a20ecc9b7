//! Vote On It 실시간 투표 서버

mod bus;
mod config;
mod directory;
mod error;
mod handlers;
mod identity;
mod protocol;
mod routes;
mod state;
mod stats;

use anyhow::Context;
use config::Config;
use state::AppState;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 모든 방 상태 변경과 발행은 단일 스레드에서 협력적으로 실행된다
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    for entry in &config.rejected_owner_sessions {
        tracing::warn!(entry = %entry, "Ignoring malformed OWNER_SESSIONS entry");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let heartbeat = config.stream.heartbeat_interval;
    let owner_sessions = config.owner_sessions.len();
    let state = Arc::new(AppState::in_memory(config));

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("🗳️ Vote On It server started");
    tracing::info!("Address: {}", addr);
    tracing::info!(
        heartbeat_secs = heartbeat.as_secs(),
        owner_sessions = owner_sessions,
        "Room event streams: http://{}/api/room/:urlName/events",
        addr
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
