// Framework bootstrap for the board server runtime.

use crate::frameworks::config;
use crate::interface_adapters::protocol::JsonPayloadEncoder;
use crate::interface_adapters::routes::app;
use crate::interface_adapters::state::AppState;
use crate::use_cases::{RoomRegistry, RoomSettings};

use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state();
    let app = app(state);

    tracing::info!(%address, "listening");

    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::new(config::http_host(), config::http_port());

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> Arc<AppState> {
    let settings = RoomSettings {
        event_channel_capacity: config::ROOM_EVENT_CHANNEL_CAPACITY,
        broadcast_capacity: config::ROOM_BROADCAST_CAPACITY,
        idle_ttl: config::room_idle_ttl(),
    };
    tracing::debug!(
        idle_ttl_secs = settings.idle_ttl.as_secs(),
        broadcast_capacity = settings.broadcast_capacity,
        "room settings configured"
    );

    // Rooms are created lazily by the first join; the reaper retires empty ones.
    let room_registry = Arc::new(RoomRegistry::new(settings, Arc::new(JsonPayloadEncoder)));
    let _reaper = room_registry
        .clone()
        .spawn_reaper(config::room_reaper_interval());

    Arc::new(AppState { room_registry })
}
