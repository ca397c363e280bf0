//! WhatsApp dispatch gateway - Entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wa_gateway::{
    api::{create_router, AppState},
    config::Config,
    AdmissionGate, IdleSweeper, RecipientThrottle, SessionSupervisor, SupervisorConfig,
};
use wa_session::{BridgeClient, BridgeProvider};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting WhatsApp dispatch gateway");

    // Initialize the session bridge
    let bridge = match BridgeClient::new(&config.session.bridge_url) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create bridge client: {}", e);
            std::process::exit(1);
        }
    };

    if !bridge.health_check().await {
        warn!(
            "Session bridge not reachable at {} - will keep retrying",
            config.session.bridge_url
        );
    }

    let provider = BridgeProvider::new(bridge, config.session.poll_interval);
    let supervisor = SessionSupervisor::new(
        Arc::new(provider),
        SupervisorConfig {
            credential_store: config.session.auth_dir.clone(),
            reconnect_delay: config.session.reconnect_delay,
            retry_delay: config.session.retry_delay,
        },
    );

    // Admission control
    let gate = AdmissionGate::new(
        config.auth.token.clone(),
        config.auth.requests_per_minute(),
    );
    let throttle = RecipientThrottle::new(config.limits.min_gap());

    info!(
        requests_per_minute = config.auth.requests_per_minute(),
        min_gap_secs = config.limits.min_seconds_between_same_number,
        "Admission limits configured"
    );

    let sweeper = IdleSweeper::new(gate.clone(), throttle.clone(), config.limits.sweep_interval).spawn();

    let state = AppState::new(supervisor.clone(), throttle);
    let app = create_router(state, gate);

    // Bind to address
    let ip = match config.server.ip() {
        Ok(ip) => ip,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };
    let addr = SocketAddr::new(ip, config.server.port);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Listening on {}", addr);

    // Bring the session up alongside the HTTP surface
    let booting = supervisor.clone();
    tokio::spawn(async move { booting.start().await });

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Shutting down...");
    supervisor.shutdown();
    sweeper.abort();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
