mod cli;
mod config;
mod engine;
mod filter;
mod relay;
mod session;
mod signaling;

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::cli::Cli;
use crate::config::Config;
use crate::filter::RelayGate;
use crate::relay::RelayService;
use crate::signaling::AppContext;

#[tokio::main]
async fn main() {
    // Default to INFO level if RUST_LOG is not set
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = cli.apply(Config::from_env());

    if !config.relay_ports.is_valid() {
        error!(
            port_min = config.relay_ports.min,
            port_max = config.relay_ports.max,
            "relay port window is inverted"
        );
        std::process::exit(1);
    }

    info!(
        http_port = config.http_port,
        mux_port = config.mux_port,
        turn_port = config.turn_port,
        relay_ip = %config.relay_ip,
        port_min = config.relay_ports.min,
        port_max = config.relay_ports.max,
        realm = %config.realm,
        "starting turnstile"
    );

    // Refuse to serve signaling without the relay: handshakes would succeed
    // while media could never connect.
    let _relay = match RelayService::spawn(&config).await {
        Ok(relay) => relay,
        Err(err) => {
            error!(error = %err, "failed to start TURN relay");
            std::process::exit(1);
        }
    };

    let mux_socket = match engine::bind_mux(config.mux_port).await {
        Ok(socket) => socket,
        Err(err) => {
            error!(error = %err, port = config.mux_port, "failed to bind ICE mux socket");
            std::process::exit(1);
        }
    };

    // The gate must wrap the socket before the mux ever reads from it.
    let gate = RelayGate::new(Arc::new(mux_socket), config.relay_ports);
    let api = match engine::build_api(gate) {
        Ok(api) => api,
        Err(err) => {
            error!(error = %err, "failed to build webrtc engine");
            std::process::exit(1);
        }
    };

    let ctx = match AppContext::new(api, config.clone()) {
        Ok(ctx) => Arc::new(ctx),
        Err(err) => {
            error!(error = %err, "invalid relay advertisement configuration");
            std::process::exit(1);
        }
    };

    let app = signaling::router(ctx).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, addr = %addr, "failed to bind signaling listener");
            std::process::exit(1);
        }
    };

    info!(addr = %addr, "signaling endpoint listening");

    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "signaling server exited");
        std::process::exit(1);
    }
}
