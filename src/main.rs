//! N3FJP Relay Server - Entry Point
//!
//! TCP relay for the N3FJP logging network protocol.

use clap::Parser;
use log::{error, info};

use n3fjp_relay::Server;
use n3fjp_relay::config::{Overrides, ServerConfig};
use n3fjp_relay::utils::logging::init_logging;

#[derive(Parser)]
#[command(about = "TCP relay for the N3FJP logging network protocol")]
struct Args {
    #[arg(long, help = "Configuration file (defaults to ./config.toml when present)")]
    config: Option<String>,
    #[arg(long, help = "Host to bind")]
    host: Option<String>,
    #[arg(short = 'p', long, help = "Port to listen on")]
    port: Option<u16>,
    #[arg(long, help = "Append raw and decoded traffic to this file")]
    capture: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging();

    let overrides = Overrides {
        bind_address: args.host,
        port: args.port,
        capture_path: args.capture,
    };

    let config = match ServerConfig::load(args.config.as_deref(), overrides) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Launching N3FJP relay...");

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            std::process::exit(1);
        }
    };
    server.start().await;
}
