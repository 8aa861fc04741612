mod collectors;
mod config;
mod http;
mod platform;
mod probe;
mod types;

use axum::serve;
use clap::Parser;
use collectors::SystemMonitor;
use config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sysmond")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "./config.yaml")]
    config: String,
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match Config::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!(error = %err, "failed to load config, using defaults");
            Config::default()
        }
    };

    info!(
        listen = %cfg.listen,
        probe_timeout_ms = cfg.probe_timeout_ms,
        "starting sysmond"
    );

    let plan = platform::plan_for_host(Duration::from_millis(cfg.probe_timeout_ms));
    let monitor = Arc::new(SystemMonitor::new(plan));
    let app = http::build_router(monitor);

    let addr: SocketAddr = match cfg.listen.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, listen = %cfg.listen, "invalid listen address");
            std::process::exit(1);
        }
    };

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, "failed to start HTTP server");
            std::process::exit(1);
        }
    };

    let server = serve(listener, app).with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to wait for Ctrl+C");
        }
        info!("received Ctrl+C, shutting down");
    });

    if let Err(err) = server.await {
        error!(error = %err, "HTTP server error");
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
