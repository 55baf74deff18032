//! VueStock Daemon - development backend for the warehouse viewer
//!
//! Serves the rack, level and slot tables in PostgREST form along with the
//! built web frontend, so the viewer can run without a hosted database.

mod api;
mod config;
mod server;
mod state;
mod store;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "vuestock")]
#[command(about = "Local backend and web server for the VueStock 3D warehouse viewer")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "vuestock.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Write a default configuration file and exit
    #[arg(long)]
    init_config: bool,

    /// Open the viewer in the default browser once the server starts
    #[arg(long)]
    open: bool,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Browser URL for a bind address; unspecified hosts become localhost
fn browser_url(bind: &str, https: bool) -> String {
    let scheme = if https { "https" } else { "http" };
    let port = bind.rsplit_once(':').map(|(_, port)| port).unwrap_or("80");
    format!("{}://localhost:{}/", scheme, port)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&args.log_level))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("VueStock v{}", env!("CARGO_PKG_VERSION"));

    if args.init_config {
        config::write_default_config(&args.config)?;
        println!("Wrote {}", args.config.display());
        return Ok(());
    }

    let mut config = config::load_config(&args.config)?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    info!(
        seed = %config.backend.seed_path,
        web_root = %config.server.web_root,
        "Configuration loaded"
    );

    let state = state::AppState::new(config.clone())?;

    if args.open {
        let url = browser_url(&config.server.bind, config.server.tls.is_some());
        tokio::spawn(async move {
            // Give the listener a moment to come up
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            if let Err(e) = open::that(&url) {
                warn!(url = %url, error = %e, "Failed to open browser");
            }
        });
    }

    server::run(state, &config.server.bind, config.server.tls.as_ref()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_url() {
        assert_eq!(browser_url("0.0.0.0:8080", false), "http://localhost:8080/");
        assert_eq!(browser_url("[::]:8443", true), "https://localhost:8443/");
    }

    #[test]
    fn test_parse_level_falls_back_to_info() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }
}
