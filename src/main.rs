use std::env;
use std::sync::Arc;

use btc_retirement::api::{AppState, run_cli, run_http_server};
use btc_retirement::config::AppConfig;
use btc_retirement::price::CoinGeckoClient;
use tracing::error;

const USAGE: &str = "Usage:
  btc-retirement serve [port]
  btc-retirement project [--weekly-savings USD] [--goal USD] [--birth-date D/M/YYYY] \
[--years N] [--spot-price USD] [--export-dir DIR]";

#[tokio::main]
async fn main() {
    init_logging();

    let cfg = match AppConfig::load_from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Config error: {e:#}");
            std::process::exit(1);
        }
    };

    let raw_args: Vec<String> = env::args().collect();
    match raw_args.get(1).map(|s| s.as_str()) {
        Some("serve") => {
            let port = raw_args
                .get(2)
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(cfg.server.port);
            let prices = match CoinGeckoClient::new(&cfg.price) {
                Ok(client) => client,
                Err(e) => {
                    error!(error = %e, "failed to build price client");
                    std::process::exit(1);
                }
            };
            let state = AppState::new(Arc::new(prices), cfg.model);
            if let Err(e) = run_http_server(port, state).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Some("project") => {
            if let Err(e) = run_cli(&raw_args[1..], &cfg).await {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("btc_retirement=info"));

    if env::var("BTC_RETIREMENT_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
