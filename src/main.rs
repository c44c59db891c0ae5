use std::env;

use sip_planner::core::NavHistoryReturns;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw_args: Vec<String> = env::args().collect();
    if raw_args.get(1).map(|s| s.as_str()) == Some("serve") {
        let port = raw_args
            .get(2)
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);
        let nav_history = match raw_args.get(3).map(NavHistoryReturns::from_json_file) {
            Some(Ok(history)) => Some(history),
            Some(Err(e)) => {
                error!(error = %e, "failed to load NAV history");
                std::process::exit(1);
            }
            None => None,
        };
        if let Err(e) = sip_planner::api::run_http_server(port, nav_history).await {
            error!(error = %e, "server error");
            std::process::exit(1);
        }
        return;
    }

    match sip_planner::api::run_cli(raw_args) {
        Ok(report) => println!("{}", report.trim_end()),
        Err(msg) => {
            eprintln!("Error: {msg}");
            eprintln!("Usage: sip-planner [OPTIONS] | sip-planner serve [port] [nav-history.json]");
            std::process::exit(1);
        }
    }
}
