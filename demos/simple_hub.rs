//! Simple fan-out hub
//!
//! Run with: cargo run --example simple_hub [BIND_ADDR]
//!
//! Every line written to stdin is parsed as JSON and pushed to all connected
//! WebSocket clients on `/events`. Lines that are not valid JSON are skipped.
//!
//! Examples:
//!   ALLOWED_ORIGINS='*' cargo run --example simple_hub
//!   ALLOWED_ORIGINS=https://app.example cargo run --example simple_hub 127.0.0.1:9000
//!
//! ## Subscribing
//!
//! With websocat:
//!   websocat -H 'Origin: https://app.example' ws://localhost:8080/events
//!
//! ## Environment
//!
//! - `ALLOWED_ORIGINS`     comma-separated origins, or `*` to allow all
//! - `LISTEN_ADDR`         bind address (default 0.0.0.0:8080)
//! - `MAILBOX_CAPACITY`    frames a client may lag behind before it is dropped
//! - `MAX_CONNECTIONS`     0 for unlimited
//! - `SHUTDOWN_GRACE_SECS` seconds to wait for connections on shutdown

use fanout_hub::server::config::parse_bind_addr;
use fanout_hub::{HubServer, ServerConfig};
use tokio::io::{AsyncBufReadExt, BufReader};

fn print_usage() {
    eprintln!("Usage: simple_hub [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: $LISTEN_ADDR or 0.0.0.0:8080)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fanout_hub=info".parse()?)
                .add_directive("simple_hub=debug".parse()?),
        )
        .init();

    let mut config = ServerConfig::from_env()?;
    if let Some(addr) = args.get(1) {
        config = config.bind(parse_bind_addr(addr)?);
    }

    let server = HubServer::new(config);
    let ingress = server.ingress();

    // Upstream stand-in: one JSON event per stdin line
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match serde_json::from_str::<serde_json::Value>(&line) {
                    Ok(event) => {
                        if ingress.on_domain_event(&event).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Skipping malformed upstream event"),
                },
                Ok(None) => {
                    tracing::info!("Upstream closed, still serving subscribers");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Upstream read failed");
                    break;
                }
            }
        }
    });

    let stats = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!(
        registered = stats.total_registered,
        broadcasts = stats.broadcasts,
        dropped_slow = stats.dropped_slow,
        "Shut down"
    );

    Ok(())
}
