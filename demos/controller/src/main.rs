//! Simulated controller.
//!
//! Speaks the state protocol over a websocket: presents a session
//! identifier on every message, streams incremental deltas as the
//! simulated machine moves, and emits the occasional log entry.
//!
//! Run it, then point the panel demo at it:
//!   cargo run -p spindle-demo-controller -- --port 8001
//!   cargo run -p spindle-demo-panel -- --host 127.0.0.1:8001
//!
//! Pass `--flip-sid 20` to change the session identifier after 20 ticks
//! and watch a connected panel go through its hard-resync path.

mod machine;
mod server;

use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("spindle_demo_controller=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let port = parse_arg(&args, "--port").unwrap_or(8001);
    let flip_sid = parse_arg(&args, "--flip-sid");

    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    tracing::info!("Simulated controller on ws://{}", addr);

    server::run(addr, flip_sid.map(u64::from)).await
}

fn parse_arg(args: &[String], flag: &str) -> Option<u16> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
