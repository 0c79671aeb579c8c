//! Terminal panel.
//!
//! Follows a controller's live state and prints every transition, log
//! entry and position update. With `--program` it also loads the
//! program's computed toolpath view over HTTP and reports progress.
//!
//!   cargo run -p spindle-demo-panel -- --host 127.0.0.1:8001
//!   cargo run -p spindle-demo-panel -- --host carve.local --program jobs/part.nc

use std::sync::Arc;
use std::time::Duration;

use spindle_client::{HttpApi, Program, StateSync, SyncConfig, SyncEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("spindle_demo_panel=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let host = parse_arg(&args, "--host").unwrap_or_else(|| "127.0.0.1:8001".to_string());
    let program_path = parse_arg(&args, "--program");

    let sync = StateSync::new(SyncConfig::new(format!("ws://{host}/sockjs")));
    let mut events = sync.subscribe();
    sync.connect();

    if let Some(path) = program_path {
        let api = Arc::new(HttpApi::new(format!("http://{host}/api")));
        tokio::spawn(follow_program(Program::new(api, path)));
    }

    loop {
        match events.recv().await {
            Ok(SyncEvent::Status(status)) => tracing::info!("Connection: {:?}", status),
            Ok(SyncEvent::Log(entry)) => tracing::info!("Controller log: {}", entry),
            Ok(SyncEvent::Updated) => {
                let state = sync.read().await;
                let tick = state.get("tick").and_then(|v| v.as_u64()).unwrap_or(0);
                if tick % 8 == 0 {
                    let xx = state.get("xx").and_then(|v| v.as_str()).unwrap_or("?");
                    let position = state.get("position").cloned().unwrap_or_default();
                    tracing::info!("{} position {}", xx, position);
                }
            }
            Ok(SyncEvent::Resync(action)) => {
                tracing::warn!("Controller restarted; panel must resync: {:?}", action);
                return Ok(());
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!("Fell behind, skipped {} events", missed);
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

/// Load a program's toolpath view, reporting progress along the way.
async fn follow_program(program: Program) {
    let progress = {
        let program = program.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(500)).await;
                tracing::info!(
                    "Toolpath {:.0}% computed",
                    program.progress() * 100.0
                );
            }
        })
    };

    match program.view().await {
        Ok(view) => {
            tracing::info!(
                "Program {} loaded: {} position samples, {} speed samples",
                program.filename(),
                view.positions.len(),
                view.speeds.len()
            );
        }
        Err(e) => tracing::warn!("Program load failed: {}", e),
    }

    progress.abort();
}

fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
