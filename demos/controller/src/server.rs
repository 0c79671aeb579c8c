//! Websocket side of the simulated controller.

use crate::machine::Machine;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value, json};
use std::net::SocketAddr;
use std::process;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

pub async fn run(addr: SocketAddr, flip_sid_after: Option<u64>) -> anyhow::Result<()> {
    // One session identifier per process, like the real thing.
    let sid = session_id();
    tracing::info!("Session {}", sid);

    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, client_addr) = listener.accept().await?;
        let sid = sid.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_panel(stream, client_addr, sid, flip_sid_after).await {
                tracing::warn!("Panel connection error from {}: {}", client_addr, e);
            }
        });
    }
}

fn session_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{:x}-{:x}", process::id(), now)
}

async fn handle_panel(
    stream: TcpStream,
    addr: SocketAddr,
    mut sid: String,
    flip_sid_after: Option<u64>,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut stream) = ws.split();

    tracing::info!("Panel connected from {}", addr);

    let mut machine = Machine::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(250));

    // Initial full state.
    let snapshot = Value::Object(stamped(machine.snapshot(), &sid));
    sink.send(Message::Text(snapshot.to_string().into())).await?;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if flip_sid_after.is_some_and(|after| machine.tick() == after) {
                    sid = format!("{}-restarted", sid);
                    tracing::info!("Flipping session identifier to {}", sid);
                }

                let mut delta = stamped(machine.advance(), &sid);
                if machine.tick() % 40 == 0 {
                    delta.insert(
                        "log".into(),
                        json!({"level": "info", "msg": format!("tick {}", machine.tick())}),
                    );
                }
                sink.send(Message::Text(Value::Object(delta).to_string().into())).await?;
            }

            incoming = stream.next() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(_)) | None => break,
                };
                if let Message::Text(text) = message {
                    tracing::info!("Panel command: {}", text);
                }
            }
        }
    }

    tracing::info!("Panel disconnected: {}", addr);
    Ok(())
}

fn stamped(mut delta: Map<String, Value>, sid: &str) -> Map<String, Value> {
    delta.insert("sid".into(), json!(sid));
    delta
}
