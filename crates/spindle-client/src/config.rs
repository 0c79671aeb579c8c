//! Client configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for one [`StateSync`](crate::StateSync) connection scope.
///
/// Deserializable so an embedding application can load it from its own
/// config file format.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Websocket endpoint, e.g. `ws://carve.local/sockjs`.
    pub endpoint: String,
    /// Delay between reconnect attempts in milliseconds.
    #[serde(default = "default_reconnect_ms")]
    pub reconnect_ms: u64,
    /// Capacity of the event notification channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Whether the embedder detected 3D rendering support. The sync task
    /// may later revoke it, never grant it.
    #[serde(default = "default_viewer3d")]
    pub viewer3d: bool,
}

fn default_reconnect_ms() -> u64 {
    1000
}

fn default_event_capacity() -> usize {
    64
}

fn default_viewer3d() -> bool {
    true
}

impl SyncConfig {
    /// Config for `endpoint` with default pacing.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reconnect_ms: default_reconnect_ms(),
            event_capacity: default_event_capacity(),
            viewer3d: default_viewer3d(),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_ms)
    }

    /// The host part of the endpoint, as the client addresses it.
    pub fn host(&self) -> &str {
        let rest = self
            .endpoint
            .split_once("://")
            .map_or(self.endpoint.as_str(), |(_, rest)| rest);
        let end = rest.find(['/', ':']).unwrap_or(rest.len());
        &rest[..end]
    }
}
