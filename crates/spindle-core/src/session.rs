//! Controller session tracking.
//!
//! The controller stamps its messages with an opaque session identifier.
//! The first value seen is adopted without validation; a different value
//! later proves the controller process restarted and rebuilt its soft
//! state without us, and the only safe recovery is to start over.

use serde::{Deserialize, Serialize};

/// What the embedding application must do to recover from a controller
/// restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResyncAction {
    /// Re-address the panel at the announced hostname.
    Redirect { hostname: String },
    /// Reload against the current address.
    Reload,
}

/// Tracks the controller session identifier and the hostname announced
/// outside the socket.
#[derive(Debug, Default)]
pub struct SessionTracker {
    sid: Option<String>,
    hostname: Option<String>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the hostname announced on the out-of-band channel.
    pub fn set_hostname(&mut self, hostname: impl Into<String>) {
        self.hostname = Some(hostname.into());
    }

    /// The announced hostname, if any.
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Observe a session identifier from an inbound message.
    ///
    /// The first observation is adopted. A later mismatch returns the
    /// recovery action for `current_host`; the caller must discard the
    /// connection scope and must not merge the rest of that message.
    pub fn observe(&mut self, sid: &str, current_host: &str) -> Option<ResyncAction> {
        match &self.sid {
            None => {
                self.sid = Some(sid.to_string());
                None
            }
            Some(known) if known == sid => None,
            Some(_) => Some(self.resync_action(current_host)),
        }
    }

    /// Redirect to the announced hostname unless the client addresses a
    /// local host; otherwise a plain reload.
    fn resync_action(&self, current_host: &str) -> ResyncAction {
        match &self.hostname {
            Some(hostname) if current_host != "localhost" => ResyncAction::Redirect {
                hostname: hostname.clone(),
            },
            _ => ResyncAction::Reload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sid_is_adopted() {
        let mut tracker = SessionTracker::new();
        assert_eq!(tracker.observe("a", "carve.local"), None);
        assert_eq!(tracker.observe("a", "carve.local"), None);
    }

    #[test]
    fn mismatch_with_hostname_redirects() {
        let mut tracker = SessionTracker::new();
        tracker.set_hostname("carve.local");
        assert_eq!(tracker.observe("a", "192.168.1.20"), None);
        assert_eq!(
            tracker.observe("b", "192.168.1.20"),
            Some(ResyncAction::Redirect {
                hostname: "carve.local".into()
            })
        );
    }

    #[test]
    fn mismatch_without_hostname_reloads() {
        let mut tracker = SessionTracker::new();
        tracker.observe("a", "192.168.1.20");
        assert_eq!(
            tracker.observe("b", "192.168.1.20"),
            Some(ResyncAction::Reload)
        );
    }

    #[test]
    fn mismatch_on_localhost_reloads_even_with_hostname() {
        let mut tracker = SessionTracker::new();
        tracker.set_hostname("carve.local");
        tracker.observe("a", "localhost");
        assert_eq!(tracker.observe("b", "localhost"), Some(ResyncAction::Reload));
    }
}
