//! Core types for the Spindle controller protocol.
//!
//! This crate provides the protocol primitives: connection lifecycle,
//! inbound frame classification, incremental state merging, session
//! tracking and binary buffer decoding. It performs no I/O; the runtime
//! lives in `spindle-client`.

mod buffer;
mod frame;
mod merge;
mod policy;
mod session;

pub use buffer::{BufferError, decode_f32_buffer};
pub use frame::{Frame, FrameError, PollReply, classify};
pub use merge::merge;
pub use policy::viewer3d_allowed;
pub use session::{ResyncAction, SessionTracker};

use serde::{Deserialize, Serialize};

/// Connection lifecycle state.
///
/// Driven only by transport-level open/close events; a failed dial attempt
/// is not a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Establishing connection.
    Connecting,
    /// Transport open, deltas flowing.
    Connected,
    /// Transport closed, waiting to reconnect.
    Disconnected,
}
