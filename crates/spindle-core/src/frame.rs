//! Inbound message classification.
//!
//! A single message from the controller can carry several concerns at
//! once: a log entry to forward, a session identifier to check, and state
//! keys to merge. Classification splits one message into an ordered frame
//! sequence so the sync loop never probes fields ad hoc.

use serde_json::{Map, Value};

/// One concern carried by an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Payload of the reserved `log` field, forwarded verbatim.
    Log(Value),
    /// Session identifier asserted by the controller (`sid` field).
    Session(String),
    /// Remaining keys, to be merged into the mirrored state.
    Delta(Map<String, Value>),
}

/// Split an inbound message into ordered frames.
///
/// The order is fixed: log, then session, then delta, so a session
/// mismatch is detected before any key of that message is merged.
/// Non-object messages (heartbeats, scalars) carry nothing and classify
/// to an empty sequence. The `log` field is removed from the delta; the
/// `sid` field stays in it, mirroring the wire behavior of the
/// controller's own panel.
pub fn classify(message: Value) -> Vec<Frame> {
    let Value::Object(mut fields) = message else {
        return Vec::new();
    };

    let mut frames = Vec::new();

    if let Some(log) = fields.remove("log") {
        frames.push(Frame::Log(log));
    }

    match fields.get("sid") {
        Some(Value::String(sid)) => frames.push(Frame::Session(sid.clone())),
        Some(other) => frames.push(Frame::Session(other.to_string())),
        None => {}
    }

    if !fields.is_empty() {
        frames.push(Frame::Delta(fields));
    }

    frames
}

/// Reply to a long-running resource request: either still computing or a
/// terminal payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PollReply<V> {
    /// Server still computing; progress in [0, 1].
    InProgress(f64),
    /// The finished value.
    Complete(V),
}

impl<V> PollReply<V> {
    /// Map the terminal value, leaving progress untouched.
    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> PollReply<U> {
        match self {
            PollReply::InProgress(progress) => PollReply::InProgress(progress),
            PollReply::Complete(value) => PollReply::Complete(f(value)),
        }
    }
}

impl PollReply<Value> {
    /// Classify a raw reply from the controller.
    ///
    /// A reply carrying a numeric `progress` field is a partial answer;
    /// anything else is the finished payload. Progress is clamped to
    /// [0, 1].
    pub fn from_json(reply: Value) -> Result<Self, FrameError> {
        let Value::Object(fields) = &reply else {
            return Err(FrameError::NotAnObject);
        };

        match fields.get("progress").and_then(Value::as_f64) {
            Some(progress) => Ok(PollReply::InProgress(progress.clamp(0.0, 1.0))),
            None => Ok(PollReply::Complete(reply)),
        }
    }
}

/// Error classifying an inbound payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("reply is not a JSON object")]
    NotAnObject,
}
