//! Client-side runtime for the Spindle controller.
//!
//! Two independent pieces, both consumed by whatever presentation layer
//! sits on top:
//!
//! - [`StateSync`] keeps one logical websocket connection to the
//!   controller and maintains the mirrored machine state by merging
//!   incremental deltas, detecting controller restarts along the way.
//! - [`ResourceScope`] / [`Program`] materialize derived program
//!   resources (source text, toolpath, sample buffers) as memoized,
//!   deduplicated asynchronous loads.

mod api;
mod config;
mod loader;
mod program;
mod sync;

pub use api::{ControllerApi, HttpApi};
pub use config::SyncConfig;
pub use loader::{LoadError, ResourceScope};
pub use program::{Program, ProgramValue, ToolpathView};
pub use sync::{StateSync, SyncEvent};

pub use spindle_core::{ConnectionState, ResyncAction};
