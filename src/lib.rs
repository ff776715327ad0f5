//! framewatch: HTTP/1.1 message framing for passive inspection
//!
//! After a header section has been tokenized, decides what follows on the
//! wire for that direction of the flow (a new message, a fixed-length body,
//! a chunked body, or nothing because the stream is aborted or closed) and
//! how the section is handed to detection.
//!
//! - [`protocols::http`]: section model, framing classifier, detection
//!   decision and the per-flow inspector pipeline
//! - [`flow`]: stream dispatcher, session trackers and peg counters
//! - [`core`]: packet model and frame decoding
//! - [`config`]: TOML configuration

pub mod config;
pub mod core;
pub mod error;
pub mod flow;
pub mod protocols;

pub use config::Config;
pub use error::{FramewatchError, Result};
pub use flow::{Dispatch, StatsRegistry, StreamDispatcher};
pub use protocols::http::{HeaderSection, HttpFlowData, HttpInspector, SectionOutcome};
