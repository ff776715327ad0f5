//! HTTP message framing
//!
//! Classifies each parsed header section to decide what follows on the wire
//! for that direction of the flow, and how the section is handed to
//! detection.

pub mod detection;
pub mod events;
pub mod framing;
pub mod inspector;
pub mod section;
pub mod state;
pub mod transaction;
pub mod types;

pub use detection::decide;
pub use events::{gen_events, HttpEvent, HTTP_GID};
pub use framing::{classify, Classification, FramingContext, FramingRule};
pub use inspector::{HttpInspector, SectionOutcome};
pub use section::{HeaderField, HeaderSection};
pub use state::{DirectionState, HttpFlowData};
pub use transaction::{HttpTransaction, TransactionQueue, PIPELINE_DEPTH};
pub use types::*;
