//! Application protocol inspectors
//!
//! Inspectors consume sections cut by stream reassembly and report
//! [`ProtocolAlert`]s alongside their framing decisions.

pub mod alerts;
pub mod http;

pub use alerts::ProtocolAlert;
