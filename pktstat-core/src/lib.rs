//! pktstat core library
//!
//! This crate provides the shared data model and error handling for the
//! pktstat capture pipeline: captured frames, flow keys, records and the
//! per-flow counters that the aggregation stage maintains.

pub mod error;
pub mod flow;
pub mod packet;

// Re-export commonly used types
pub use error::{Error, Result};
pub use flow::{FlowCounters, FlowKey, LayerType, Record};
pub use packet::Frame;
