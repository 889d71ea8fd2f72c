//! Flow classification and aggregation for pktstat
//!
//! Frames come in as raw bytes, the [`Classifier`] turns each one into a
//! [`FlowKey`](pktstat_core::FlowKey), the [`AggregationSink`] folds the
//! resulting records into a shared [`FlowTable`](table::FlowTableWriter) and
//! the [`Reporter`] periodically logs what the table holds.

pub mod classifier;
pub mod reporter;
pub mod sink;
pub mod table;

pub use classifier::{Classification, Classifier, Layer, LayerSet, Unclassifiable};
pub use reporter::{format_line, Reporter, DEFAULT_REPORT_INTERVAL, MIN_REPORT_INTERVAL};
pub use sink::{AggregationSink, SinkSummary};
pub use table::{FlowSnapshot, FlowTableReader, FlowTableWriter};
