//! Shared flow table
//!
//! The table has exactly one writer. [`FlowTableWriter`] is deliberately not
//! `Clone`; it is moved into the aggregation sink. Any number of
//! [`FlowTableReader`]s can take snapshots concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use pktstat_core::{FlowCounters, FlowKey, Record};

type Flows = HashMap<FlowKey, FlowCounters>;

/// The single mutating handle to a flow table
#[derive(Debug, Default)]
pub struct FlowTableWriter {
    flows: Arc<Mutex<Flows>>,
}

impl FlowTableWriter {
    /// Create an empty table and return its writer
    pub fn new() -> Self {
        Self::default()
    }

    /// A read-only handle to the same table
    pub fn reader(&self) -> FlowTableReader {
        FlowTableReader {
            flows: Arc::clone(&self.flows),
        }
    }

    /// Account one record, returning the updated counters of its flow
    pub fn apply(&mut self, record: &Record) -> FlowCounters {
        let mut flows = self.flows.lock();
        let counters = flows.entry(record.key.clone()).or_default();
        counters.record(record.len);
        *counters
    }
}

/// Read-only handle to a flow table
#[derive(Debug, Clone)]
pub struct FlowTableReader {
    flows: Arc<Mutex<Flows>>,
}

impl FlowTableReader {
    /// Copy the table and sort it by key
    ///
    /// The lock is released before sorting.
    pub fn snapshot(&self) -> FlowSnapshot {
        let mut entries: Vec<(FlowKey, FlowCounters)> = {
            let flows = self.flows.lock();
            flows.iter().map(|(k, v)| (k.clone(), *v)).collect()
        };
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        FlowSnapshot { entries }
    }

    pub fn get(&self, key: &FlowKey) -> Option<FlowCounters> {
        self.flows.lock().get(key).copied()
    }

    /// Number of distinct flows
    pub fn len(&self) -> usize {
        self.flows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Point-in-time copy of a flow table, sorted by key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowSnapshot {
    entries: Vec<(FlowKey, FlowCounters)>,
}

impl FlowSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &(FlowKey, FlowCounters)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &FlowKey) -> Option<FlowCounters> {
        self.entries
            .binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|idx| self.entries[idx].1)
    }

    /// Sum of all flows
    pub fn total(&self) -> FlowCounters {
        self.entries
            .iter()
            .fold(FlowCounters::default(), |acc, (_, c)| FlowCounters {
                packets: acc.packets.saturating_add(c.packets),
                bytes: acc.bytes.saturating_add(c.bytes),
            })
    }
}
