//! Captured frame type

use std::time::SystemTime;

/// A frame delivered by a frame source
#[derive(Debug, Clone)]
pub struct Frame {
    /// When the frame was captured
    pub timestamp: SystemTime,
    /// Captured bytes (at most snaplen)
    pub data: Vec<u8>,
    /// Length of the frame on the wire (may exceed data.len() if truncated)
    pub wire_len: usize,
}

impl Frame {
    /// Create a new frame captured now, not truncated
    pub fn new(data: Vec<u8>) -> Self {
        let wire_len = data.len();
        Self {
            timestamp: SystemTime::now(),
            data,
            wire_len,
        }
    }

    /// Create a frame with explicit capture metadata
    pub fn with_metadata(data: Vec<u8>, wire_len: usize, timestamp: SystemTime) -> Self {
        Self {
            timestamp,
            data,
            wire_len,
        }
    }

    /// Get frame data as slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of captured bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if no bytes were captured
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the capture cut the frame short
    pub fn is_truncated(&self) -> bool {
        self.wire_len > self.data.len()
    }
}
