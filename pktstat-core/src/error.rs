//! Error types for pktstat

use thiserror::Error;

/// Result type alias for pktstat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pktstat
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Capture device could not be opened
    #[error("Failed to open capture: {0}")]
    Open(String),

    /// Capture filter was rejected
    #[error("Failed to set BPF filter: {0}")]
    Filter(String),

    /// Reading a frame from the source failed
    #[error("Error reading packet data: {0}")]
    FrameRead(String),

    /// Frame source failed permanently
    #[error("Frame source failed: {0}")]
    SourceFailed(String),

    /// Packet parsing error
    #[error("Packet parsing error: {0}")]
    PacketParsing(String),

    /// Packet construction error
    #[error("Packet construction error: {0}")]
    PacketConstruction(String),

    /// Invalid configuration value
    #[error("Invalid configuration '{name}': {reason}")]
    InvalidConfig { name: String, reason: String },

    /// A pipeline task panicked or was aborted
    #[error("Pipeline task failed: {0}")]
    Join(String),
}

impl Error {
    /// Create a packet parsing error with a custom message
    pub fn parsing<S: Into<String>>(msg: S) -> Self {
        Error::PacketParsing(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config<S: Into<String>>(name: S, reason: S) -> Self {
        Error::InvalidConfig {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must stop the process
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::FrameRead(_) | Error::PacketParsing(_))
    }
}
