//! Shutdown signal handling
//!
//! The first SIGINT or SIGTERM cancels the pipeline and lets it stop
//! cleanly. A second one exits the process with status 1.

use std::io;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Listener for the signals that stop pktstat
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Register the signal handlers. Must be called within a tokio runtime.
    #[cfg(unix)]
    pub fn new() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn new() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next signal and return its name
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            Some(()) = self.interrupt.recv() => "SIGINT",
            Some(()) = self.terminate.recv() => "SIGTERM",
            else => std::future::pending().await,
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "Ctrl-C",
            Err(_) => std::future::pending().await,
        }
    }
}

/// Cancel `cancel` on the first signal, exit on the second
pub fn install(cancel: CancellationToken) -> io::Result<JoinHandle<()>> {
    let mut signals = ShutdownSignals::new()?;

    Ok(tokio::spawn(async move {
        let signal = signals.recv().await;
        info!(signal, "Received shutdown signal, stopping capture");
        cancel.cancel();

        let signal = signals.recv().await;
        warn!(signal, "Received second signal, exiting immediately");
        std::process::exit(1);
    }))
}
