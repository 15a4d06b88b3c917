//! Cooperative cancellation for the phase schedulers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const LOG_TARGET: &str = "  shutdown";

/// Interrupt flag shared by the schedulers. Once raised, no new tasks are
/// submitted; in-flight work finishes or hits its retry ceiling, and pending
/// batches are flushed before exit.
#[derive(Debug, Default)]
pub struct Shutdown {
    requested: AtomicBool,
}

impl Shutdown {
    /// Install a ctrl-c listener that raises the flag.
    #[must_use]
    pub fn listen() -> Arc<Self> {
        let shutdown = Arc::new(Self::default());

        let flag = Arc::clone(&shutdown);
        let _ = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!(target: LOG_TARGET, "interrupt received, finishing in-flight work and flushing");
                flag.request();
            }
        });

        shutdown
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
