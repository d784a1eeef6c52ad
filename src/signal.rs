//! Interrupt handling
//!
//! The process-wide handler only counts SIGINT, SIGTERM and SIGHUP
//! deliveries. The run loop polls the count, stops the container (killing it
//! on a repeated signal) and unwinds normally so scoped resources are
//! released before exit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{CtlError, Result};

/// Shared count of interrupt requests
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    count: Arc<AtomicUsize>,
}

impl Interrupt {
    /// A counter nothing but [`Interrupt::trigger`] will set
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the process signal handler. Only one install per process.
    pub fn install() -> Result<Self> {
        let interrupt = Self::new();
        let count = interrupt.count.clone();

        ctrlc::set_handler(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .map_err(|e| CtlError::Signal(format!("Failed to set signal handler: {}", e)))?;

        debug!("Signal handler installed");
        Ok(interrupt)
    }

    pub fn trigger(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.count() > 0
    }

    /// Number of interrupts received so far
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_is_shared_between_clones() {
        let interrupt = Interrupt::new();
        let other = interrupt.clone();
        assert!(!other.is_set());

        interrupt.trigger();
        assert!(other.is_set());
        assert_eq!(other.count(), 1);
    }

    #[test]
    fn test_repeated_triggers_are_counted() {
        let interrupt = Interrupt::new();
        interrupt.trigger();
        interrupt.trigger();
        assert_eq!(interrupt.count(), 2);
    }
}
