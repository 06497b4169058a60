//! Host logging interface for recovered listener failures.

use std::cell::RefCell;
use std::rc::Rc;

/// Receives one message per failed listener invocation.
///
/// Never called on successful paths.
pub trait WarningSink {
    /// Report a recovered failure.
    fn warn(&mut self, message: &str);
}

/// Forwards warnings to `tracing` at `WARN` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWarnings;

impl WarningSink for TracingWarnings {
    fn warn(&mut self, message: &str) {
        tracing::warn!(target: "persistcall::listener", "{message}");
    }
}

/// Records warnings in memory.
///
/// Clones share the same buffer, so a host can hand one clone to the runtime
/// and keep another to read the messages back.
#[derive(Debug, Default, Clone)]
pub struct CollectedWarnings {
    messages: Rc<RefCell<Vec<String>>>,
}

impl CollectedWarnings {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded message.
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    /// Number of recorded messages.
    pub fn len(&self) -> usize {
        self.messages.borrow().len()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.borrow().is_empty()
    }

    /// Drop every recorded message.
    pub fn clear(&self) {
        self.messages.borrow_mut().clear();
    }
}

impl WarningSink for CollectedWarnings {
    fn warn(&mut self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}
