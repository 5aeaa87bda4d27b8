//! Upstream task signals
//!
//! Urgency and sentiment are scored outside the engine. The coordinator asks
//! a [`SignalSource`] for them before it takes its state lock, so a slow
//! source never stalls other operations.

use taskforge_core::{Task, TaskSignal};

/// Supplies the opaque `{urgency, sentiment}` signal for a task.
///
/// Values outside `[0, 1]` and `[-1, 1]` are clamped by the coordinator.
pub trait SignalSource: Send + Sync {
    fn signal(&self, task: &Task) -> TaskSignal;
}

/// Source that reports the same neutral signal for every task.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralSignal;

impl SignalSource for NeutralSignal {
    fn signal(&self, _task: &Task) -> TaskSignal {
        TaskSignal::default()
    }
}

/// Source backed by a closure.
impl<F> SignalSource for F
where
    F: Fn(&Task) -> TaskSignal + Send + Sync,
{
    fn signal(&self, task: &Task) -> TaskSignal {
        self(task)
    }
}
