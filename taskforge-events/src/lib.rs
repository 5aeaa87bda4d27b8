//! TASKFORGE Events - Engine Event Types and Delivery
//!
//! Every state change the assignment coordinator commits produces an
//! [`EngineEvent`]. Events reach consumers two ways:
//! - synchronous [`EventSink`] observers, called in registration order
//! - a bounded `tokio` broadcast channel; slow receivers lag instead of
//!   blocking the engine
//!
//! The coordinator emits while holding its state lock, so both paths see
//! events in commit order.

mod bus;
mod event;

pub use bus::{CollectingSink, EventBus, EventSink, TracingSink};
pub use event::{AssignmentFailure, EngineEvent};
