//! Event delivery

use crate::EngineEvent;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

/// Synchronous observer of engine events.
///
/// Sinks run on the emitting thread while the coordinator holds its lock, so
/// they must not call back into the coordinator.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &EngineEvent);
}

/// Fan-out point for engine events.
#[derive(Clone)]
pub struct EventBus {
    /// Broadcast channel for asynchronous subscribers
    tx: broadcast::Sender<EngineEvent>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receivers", &self.tx.receiver_count())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl EventBus {
    /// Create a bus whose broadcast receivers buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            sinks: Vec::new(),
        }
    }

    /// Register a synchronous observer.
    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.add_sink(sink);
        self
    }

    /// Deliver an event to every sink, then to broadcast subscribers.
    ///
    /// Never blocks. With no subscribers the broadcast copy is dropped; a
    /// subscriber whose buffer is full misses the oldest events (lagged).
    pub fn emit(&self, event: EngineEvent) {
        for sink in &self.sinks {
            sink.on_event(&event);
        }

        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(receiver_count) => {
                debug!(
                    event_type = event_type,
                    receivers = receiver_count,
                    "Broadcast event"
                );
            }
            Err(_) => {
                debug!(event_type = event_type, "No receivers for event");
            }
        }
    }

    /// Subscribe to the event stream. Receives events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Sink that records every event it sees.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, oldest first.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .map(|events| events.iter().map(EngineEvent::event_type).collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for CollectingSink {
    fn on_event(&self, event: &EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Sink that writes each event to the tracing subscriber as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&self, event: &EngineEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => {
                tracing::info!(event_type = event.event_type(), payload = %payload, "Engine event")
            }
            Err(e) => tracing::warn!(
                event_type = event.event_type(),
                error = %e,
                "Failed to serialize engine event"
            ),
        }
    }
}
