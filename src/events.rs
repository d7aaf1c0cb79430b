// src/events.rs
//! Notification surface: lifecycle, telemetry, and error events
//!
//! Most notifications are delivered synchronously on the thread that mutated
//! the telemetry (the worker). Position-changed is the exception: it is the
//! highest-frequency signal, so it is delivered by a dedicated dispatch task
//! fed through a single-slot channel. While the dispatch task is behind, new
//! position changes are dropped rather than queued. That drop-on-backlog
//! behavior is deliberate: a slow consumer must never build an unbounded
//! backlog of live telemetry.

use crate::telemetry::{FixMethod, FixMode, FixQuality, Position, SatelliteInfo};
use chrono::{DateTime, Local, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Everything the interpreter can tell its subscribers.
///
/// "Received" fires on every accepted packet-derived update for the field,
/// whether or not the value changed. "Changed" fires only when the accepted
/// value differs from the stored one.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpreterEvent {
    // Lifecycle
    Starting,
    Started,
    Stopping,
    Stopped,
    Paused,
    Resumed,

    // Position
    PositionReceived(Position),
    PositionChanged(Position),

    // Motion
    SpeedReceived(f64),
    SpeedChanged(f64),
    BearingReceived(f64),
    BearingChanged(f64),
    HeadingReceived(f64),
    HeadingChanged(f64),

    // Vertical
    AltitudeReceived(f64),
    AltitudeChanged(f64),
    AltitudeAboveEllipsoidReceived(f64),
    AltitudeAboveEllipsoidChanged(f64),
    GeoidalSeparationChanged(f64),

    MagneticVariationAvailable(f64),

    // Fix state
    FixQualityChanged(FixQuality),
    FixMethodChanged(FixMethod),
    FixModeChanged(FixMode),
    FixAcquired,
    FixLost,

    // Precision
    HorizontalDilutionChanged(f64),
    VerticalDilutionChanged(f64),
    MeanDilutionChanged(f64),

    SatellitesChanged(Vec<SatelliteInfo>),

    UtcDateTimeChanged(DateTime<Utc>),
    LocalDateTimeChanged(DateTime<Local>),

    // Errors surfaced from the worker
    ExceptionOccurred(String),
    ConnectionLost(String),
}

pub type SubscriberId = u64;

type Callback = Arc<dyn Fn(&InterpreterEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    subscribers: RwLock<Vec<(SubscriberId, Callback)>>,
    next_id: AtomicU64,
}

impl Registry {
    fn subscribe(&self, callback: Callback) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().unwrap().push((id, callback));
        id
    }

    fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write().unwrap();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    fn clear(&self) {
        self.subscribers.write().unwrap().clear();
    }

    fn publish(&self, event: &InterpreterEvent) {
        // Snapshot the callback list so a subscriber may subscribe or
        // unsubscribe from inside its own callback.
        let callbacks: Vec<Callback> = self
            .subscribers
            .read()
            .unwrap()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }
}

/// Subscription registry plus the coalescing position-changed pipeline.
///
/// Must be created from within a tokio runtime; the position dispatch task
/// is spawned on construction and joined by [`NotificationHub::shutdown`].
pub struct NotificationHub {
    registry: Arc<Registry>,
    position_tx: Mutex<Option<mpsc::Sender<Position>>>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
    dropped_positions: AtomicU64,
}

impl NotificationHub {
    pub fn new() -> Self {
        let registry = Arc::new(Registry::default());
        // Capacity one: at most a single pending position while a delivery
        // is in flight. Anything beyond that is dropped, not queued.
        let (position_tx, mut position_rx) = mpsc::channel::<Position>(1);
        let dispatch_registry = Arc::clone(&registry);
        let dispatch = tokio::spawn(async move {
            while let Some(position) = position_rx.recv().await {
                dispatch_registry.publish(&InterpreterEvent::PositionChanged(position));
            }
        });
        Self {
            registry,
            position_tx: Mutex::new(Some(position_tx)),
            dispatch: Mutex::new(Some(dispatch)),
            dropped_positions: AtomicU64::new(0),
        }
    }

    /// Register a callback for every event. Returns a handle for
    /// [`NotificationHub::unsubscribe`].
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&InterpreterEvent) + Send + Sync + 'static,
    {
        self.registry.subscribe(Arc::new(callback))
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.registry.unsubscribe(id)
    }

    /// Synchronous delivery on the calling thread.
    pub fn publish(&self, event: InterpreterEvent) {
        self.registry.publish(&event);
    }

    /// Asynchronous, coalescing delivery for position changes. Returns
    /// whether the update was handed to the dispatch task.
    pub fn publish_position_changed(&self, position: Position) -> bool {
        let guard = self.position_tx.lock().unwrap();
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        match tx.try_send(position) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped_positions.fetch_add(1, Ordering::Relaxed);
                trace!("position-changed delivery backlogged; update dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Changes dropped because a previous position delivery was in flight.
    pub fn dropped_position_count(&self) -> u64 {
        self.dropped_positions.load(Ordering::Relaxed)
    }

    /// Tear down deterministically: no further deliveries, registry cleared,
    /// dispatch task drained and joined.
    pub async fn shutdown(&self) {
        let tx = self.position_tx.lock().unwrap().take();
        drop(tx);
        let dispatch = self.dispatch.lock().unwrap().take();
        if let Some(handle) = dispatch {
            let _ = handle.await;
        }
        self.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn collector() -> (Arc<Mutex<Vec<InterpreterEvent>>>, impl Fn(&InterpreterEvent)) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (events, move |event: &InterpreterEvent| {
            sink.lock().unwrap().push(event.clone())
        })
    }

    #[tokio::test]
    async fn test_subscribe_publish_unsubscribe() {
        let hub = NotificationHub::new();
        let (events, callback) = collector();
        let id = hub.subscribe(callback);

        hub.publish(InterpreterEvent::Starting);
        hub.publish(InterpreterEvent::SpeedChanged(12.5));
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                InterpreterEvent::Starting,
                InterpreterEvent::SpeedChanged(12.5)
            ]
        );

        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        hub.publish(InterpreterEvent::Stopped);
        assert_eq!(events.lock().unwrap().len(), 2);

        hub.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_position_changed_is_delivered_asynchronously() {
        let hub = NotificationHub::new();
        let (events, callback) = collector();
        hub.subscribe(callback);

        assert!(hub.publish_position_changed(Position::new(1.0, 2.0)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            *events.lock().unwrap(),
            vec![InterpreterEvent::PositionChanged(Position::new(1.0, 2.0))]
        );

        hub.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_position_subscriber_drops_updates() {
        let hub = NotificationHub::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        hub.subscribe(move |event| {
            if matches!(event, InterpreterEvent::PositionChanged(_)) {
                // Simulate a consumer far slower than the update rate.
                std::thread::sleep(Duration::from_millis(200));
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        for i in 0..20 {
            hub.publish_position_changed(Position::new(i as f64 * 0.001, 0.0));
        }
        tokio::time::sleep(Duration::from_millis(700)).await;

        // With a 200ms handler and a burst of 20 updates, almost everything
        // must have been coalesced away rather than queued.
        assert!(hub.dropped_position_count() >= 15);
        assert!(delivered.load(Ordering::SeqCst) <= 5);

        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_deliveries() {
        let hub = NotificationHub::new();
        let (events, callback) = collector();
        hub.subscribe(callback);

        hub.shutdown().await;
        assert!(!hub.publish_position_changed(Position::new(0.0, 0.0)));
        hub.publish(InterpreterEvent::Stopped);
        assert!(events.lock().unwrap().is_empty());
    }
}
