//! Fire-and-forget event bus for driver observers.
//!
//! The loop publishes three channels of events: status updates, per-action
//! log lines, and execution-state transitions. Delivery is broadcast;
//! observers that lag simply miss events.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use tabpilot_core_types::HostError;

pub mod events;

pub use events::{DriverEvent, DriverStatus, LogKind};

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), HostError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-memory broadcast bus; the default for embedded use and tests.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), HostError> {
        // A bus with no subscribers is not an error; publishes are
        // fire-and-forget.
        let _ = self.sender.send(event);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// The bus type the driver publishes on.
pub type DriverBus = InMemoryBus<DriverEvent>;

/// Materialise an mpsc receiver from a bus subscription so callers can await
/// events without handling broadcast semantics directly.
pub fn to_mpsc<E>(bus: Arc<InMemoryBus<E>>, capacity: usize) -> mpsc::Receiver<E>
where
    E: Event,
{
    let mut rx = bus.subscribe();
    let (tx, out_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        while let Ok(ev) = rx.recv().await {
            if tx.send(ev).await.is_err() {
                break;
            }
        }
    });
    out_rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = DriverBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(DriverEvent::execution_state(true)).await.unwrap();
        match rx.recv().await.unwrap() {
            DriverEvent::ExecutionState { running, .. } => assert!(running),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let bus = DriverBus::new(4);
        bus.publish(DriverEvent::status(DriverStatus::Ready, "idle"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mpsc_bridge_forwards_events() {
        let bus = DriverBus::new(16);
        let mut rx = to_mpsc(bus.clone(), 16);
        bus.publish(DriverEvent::action_log(LogKind::Info, "hello"))
            .await
            .unwrap();
        match rx.recv().await.unwrap() {
            DriverEvent::ActionLog { text, .. } => assert_eq!(text, "hello"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
