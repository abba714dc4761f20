//! Capture worker.
//!
//! Trigger contexts (RTC callbacks, wakeup dispatch) never do capture
//! work themselves; they push a [`CaptureEvent`] onto a bounded channel
//! with `try_send` and move on. A single worker task drains the channel,
//! waits for the messaging services to be ready, then hands the event
//! to the capture handler.

use crate::ready::ReadinessBus;
use aicam_common::CaptureTrigger;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Depth of the capture queue. Triggers arriving while it is full are
/// dropped with a warning; a camera that cannot keep up should not
/// accumulate stale capture requests.
pub const CAPTURE_QUEUE_DEPTH: usize = 8;

/// Default wait for messaging readiness before a capture.
pub const READY_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureEvent {
    pub trigger: CaptureTrigger,
}

pub type CaptureHandler = Arc<dyn Fn(CaptureEvent) + Send + Sync>;

pub fn capture_channel() -> (mpsc::Sender<CaptureEvent>, mpsc::Receiver<CaptureEvent>) {
    mpsc::channel(CAPTURE_QUEUE_DEPTH)
}

/// Queues a capture event without blocking. Safe from any context.
pub fn queue_capture(tx: &mpsc::Sender<CaptureEvent>, trigger: CaptureTrigger) {
    if let Err(e) = tx.try_send(CaptureEvent { trigger }) {
        warn!(?trigger, error = %e, "Capture queue full, dropping trigger");
    }
}

/// Spawns the worker draining the capture channel. For each event it
/// waits (bounded) until every bit in `ready_mask` is set on the bus,
/// then invokes the handler; events whose readiness wait times out are
/// dropped with a warning. The task ends when all senders are gone.
pub fn spawn_capture_worker(
    mut rx: mpsc::Receiver<CaptureEvent>,
    bus: ReadinessBus,
    ready_mask: u32,
    ready_wait: Duration,
    handler: CaptureHandler,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if ready_mask != 0 {
                if let Err(e) = bus.wait(ready_mask, true, ready_wait).await {
                    warn!(trigger = ?event.trigger, error = %e,
                        "Messaging services not ready, dropping capture");
                    continue;
                }
            }
            debug!(trigger = ?event.trigger, "Dispatching capture");
            handler(event);
        }
        debug!("Capture worker shutting down");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_worker_waits_for_readiness() {
        let bus = ReadinessBus::new();
        let (tx, rx) = capture_channel();
        let seen: Arc<Mutex<Vec<CaptureTrigger>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_in = seen.clone();
        let handler: CaptureHandler =
            Arc::new(move |e| seen_in.lock().unwrap().push(e.trigger));

        let worker =
            spawn_capture_worker(rx, bus.clone(), 0b1, Duration::from_secs(1), handler);

        queue_capture(&tx, CaptureTrigger::Pir);
        tokio::task::yield_now().await;
        assert!(seen.lock().unwrap().is_empty());

        bus.set(0);
        drop(tx);
        worker.await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![CaptureTrigger::Pir]);
    }

    #[tokio::test]
    async fn test_worker_drops_event_on_ready_timeout() {
        let bus = ReadinessBus::new();
        let (tx, rx) = capture_channel();
        let seen: Arc<Mutex<Vec<CaptureTrigger>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_in = seen.clone();
        let handler: CaptureHandler =
            Arc::new(move |e| seen_in.lock().unwrap().push(e.trigger));

        let worker =
            spawn_capture_worker(rx, bus, 0b1, Duration::from_millis(10), handler);
        queue_capture(&tx, CaptureTrigger::Button);
        drop(tx);
        worker.await.unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let (tx, _rx) = capture_channel();
        for _ in 0..CAPTURE_QUEUE_DEPTH + 3 {
            queue_capture(&tx, CaptureTrigger::Rtc);
        }
        // try_send never blocked; only DEPTH events are queued.
        assert_eq!(tx.capacity(), 0);
    }
}
