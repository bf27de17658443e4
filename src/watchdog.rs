use std::time::Duration;

use tokio::{sync::mpsc, task::JoinHandle, time::sleep};

use crate::endpoint::EndpointEvent;

/// Per-endpoint timer that detects sustained loss of media flow. At most
/// one timer is armed at a time; on expiry it sends
/// [`EndpointEvent::FlowTimeout`] into the owning endpoint's event loop.
#[derive(Debug)]
pub(crate) struct FlowWatchdog {
    timeout: Duration,
    handle: Option<JoinHandle<()>>,
}

impl FlowWatchdog {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            handle: None,
        }
    }

    /// Arms the timer unless one is already armed.
    pub(crate) fn arm(&mut self, event_sender: mpsc::UnboundedSender<EndpointEvent>) {
        if self.is_armed() {
            return;
        }
        let timeout = self.timeout;
        self.handle = Some(tokio::spawn(async move {
            sleep(timeout).await;
            let _ = event_sender.send(EndpointEvent::FlowTimeout);
        }));
    }

    /// Cancels an armed timer. Idempotent.
    pub(crate) fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Claims a pending expiry. Returns false when the timer was disarmed
    /// after the expiry event was already queued, so a flow recovery that
    /// raced the timeout wins.
    pub(crate) fn acknowledge_expiry(&mut self) -> bool {
        self.handle.take().is_some()
    }
}

impl Drop for FlowWatchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_expiry_sends_flow_timeout() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watchdog = FlowWatchdog::new(Duration::from_millis(10));
        watchdog.arm(tx);

        let event = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("watchdog never fired");
        assert!(matches!(event, Some(EndpointEvent::FlowTimeout)));
    }

    #[tokio::test]
    async fn test_arm_twice_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watchdog = FlowWatchdog::new(Duration::from_millis(10));
        watchdog.arm(tx.clone());
        watchdog.arm(tx);

        sleep(Duration::from_millis(100)).await;
        assert!(matches!(rx.try_recv(), Ok(EndpointEvent::FlowTimeout)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disarm_cancels_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watchdog = FlowWatchdog::new(Duration::from_millis(20));
        watchdog.arm(tx);
        watchdog.disarm();
        assert!(!watchdog.is_armed());

        sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_acknowledge_expiry_after_disarm_is_stale() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut watchdog = FlowWatchdog::new(Duration::from_millis(10));
        watchdog.arm(tx);
        assert!(watchdog.acknowledge_expiry());

        watchdog.disarm();
        assert!(!watchdog.acknowledge_expiry());
    }

    #[tokio::test]
    async fn test_rearm_after_expiry() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watchdog = FlowWatchdog::new(Duration::from_millis(10));
        watchdog.arm(tx.clone());
        sleep(Duration::from_millis(100)).await;
        assert!(rx.recv().await.is_some());

        watchdog.arm(tx);
        sleep(Duration::from_millis(100)).await;
        assert!(matches!(rx.try_recv(), Ok(EndpointEvent::FlowTimeout)));
    }
}
