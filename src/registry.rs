use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, RegistryErrorKind};

/// Process-wide mapping from logical stream id to the active publishing
/// session, so late subscribers can attach to an already-flowing publish.
/// All mutation goes through a single event loop; handles are cheap to
/// clone.
#[derive(Clone, Debug)]
pub struct PublisherRegistry {
    event_sender: mpsc::UnboundedSender<RegistryEvent>,
}

impl PublisherRegistry {
    /// Creates the registry and spawns its event loop. Must be called
    /// within a tokio runtime.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<RegistryEvent>();
        tokio::spawn(async move {
            Self::registry_event_loop(rx).await;
        });
        Self { event_sender: tx }
    }

    pub(crate) async fn registry_event_loop(
        mut event_receiver: mpsc::UnboundedReceiver<RegistryEvent>,
    ) {
        tracing::debug!("Publisher registry event loop started");
        let mut entries: HashMap<String, String> = HashMap::new();
        while let Some(event) = event_receiver.recv().await {
            match event {
                RegistryEvent::Register(stream_id, session_id) => {
                    if let Some(previous) = entries.insert(stream_id.clone(), session_id) {
                        tracing::warn!(
                            "Publisher for stream {} replaced previous session {}",
                            stream_id,
                            previous
                        );
                    }
                }
                RegistryEvent::Unregister(stream_id, session_id) => {
                    match entries.get(&stream_id) {
                        Some(current) if *current == session_id => {
                            entries.remove(&stream_id);
                        }
                        Some(_) => {
                            // A newer publisher owns the entry now.
                            tracing::debug!(
                                "Skipping unregister of stream {} for stale session {}",
                                stream_id,
                                session_id
                            );
                        }
                        None => {}
                    }
                }
                RegistryEvent::Lookup(stream_id, reply_sender) => {
                    let _ = reply_sender.send(entries.get(&stream_id).cloned());
                }
            }
        }
        tracing::debug!("Publisher registry event loop finished");
    }

    /// Registers the publishing session for a stream. Last publisher wins.
    pub fn register(&self, stream_id: String, session_id: String) {
        let _ = self
            .event_sender
            .send(RegistryEvent::Register(stream_id, session_id));
    }

    /// Removes the entry for the stream, but only when it still belongs
    /// to `session_id`. A stale publisher never erases a newer entry.
    pub fn unregister(&self, stream_id: String, session_id: String) {
        let _ = self
            .event_sender
            .send(RegistryEvent::Unregister(stream_id, session_id));
    }

    pub async fn lookup(&self, stream_id: &str) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        if self
            .event_sender
            .send(RegistryEvent::Lookup(stream_id.to_string(), tx))
            .is_err()
        {
            return None;
        }
        rx.await.unwrap_or(None)
    }

    /// Lookup that fails with a "no publisher" error for subscriber
    /// starts against streams nobody publishes.
    pub(crate) async fn find_publisher(&self, stream_id: &str) -> Result<String, Error> {
        self.lookup(stream_id).await.ok_or_else(|| {
            Error::new_registry(
                format!("Publisher for stream {} is not found", stream_id),
                RegistryErrorKind::NoPublisherError,
            )
        })
    }
}

impl Default for PublisherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub(crate) enum RegistryEvent {
    Register(String, String),
    Unregister(String, String),
    Lookup(String, oneshot::Sender<Option<String>>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = PublisherRegistry::new();
        registry.register("cam1".to_string(), "s1".to_string());
        assert_eq!(registry.lookup("cam1").await, Some("s1".to_string()));
        assert_eq!(registry.lookup("cam2").await, None);
    }

    #[tokio::test]
    async fn test_last_publisher_wins() {
        let registry = PublisherRegistry::new();
        registry.register("cam1".to_string(), "s1".to_string());
        registry.register("cam1".to_string(), "s2".to_string());
        assert_eq!(registry.lookup("cam1").await, Some("s2".to_string()));
    }

    #[tokio::test]
    async fn test_stale_unregister_keeps_newer_entry() {
        let registry = PublisherRegistry::new();
        registry.register("cam1".to_string(), "s1".to_string());
        registry.register("cam1".to_string(), "s2".to_string());

        // The stale publisher tears down after being replaced.
        registry.unregister("cam1".to_string(), "s1".to_string());
        assert_eq!(registry.lookup("cam1").await, Some("s2".to_string()));

        registry.unregister("cam1".to_string(), "s2".to_string());
        assert_eq!(registry.lookup("cam1").await, None);
    }

    #[tokio::test]
    async fn test_unregister_unknown_stream_is_noop() {
        let registry = PublisherRegistry::new();
        registry.unregister("cam1".to_string(), "s1".to_string());
        assert_eq!(registry.lookup("cam1").await, None);
    }

    #[tokio::test]
    async fn test_find_publisher_fails_without_entry() {
        let registry = PublisherRegistry::new();
        let result = registry.find_publisher("cam1").await;
        assert!(matches!(
            result,
            Err(Error::RegistryError {
                kind: RegistryErrorKind::NoPublisherError,
                ..
            })
        ));
    }
}
