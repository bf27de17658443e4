use std::{collections::HashMap, sync::Arc};

use derivative::Derivative;

use crate::{
    config::RelayConfig,
    endpoint::{Role, VideoEndpoint},
    engine::MediaEngine,
    error::{EndpointErrorKind, Error},
    registry::PublisherRegistry,
    signaling::SignalingGateway,
};

/// Owns every live endpoint in the process, keyed by (connection, stream,
/// role), and the shared publisher registry. Enforces that exactly one
/// endpoint exists per tuple at a time.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct EndpointManager {
    endpoints: HashMap<(String, String, Role), Arc<VideoEndpoint>>,
    #[derivative(Debug = "ignore")]
    engine: Arc<dyn MediaEngine>,
    gateway: SignalingGateway,
    registry: PublisherRegistry,
    config: RelayConfig,
}

impl EndpointManager {
    /// Creates the manager and its publisher registry. Must be called
    /// within a tokio runtime.
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        gateway: SignalingGateway,
        config: RelayConfig,
    ) -> Self {
        Self {
            endpoints: HashMap::new(),
            engine,
            gateway,
            registry: PublisherRegistry::new(),
            config,
        }
    }

    pub fn registry(&self) -> &PublisherRegistry {
        &self.registry
    }

    /// Creates an endpoint for a start request. Rejects a second endpoint
    /// for the same (connection, stream, role) tuple; the existing one
    /// must be stopped and removed first.
    pub fn create_endpoint(
        &mut self,
        meeting_id: String,
        stream_id: String,
        connection_id: String,
        role: Role,
    ) -> Result<Arc<VideoEndpoint>, Error> {
        let key = (connection_id.clone(), stream_id.clone(), role);
        if self.endpoints.contains_key(&key) {
            return Err(Error::new_endpoint(
                format!(
                    "Endpoint already exists for stream {} on connection {} as {}",
                    stream_id, connection_id, role
                ),
                EndpointErrorKind::AlreadyExistsError,
            ));
        }

        let endpoint = VideoEndpoint::new(
            self.engine.clone(),
            self.gateway.clone(),
            self.registry.clone(),
            self.config.clone(),
            meeting_id,
            stream_id,
            connection_id,
            role,
        );
        self.endpoints.insert(key, endpoint.clone());
        Ok(endpoint)
    }

    pub fn get_endpoint(
        &self,
        connection_id: &str,
        stream_id: &str,
        role: Role,
    ) -> Option<Arc<VideoEndpoint>> {
        self.endpoints
            .get(&(connection_id.to_string(), stream_id.to_string(), role))
            .cloned()
    }

    /// Stops and removes one endpoint. Missing endpoints are fine: stop
    /// requests can race a disconnect.
    pub async fn remove_endpoint(
        &mut self,
        connection_id: &str,
        stream_id: &str,
        role: Role,
    ) {
        let key = (connection_id.to_string(), stream_id.to_string(), role);
        if let Some(endpoint) = self.endpoints.remove(&key) {
            let _ = endpoint.stop().await;
        } else {
            tracing::debug!(
                "No endpoint to remove for stream {} on connection {}",
                stream_id,
                connection_id
            );
        }
    }

    /// Stops every endpoint belonging to a disconnecting client.
    pub async fn stop_all(&mut self, connection_id: &str) {
        let keys: Vec<(String, String, Role)> = self
            .endpoints
            .keys()
            .filter(|(connection, _, _)| connection == connection_id)
            .cloned()
            .collect();
        tracing::info!(
            "Stopping {} endpoint(s) for connection {}",
            keys.len(),
            connection_id
        );
        for key in keys {
            if let Some(endpoint) = self.endpoints.remove(&key) {
                let _ = endpoint.stop().await;
            }
        }
    }
}
