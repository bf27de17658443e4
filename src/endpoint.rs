use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use derivative::Derivative;
use enclose::enc;
use serde::Serialize;
use strum_macros::Display;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::{
    candidates::CandidateBuffer,
    config::RelayConfig,
    engine::{
        EngineEvent, FlowDirection, FlowState, IceCandidate, MediaEngine, MediaKind,
        RecordingHandle, SessionKind,
    },
    error::{EndpointErrorKind, Error},
    negotiation::SdpNegotiator,
    recording::RecordingCoordinator,
    registry::PublisherRegistry,
    signaling::{MeetingEvent, SignalingGateway, VideoMessage},
    watchdog::FlowWatchdog,
};

/// Role of an endpoint with respect to the logical stream: the one source
/// of the stream, or one of its consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Publisher,
    Subscriber,
}

/// Lifecycle state of a [`VideoEndpoint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum MediaState {
    Stopped,
    Starting,
    Started,
    Paused,
}

#[derive(Debug)]
struct Inner {
    state: MediaState,
    user_id: Option<String>,
    session_id: Option<String>,
    /// Publisher session a subscriber endpoint attached to.
    source_session_id: Option<String>,
    negotiator: Option<SdpNegotiator>,
    candidates: CandidateBuffer,
    watchdog: FlowWatchdog,
    recording: Option<RecordingHandle>,
    stream_recorded: bool,
}

/// One local/remote media relationship: owns the negotiation with the
/// engine, applies engine-pushed events, and orchestrates recording.
/// State transitions are serialized behind a single mutex; engine events
/// and watchdog expiries arrive through a per-endpoint event loop.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct VideoEndpoint {
    pub id: String,
    pub stream_id: String,
    pub connection_id: String,
    pub meeting_id: String,
    pub role: Role,
    stream_name: String,
    inner: Mutex<Inner>,
    stop_requested: AtomicBool,
    /// Set once `stop()` shuts the event loop down. A closed endpoint can
    /// no longer react to engine events, so it must not be restarted.
    closed: AtomicBool,
    #[derivative(Debug = "ignore")]
    engine: Arc<dyn MediaEngine>,
    gateway: SignalingGateway,
    registry: PublisherRegistry,
    recorder: RecordingCoordinator,
    config: RelayConfig,
    event_sender: mpsc::UnboundedSender<EndpointEvent>,
}

impl VideoEndpoint {
    /// Creates the endpoint in `Stopped` state and spawns its event loop.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        gateway: SignalingGateway,
        registry: PublisherRegistry,
        config: RelayConfig,
        meeting_id: String,
        stream_id: String,
        connection_id: String,
        role: Role,
    ) -> Arc<Self> {
        let id = Uuid::new_v4().to_string();
        let stream_name = format!("{}{}-{}", connection_id, stream_id, role);
        let (event_sender, event_receiver) = mpsc::unbounded_channel::<EndpointEvent>();

        let endpoint = Self {
            id: id.clone(),
            stream_id,
            connection_id,
            meeting_id,
            role,
            stream_name: stream_name.clone(),
            inner: Mutex::new(Inner {
                state: MediaState::Stopped,
                user_id: None,
                session_id: None,
                source_session_id: None,
                negotiator: None,
                candidates: CandidateBuffer::new(),
                watchdog: FlowWatchdog::new(config.flow_timeout),
                recording: None,
                stream_recorded: false,
            }),
            stop_requested: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            engine,
            gateway,
            registry,
            recorder: RecordingCoordinator::new(config.record_webcams),
            config,
            event_sender,
        };

        let endpoint = Arc::new(endpoint);
        {
            let endpoint = Arc::clone(&endpoint);
            tokio::spawn(async move {
                Self::endpoint_event_loop(stream_name, endpoint, event_receiver).await;
            });
        }

        tracing::debug!("VideoEndpoint {} is created for {}", id, endpoint.stream_name);

        endpoint
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    pub async fn state(&self) -> MediaState {
        self.inner.lock().await.state
    }

    pub async fn session_id(&self) -> Option<String> {
        self.inner.lock().await.session_id.clone()
    }

    /// The negotiated answer, present once negotiation succeeded.
    pub async fn answer(&self) -> Option<String> {
        let inner = self.inner.lock().await;
        inner
            .negotiator
            .as_ref()
            .and_then(|negotiator| negotiator.answer().map(str::to_string))
    }

    /// Marks this publish instance as eligible for recording, e.g. from a
    /// moderator action.
    pub async fn set_stream_as_recorded(&self) {
        self.inner.lock().await.stream_recorded = true;
    }

    /// Drives one offer/answer negotiation against the engine and returns
    /// the answer. Publishers register with the publisher registry;
    /// subscribers attach to the registered publish or fail fast. On any
    /// failure the endpoint is torn back down to `Stopped` and no session
    /// id is retained.
    pub async fn start(&self, offer: &str) -> Result<String, Error> {
        tracing::info!("Starting video endpoint for {}", self.stream_name);
        let mut inner = self.inner.lock().await;
        if inner.state != MediaState::Stopped {
            return Err(Error::new_endpoint(
                format!(
                    "{} cannot start from state {}",
                    self.stream_name, inner.state
                ),
                EndpointErrorKind::InvalidStateError,
            ));
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::new_endpoint(
                format!("{} has been closed and cannot be restarted", self.stream_name),
                EndpointErrorKind::StoppedError,
            ));
        }

        let negotiator = SdpNegotiator::new(offer, SessionKind::WebRtc, self.config.force_h264)?;
        self.stop_requested.store(false, Ordering::SeqCst);
        inner.state = MediaState::Starting;

        match self.negotiate(&mut inner, negotiator).await {
            Ok((session_id, answer)) => {
                if self.stop_requested.load(Ordering::SeqCst) {
                    tracing::warn!(
                        "Endpoint {} was stopped while negotiating, tearing down",
                        self.stream_name
                    );
                    self.teardown(&mut inner).await;
                    return Err(Error::new_endpoint(
                        format!("{} was stopped while negotiating", self.stream_name),
                        EndpointErrorKind::StoppedError,
                    ));
                }

                // The session id exists now; flush the buffered candidates
                // in order and switch to forward-through mode.
                for candidate in inner.candidates.flush() {
                    if let Err(err) = self.engine.add_ice_candidate(&session_id, candidate).await {
                        tracing::error!(
                            "ICE candidate could not be added for {}: {}",
                            self.stream_name,
                            err
                        );
                    }
                }

                self.attach_engine_events(&session_id);

                tracing::info!(
                    "Negotiation for {} returned session {}",
                    self.stream_name,
                    session_id
                );
                Ok(answer)
            }
            Err(err) => {
                tracing::error!("Negotiation failed for {}: {}", self.stream_name, err);
                self.teardown(&mut inner).await;
                Err(err)
            }
        }
    }

    async fn negotiate(
        &self,
        inner: &mut Inner,
        mut negotiator: SdpNegotiator,
    ) -> Result<(String, String), Error> {
        let user_id = self.engine.join(&self.meeting_id).await?;
        tracing::info!("Engine join for {} returned {}", self.stream_name, user_id);
        inner.user_id = Some(user_id.clone());

        let session_id = match self.role {
            Role::Publisher => {
                let session_id = self
                    .engine
                    .publish(&user_id, &self.meeting_id, SessionKind::WebRtc)
                    .await?;
                self.registry
                    .register(self.stream_id.clone(), session_id.clone());
                session_id
            }
            Role::Subscriber => {
                let source_session_id = self.registry.find_publisher(&self.stream_id).await?;
                inner.source_session_id = Some(source_session_id.clone());
                self.engine
                    .subscribe(&user_id, &source_session_id, SessionKind::WebRtc)
                    .await?
            }
        };
        inner.session_id = Some(session_id.clone());

        let answer = negotiator
            .negotiate(self.engine.as_ref(), &session_id, &self.stream_name, self.role)
            .await?;
        inner.negotiator = Some(negotiator);
        Ok((session_id, answer))
    }

    fn attach_engine_events(&self, session_id: &str) {
        let mut events = self.engine.events(session_id);
        let event_sender = self.event_sender.clone();
        tokio::spawn(enc!((event_sender) async move {
            while let Some(event) = events.recv().await {
                if event_sender.send(EndpointEvent::Engine(event)).is_err() {
                    break;
                }
            }
        }));
    }

    /// A candidate discovered by the client. Buffered until the session
    /// id exists, forwarded immediately afterwards.
    pub async fn on_ice_candidate(&self, candidate: IceCandidate) {
        let mut inner = self.inner.lock().await;
        let forward = inner.candidates.enqueue(candidate);
        match (inner.session_id.clone(), forward) {
            (Some(session_id), Some(candidate)) => {
                if let Err(err) = self.engine.add_ice_candidate(&session_id, candidate).await {
                    tracing::error!(
                        "ICE candidate could not be added for {}: {}",
                        self.stream_name,
                        err
                    );
                }
            }
            (None, Some(_)) => {
                tracing::debug!(
                    "Discarding ICE candidate for stopped endpoint {}",
                    self.stream_name
                );
            }
            // Buffered until the session id is assigned.
            _ => {}
        }
    }

    /// Disconnects (`paused == true`) or reconnects the media path
    /// between the publisher session and this subscriber session without
    /// destroying the session. Pause is only valid from `Started`, resume
    /// only from `Paused`; anything else is a logged no-op.
    pub async fn pause(&self, paused: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        let (Some(source_id), Some(sink_id)) = (
            inner.source_session_id.clone(),
            inner.session_id.clone(),
        ) else {
            tracing::warn!(
                "Ignoring pause for {}: no connected publisher/subscriber pair",
                self.stream_name
            );
            return Ok(());
        };

        if paused {
            if inner.state != MediaState::Started {
                tracing::debug!(
                    "Ignoring pause for {} in state {}",
                    self.stream_name,
                    inner.state
                );
                return Ok(());
            }
            self.engine
                .disconnect(&source_id, &sink_id, MediaKind::Video)
                .await?;
            inner.state = MediaState::Paused;
        } else {
            if inner.state != MediaState::Paused {
                tracing::debug!(
                    "Ignoring resume for {} in state {}",
                    self.stream_name,
                    inner.state
                );
                return Ok(());
            }
            self.engine
                .connect(&source_id, &sink_id, MediaKind::Video)
                .await?;
            inner.state = MediaState::Started;
        }
        Ok(())
    }

    /// Stops the endpoint and releases every resource it owns. Idempotent
    /// and best-effort: teardown errors are logged, never returned, and a
    /// stop racing an in-flight negotiation makes the late success tear
    /// itself down instead of resurrecting the endpoint.
    pub async fn stop(&self) -> Result<(), Error> {
        self.stop_requested.store(true, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;
        if inner.state == MediaState::Stopped
            && inner.session_id.is_none()
            && inner.user_id.is_none()
        {
            tracing::debug!("Endpoint {} is already stopped", self.stream_name);
            self.closed.store(true, Ordering::SeqCst);
            let _ = self.event_sender.send(EndpointEvent::Closed);
            return Ok(());
        }

        tracing::info!(
            "Stopping video endpoint {} at room {}",
            self.stream_name,
            self.meeting_id
        );
        self.teardown(&mut inner).await;
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.event_sender.send(EndpointEvent::Closed);
        Ok(())
    }

    /// Releases timer, recording, registry entry and engine session.
    /// Always leaves the endpoint in `Stopped`.
    async fn teardown(&self, inner: &mut Inner) {
        inner.watchdog.disarm();

        if let Some(recording) = inner.recording.take() {
            self.recorder
                .stop(&self.gateway, &self.meeting_id, &recording);
        }

        if let Some(session_id) = inner.session_id.take() {
            if self.role == Role::Publisher {
                self.registry.unregister(self.stream_id.clone(), session_id);
            }
        }

        if let Some(user_id) = inner.user_id.take() {
            if let Err(err) = self.engine.leave(&self.meeting_id, &user_id).await {
                tracing::error!("Engine leave failed for {}: {}", self.stream_name, err);
            }
        }

        inner.source_session_id = None;
        inner.negotiator = None;
        inner.candidates.clear();
        inner.state = MediaState::Stopped;
    }

    pub(crate) async fn endpoint_event_loop(
        stream_name: String,
        endpoint: Arc<VideoEndpoint>,
        mut event_receiver: mpsc::UnboundedReceiver<EndpointEvent>,
    ) {
        tracing::debug!("Endpoint {} event loop started", stream_name);
        while let Some(event) = event_receiver.recv().await {
            match event {
                EndpointEvent::Engine(event) => endpoint.apply_engine_event(event).await,
                EndpointEvent::FlowTimeout => endpoint.apply_flow_timeout().await,
                EndpointEvent::Closed => break,
            }
        }
        tracing::debug!("Endpoint {} event loop finished", stream_name);
    }

    async fn apply_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::IceCandidate(candidate) => {
                tracing::debug!("Sending ICE candidate to client for {}", self.stream_name);
                self.gateway.send_video(VideoMessage::IceCandidate {
                    connection_id: self.connection_id.clone(),
                    role: self.role,
                    camera_id: self.stream_id.clone(),
                    candidate,
                });
            }
            EngineEvent::MediaFlow { direction, state } => {
                self.apply_flow_change(direction, state).await;
            }
            EngineEvent::MediaStateChanged(state) => {
                tracing::debug!(
                    "Media state changed to {} for {}",
                    state,
                    self.stream_name
                );
            }
            EngineEvent::ServerOffline => {
                tracing::error!(
                    "Endpoint {} received a media server offline event",
                    self.stream_name
                );
                self.gateway.send_video(VideoMessage::Error {
                    connection_id: self.connection_id.clone(),
                    camera_id: self.stream_id.clone(),
                    response: "rejected".to_string(),
                    message: "MEDIA_SERVER_OFFLINE".to_string(),
                });
            }
            EngineEvent::Unknown(tag) => {
                tracing::warn!("Unrecognized engine event {} for {}", tag, self.stream_name);
            }
        }
    }

    async fn apply_flow_change(&self, direction: FlowDirection, state: FlowState) {
        let mut inner = self.inner.lock().await;
        tracing::info!(
            "Media flow {} [{}] for {}",
            direction,
            state,
            self.stream_name
        );

        match state {
            FlowState::NotFlowing => {
                if inner.state == MediaState::Paused || inner.state == MediaState::Stopped {
                    return;
                }
                if !inner.watchdog.is_armed() {
                    tracing::warn!("Setting up a flow timeout for {}", self.stream_name);
                }
                inner.watchdog.arm(self.event_sender.clone());
            }
            FlowState::Flowing => {
                if inner.watchdog.is_armed() {
                    tracing::warn!(
                        "Media flow recovered before the timeout for {}",
                        self.stream_name
                    );
                }
                inner.watchdog.disarm();

                if inner.state != MediaState::Starting && inner.state != MediaState::Paused {
                    // Already started (idempotent) or already stopped.
                    return;
                }

                if self.recorder.should_record(self.role, inner.stream_recorded) {
                    self.start_recording(&mut inner).await;
                }

                self.gateway.send_video(VideoMessage::PlayStart {
                    connection_id: self.connection_id.clone(),
                    role: self.role,
                    camera_id: self.stream_id.clone(),
                });
                inner.state = MediaState::Started;
            }
        }
    }

    async fn start_recording(&self, inner: &mut Inner) {
        let (Some(user_id), Some(session_id)) =
            (inner.user_id.clone(), inner.session_id.clone())
        else {
            return;
        };
        match self
            .recorder
            .start(
                self.engine.as_ref(),
                &self.gateway,
                &self.meeting_id,
                &user_id,
                &session_id,
                &self.stream_id,
            )
            .await
        {
            Ok(handle) => inner.recording = Some(handle),
            Err(err) => {
                tracing::error!(
                    "Failed to start recording for {}: {}",
                    self.stream_name,
                    err
                );
            }
        }
    }

    /// The grace period elapsed without flow recovery. Publishers stop
    /// themselves; subscribers rely on the publisher's lifecycle. An
    /// explicit pause never triggers the automatic stop.
    async fn apply_flow_timeout(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.watchdog.acknowledge_expiry() {
            tracing::debug!("Ignoring stale flow timeout for {}", self.stream_name);
            return;
        }
        if self.role != Role::Publisher {
            tracing::debug!("Ignoring flow timeout for subscriber {}", self.stream_name);
            return;
        }
        if inner.state == MediaState::Paused || inner.state == MediaState::Stopped {
            return;
        }

        tracing::warn!(
            "Media flow was not restored within {:?} for {}, stopping",
            self.config.flow_timeout,
            self.stream_name
        );
        self.gateway.send_meeting(MeetingEvent::CameraBroadcastStopped {
            meeting_id: self.meeting_id.clone(),
            stream_id: self.stream_id.clone(),
        });
        self.gateway.send_video(VideoMessage::PlayStop {
            connection_id: self.connection_id.clone(),
            role: self.role,
            camera_id: self.stream_id.clone(),
        });
        self.teardown(&mut inner).await;
    }
}

impl Drop for VideoEndpoint {
    fn drop(&mut self) {
        tracing::debug!("VideoEndpoint {} is dropped", self.id);
    }
}

#[derive(Debug)]
pub(crate) enum EndpointEvent {
    Engine(EngineEvent),
    FlowTimeout,
    Closed,
}
