use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tokio::sync::mpsc;

use crate::error::Error;

/// An ICE candidate relayed between a client and the media engine. The
/// payload is opaque to this crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

/// Kind of media session allocated at the engine. Candidate gathering is
/// only triggered for [`SessionKind::WebRtc`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum SessionKind {
    WebRtc,
    Rtp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Opaque handle for a recording started at the engine, carrying the
/// filename the archival pipeline will pick up.
#[derive(Clone, Debug)]
pub struct RecordingHandle {
    pub id: String,
    pub filename: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum FlowState {
    Flowing,
    NotFlowing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum FlowDirection {
    In,
    Out,
}

/// Engine-pushed events for one media session, routed to the owning
/// endpoint's event loop.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    /// A locally discovered candidate that must reach the remote client.
    IceCandidate(IceCandidate),
    /// Media started or stopped flowing on the session.
    MediaFlow {
        direction: FlowDirection,
        state: FlowState,
    },
    /// Engine-internal element state change. Ignored by endpoints.
    MediaStateChanged(String),
    /// The engine went away entirely. Surfaced as a session error.
    ServerOffline,
    /// Event tag this crate does not know about. Logged and ignored, the
    /// state machine never faults on it.
    Unknown(String),
}

/// Narrow session-control interface of the media engine. The engine owns
/// codec processing, RTP forwarding and the actual ICE/DTLS handshakes;
/// this crate only drives it.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Joins the meeting room, returning an engine user id.
    async fn join(&self, meeting_id: &str) -> Result<String, Error>;

    /// Allocates a publishing session, returning its session id.
    async fn publish(
        &self,
        user_id: &str,
        meeting_id: &str,
        kind: SessionKind,
    ) -> Result<String, Error>;

    /// Allocates a subscribing session attached to an existing publisher
    /// session, returning the subscriber session id.
    async fn subscribe(
        &self,
        user_id: &str,
        source_session_id: &str,
        kind: SessionKind,
    ) -> Result<String, Error>;

    /// Submits an SDP offer for the session and returns the answer.
    async fn process_offer(&self, session_id: &str, offer: &str) -> Result<String, Error>;

    /// Begins ICE candidate gathering for the session.
    async fn gather_candidates(&self, session_id: &str) -> Result<(), Error>;

    async fn add_ice_candidate(
        &self,
        session_id: &str,
        candidate: IceCandidate,
    ) -> Result<(), Error>;

    /// Connects the media path from a source session to a sink session.
    async fn connect(
        &self,
        source_session_id: &str,
        sink_session_id: &str,
        kind: MediaKind,
    ) -> Result<(), Error>;

    /// Disconnects the media path between a source and a sink session.
    async fn disconnect(
        &self,
        source_session_id: &str,
        sink_session_id: &str,
        kind: MediaKind,
    ) -> Result<(), Error>;

    /// Releases every session owned by the user in the meeting.
    async fn leave(&self, meeting_id: &str, user_id: &str) -> Result<(), Error>;

    async fn start_recording(
        &self,
        user_id: &str,
        session_id: &str,
        stream_id: &str,
    ) -> Result<RecordingHandle, Error>;

    /// Event stream for a session. Events start arriving once the session
    /// is negotiated and stop when the engine releases it.
    fn events(&self, session_id: &str) -> mpsc::UnboundedReceiver<EngineEvent>;
}
