#![deny(missing_debug_implementations)]
//! # Camflow
//! Camflow is the control-plane core of a WebRTC selective-forwarding relay
//! for webcam and screen streams. For each stream it negotiates a session
//! with an underlying media engine, tracks that session's lifecycle, fans a
//! single publish out to many subscribers, and coordinates recording with
//! the observed media-flow state. The media engine itself (codec processing,
//! RTP forwarding, ICE/DTLS execution) stays behind the
//! [`engine::MediaEngine`] boundary, and outbound client notifications go
//! through the fire-and-forget [`signaling::SignalingGateway`].

/// Queueing for ICE candidates that arrive before a media session exists.
pub mod candidates;
/// Configuration for [`endpoint::VideoEndpoint`] and [`manager::EndpointManager`].
pub mod config;
/// Media session endpoint: the per-stream lifecycle state machine.
pub mod endpoint;
/// Session-control boundary of the external media engine.
pub mod engine;
pub mod error;
/// Manager owning every live endpoint in the process.
pub mod manager;
/// SDP offer/answer negotiation against the engine.
pub mod negotiation;
mod recording;
/// Process-wide mapping from stream id to the active publishing session.
pub mod registry;
/// Outbound messages towards the signaling gateway.
pub mod signaling;
mod watchdog;
