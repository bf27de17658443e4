use crate::{
    endpoint::Role,
    engine::{MediaEngine, RecordingHandle},
    error::Error,
    signaling::{MeetingEvent, SignalingGateway},
};

/// Decides whether a publish gets recorded and emits the matching
/// start/stop notifications. Notification delivery is fire-and-forget
/// with respect to the endpoint's state machine.
#[derive(Clone, Debug)]
pub(crate) struct RecordingCoordinator {
    enabled: bool,
}

impl RecordingCoordinator {
    pub(crate) fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Recording requires all three: the stream was marked as recorded,
    /// the endpoint publishes it, and recording is enabled process-wide.
    pub(crate) fn should_record(&self, role: Role, stream_recorded: bool) -> bool {
        stream_recorded && role == Role::Publisher && self.enabled
    }

    pub(crate) async fn start(
        &self,
        engine: &dyn MediaEngine,
        gateway: &SignalingGateway,
        meeting_id: &str,
        user_id: &str,
        session_id: &str,
        stream_id: &str,
    ) -> Result<RecordingHandle, Error> {
        let handle = engine
            .start_recording(user_id, session_id, stream_id)
            .await?;
        tracing::info!(
            "Recording of stream {} started into {}",
            stream_id,
            handle.filename
        );
        gateway.send_meeting(MeetingEvent::RecordingStarted {
            meeting_id: meeting_id.to_string(),
            filename: handle.filename.clone(),
        });
        Ok(handle)
    }

    /// Only emits the stop notification; the engine-side recording ends
    /// with the session itself.
    pub(crate) fn stop(
        &self,
        gateway: &SignalingGateway,
        meeting_id: &str,
        handle: &RecordingHandle,
    ) {
        tracing::info!("Recording {} stopped", handle.filename);
        gateway.send_meeting(MeetingEvent::RecordingStopped {
            meeting_id: meeting_id.to_string(),
            filename: handle.filename.clone(),
        });
    }
}
