use serde::Serialize;
use tokio::sync::mpsc;

use crate::{endpoint::Role, engine::IceCandidate};

/// Per-connection messages relayed to one client through the signaling
/// gateway, tagged by `id` as the client expects them.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "id")]
pub enum VideoMessage {
    #[serde(rename = "iceCandidate", rename_all = "camelCase")]
    IceCandidate {
        connection_id: String,
        role: Role,
        camera_id: String,
        candidate: IceCandidate,
    },
    #[serde(rename = "playStart", rename_all = "camelCase")]
    PlayStart {
        connection_id: String,
        role: Role,
        camera_id: String,
    },
    #[serde(rename = "playStop", rename_all = "camelCase")]
    PlayStop {
        connection_id: String,
        role: Role,
        camera_id: String,
    },
    #[serde(rename = "error", rename_all = "camelCase")]
    Error {
        connection_id: String,
        camera_id: String,
        response: String,
        message: String,
    },
}

/// Meeting-scoped broadcast events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum MeetingEvent {
    #[serde(rename_all = "camelCase")]
    CameraBroadcastStopped {
        meeting_id: String,
        stream_id: String,
    },
    #[serde(rename_all = "camelCase")]
    RecordingStarted { meeting_id: String, filename: String },
    #[serde(rename_all = "camelCase")]
    RecordingStopped { meeting_id: String, filename: String },
}

#[derive(Clone, Debug)]
pub enum OutboundMessage {
    Video(VideoMessage),
    Meeting(MeetingEvent),
}

impl OutboundMessage {
    /// Serializes the message into the JSON shape published to the
    /// gateway. Per-connection messages carry `type: "video"`.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        match self {
            OutboundMessage::Video(message) => {
                let mut value = serde_json::to_value(message)?;
                if let Some(object) = value.as_object_mut() {
                    object.insert(
                        "type".to_string(),
                        serde_json::Value::String("video".to_string()),
                    );
                }
                serde_json::to_string(&value)
            }
            OutboundMessage::Meeting(event) => serde_json::to_string(event),
        }
    }
}

/// Fire-and-forget sender towards the signaling gateway. Delivery
/// failures are logged and never fail the lifecycle transition that
/// produced the message.
#[derive(Clone, Debug)]
pub struct SignalingGateway {
    sender: mpsc::UnboundedSender<OutboundMessage>,
}

impl SignalingGateway {
    /// Creates the gateway handle and the receiver the outer messaging
    /// layer drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub(crate) fn send_video(&self, message: VideoMessage) {
        if self
            .sender
            .send(OutboundMessage::Video(message))
            .is_err()
        {
            tracing::warn!("Signaling gateway is gone, dropping video message");
        }
    }

    pub(crate) fn send_meeting(&self, event: MeetingEvent) {
        if self.sender.send(OutboundMessage::Meeting(event)).is_err() {
            tracing::warn!("Signaling gateway is gone, dropping meeting event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_message_payload() {
        let message = OutboundMessage::Video(VideoMessage::IceCandidate {
            connection_id: "conn1".to_string(),
            role: Role::Publisher,
            camera_id: "cam1".to_string(),
            candidate: IceCandidate {
                candidate: "candidate:0 1 UDP 2122252543 192.0.2.1 53400 typ host".to_string(),
                sdp_mid: Some("0".to_string()),
                sdp_m_line_index: Some(0),
            },
        });
        let payload = message.to_payload().unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["type"], "video");
        assert_eq!(value["id"], "iceCandidate");
        assert_eq!(value["role"], "publisher");
        assert_eq!(value["cameraId"], "cam1");
        assert_eq!(value["connectionId"], "conn1");
        assert_eq!(value["candidate"]["sdpMLineIndex"], 0);
    }

    #[test]
    fn test_play_start_payload() {
        let message = OutboundMessage::Video(VideoMessage::PlayStart {
            connection_id: "conn1".to_string(),
            role: Role::Subscriber,
            camera_id: "cam1".to_string(),
        });
        let payload = message.to_payload().unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["id"], "playStart");
        assert_eq!(value["role"], "subscriber");
    }

    #[test]
    fn test_meeting_event_payload() {
        let event = OutboundMessage::Meeting(MeetingEvent::RecordingStarted {
            meeting_id: "meeting1".to_string(),
            filename: "cam1.webm".to_string(),
        });
        let payload = event.to_payload().unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["name"], "recordingStarted");
        assert_eq!(value["meetingId"], "meeting1");
        assert_eq!(value["filename"], "cam1.webm");
    }
}
