use std::time::Duration;

/// Configuration for [`crate::endpoint::VideoEndpoint`] and
/// [`crate::manager::EndpointManager`]. Read once at process start and
/// cloned into every endpoint.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Grace period between a NOT_FLOWING report and the automatic stop of
    /// a publisher whose media never recovered.
    pub flow_timeout: Duration,
    /// Process-wide switch for webcam recording. Individual streams are
    /// still only recorded when they are marked as recorded.
    pub record_webcams: bool,
    /// Rewrite incoming offers so that H264 payload types are preferred
    /// before submitting them to the media engine.
    pub force_h264: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            flow_timeout: Duration::from_secs(5),
            record_webcams: false,
            force_h264: false,
        }
    }
}
