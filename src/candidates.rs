use crate::engine::IceCandidate;

/// FIFO queue for ICE candidates that arrive before the media session
/// exists. After the single flush the buffer stays empty and every later
/// candidate passes straight through to the caller.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    pending: Vec<IceCandidate>,
    flushed: bool,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the candidate while the buffer has not been flushed yet.
    /// Once flushed, this returns the candidate back so the caller
    /// forwards it immediately.
    pub fn enqueue(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        if self.flushed {
            Some(candidate)
        } else {
            self.pending.push(candidate);
            None
        }
    }

    /// Drains the queued candidates in insertion order. The buffer is
    /// flushed exactly once; later calls return nothing.
    pub fn flush(&mut self) -> Vec<IceCandidate> {
        self.flushed = true;
        std::mem::take(&mut self.pending)
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Discards anything still queued. Used on teardown.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(tag: &str) -> IceCandidate {
        IceCandidate {
            candidate: format!("candidate:{} 1 UDP 2122252543 192.0.2.1 53400 typ host", tag),
            sdp_mid: Some("0".to_string()),
            sdp_m_line_index: Some(0),
        }
    }

    #[test]
    fn test_flush_preserves_insertion_order() {
        let mut buffer = CandidateBuffer::new();
        assert!(buffer.enqueue(candidate("c1")).is_none());
        assert!(buffer.enqueue(candidate("c2")).is_none());
        assert!(buffer.enqueue(candidate("c3")).is_none());

        let flushed = buffer.flush();
        assert_eq!(
            flushed,
            vec![candidate("c1"), candidate("c2"), candidate("c3")]
        );
        assert!(buffer.is_flushed());
    }

    #[test]
    fn test_enqueue_after_flush_forwards_immediately() {
        let mut buffer = CandidateBuffer::new();
        assert!(buffer.enqueue(candidate("c1")).is_none());
        buffer.flush();

        assert_eq!(buffer.enqueue(candidate("c2")), Some(candidate("c2")));
        // The buffer stays empty: a second flush yields nothing.
        assert!(buffer.flush().is_empty());
    }

    #[test]
    fn test_flush_on_empty_buffer() {
        let mut buffer = CandidateBuffer::new();
        assert!(buffer.flush().is_empty());
        assert_eq!(buffer.enqueue(candidate("c1")), Some(candidate("c1")));
    }

    #[test]
    fn test_clear_discards_pending() {
        let mut buffer = CandidateBuffer::new();
        buffer.enqueue(candidate("c1"));
        buffer.clear();
        assert!(buffer.flush().is_empty());
    }
}
