use crate::{
    endpoint::Role,
    engine::{MediaEngine, SessionKind},
    error::{Error, NegotiationErrorKind},
};

/// One SDP offer/answer exchange, owned exclusively by its endpoint. The
/// offer is validated and optionally rewritten before submission; the
/// answer is held once the engine accepted it.
#[derive(Debug)]
pub struct SdpNegotiator {
    offer: String,
    kind: SessionKind,
    answer: Option<String>,
}

impl SdpNegotiator {
    /// Validates the raw offer and applies the pre-negotiation transform.
    pub fn new(offer: &str, kind: SessionKind, force_h264: bool) -> Result<Self, Error> {
        if !offer.lines().any(|line| line.starts_with("v=")) {
            return Err(Error::new_negotiation(
                "Offer is missing a version line".to_string(),
                NegotiationErrorKind::OfferInvalidError,
            ));
        }
        if !offer.lines().any(|line| line.starts_with("m=")) {
            return Err(Error::new_negotiation(
                "Offer has no media description".to_string(),
                NegotiationErrorKind::OfferInvalidError,
            ));
        }

        let offer = if force_h264 {
            prefer_h264(offer)
        } else {
            offer.to_string()
        };

        Ok(Self {
            offer,
            kind,
            answer: None,
        })
    }

    /// Submits the offer to the engine for the allocated session and
    /// triggers candidate gathering when the session kind requires it.
    /// Exactly one negotiation per endpoint: a second call is rejected.
    pub async fn negotiate(
        &mut self,
        engine: &dyn MediaEngine,
        session_id: &str,
        stream_name: &str,
        role: Role,
    ) -> Result<String, Error> {
        if self.answer.is_some() {
            return Err(Error::new_negotiation(
                format!("{} as {} has already negotiated", stream_name, role),
                NegotiationErrorKind::AlreadyNegotiatedError,
            ));
        }

        let answer = engine
            .process_offer(session_id, &self.offer)
            .await
            .map_err(|err| {
                Error::new_negotiation(
                    format!("Engine rejected offer for {} as {}: {}", stream_name, role, err),
                    NegotiationErrorKind::EngineRejectedError,
                )
            })?;

        if self.kind == SessionKind::WebRtc {
            engine.gather_candidates(session_id).await.map_err(|err| {
                Error::new_negotiation(
                    format!(
                        "Failed to start candidate gathering for {} as {}: {}",
                        stream_name, role, err
                    ),
                    NegotiationErrorKind::EngineRejectedError,
                )
            })?;
        }

        self.answer = Some(answer.clone());
        Ok(answer)
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }
}

/// Moves H264 payload types to the front of every `m=video` format list
/// so the engine negotiates them preferentially.
pub(crate) fn prefer_h264(sdp: &str) -> String {
    let h264_payloads: Vec<&str> = sdp
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix("a=rtpmap:")?;
            let (payload, codec) = rest.split_once(' ')?;
            if codec.to_ascii_uppercase().starts_with("H264/") {
                Some(payload)
            } else {
                None
            }
        })
        .collect();

    if h264_payloads.is_empty() {
        return sdp.to_string();
    }

    sdp.lines()
        .map(|line| match line.strip_prefix("m=video ") {
            Some(rest) => {
                let tokens: Vec<&str> = rest.split_whitespace().collect();
                if tokens.len() <= 2 {
                    return line.to_string();
                }
                // m=video <port> <proto> <fmt> ...
                let (head, formats) = tokens.split_at(2);
                let mut ordered: Vec<&str> = formats
                    .iter()
                    .copied()
                    .filter(|format| h264_payloads.contains(format))
                    .collect();
                ordered.extend(
                    formats
                        .iter()
                        .copied()
                        .filter(|format| !h264_payloads.contains(format)),
                );
                format!("m=video {} {}", head.join(" "), ordered.join(" "))
            }
            None => line.to_string(),
        })
        .collect::<Vec<String>>()
        .join("\r\n")
}
