/// Reasons an inbound frame is dropped before it reaches the engine.
///
/// None of these are reported back to the client; the protocol has no
/// negative acknowledgment.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    InvalidFrame(#[from] serde_json::Error),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("malformed payload for {event}: {reason}")]
    MalformedPayload { event: &'static str, reason: &'static str },
}

impl ProtocolError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidFrame(_) => "invalid_frame",
            Self::UnknownEvent(_) => "unknown_event",
            Self::MalformedPayload { .. } => "malformed_payload",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_payload_display() {
        let err = ProtocolError::MalformedPayload {
            event: "set_scene",
            reason: "expected a non-empty scene name",
        };
        assert_eq!(
            err.to_string(),
            "malformed payload for set_scene: expected a non-empty scene name"
        );
    }

    #[test]
    fn error_kind_strings() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        assert_eq!(ProtocolError::from(json_err).error_kind(), "invalid_frame");
        assert_eq!(ProtocolError::UnknownEvent("x".into()).error_kind(), "unknown_event");
    }
}
