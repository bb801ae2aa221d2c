use serde::Serialize;

/// Structured trace events emitted across all Hermes crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
    },
    HandshakeCompleted {
        session_id: String,
        duration_ms: u64,
    },
    HandshakeFailed {
        session_id: String,
        reason: String,
    },
    DispatchStarted {
        session_id: String,
        messages: usize,
        batch_size: usize,
        batches: usize,
    },
    DispatchFinished {
        session_id: String,
        sent: usize,
        failed: usize,
        duration_ms: u64,
    },
    SessionRemoved {
        session_id: String,
        was_processing: bool,
    },
    BridgeCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "hm_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_variant_name() {
        let event = TraceEvent::DispatchFinished {
            session_id: "abc".into(),
            sent: 3,
            failed: 1,
            duration_ms: 12,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "DispatchFinished");
        assert_eq!(json["sent"], 3);
        assert_eq!(json["failed"], 1);
    }
}
