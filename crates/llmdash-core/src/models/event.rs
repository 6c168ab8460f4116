//! Event records describing single completed LLM calls

use serde::{Deserialize, Serialize};

/// One completed chat-completion call, as emitted to the events endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Provider-assigned completion id
    pub id: String,
    /// Model the request was sent to
    pub model: String,
    /// Logical group the call belongs to
    pub group_id: String,
    /// Provider-reported processing time in milliseconds
    pub processing_time: u64,
    /// Prompt tokens
    pub req_tokens: u64,
    /// Completion tokens
    pub resp_tokens: u64,
    /// Completion creation time, unix seconds
    pub timestamp: i64,
}

impl Event {
    /// Calculate total tokens
    pub fn total_tokens(&self) -> u64 {
        self.req_tokens + self.resp_tokens
    }

    /// Completion tokens per second of processing time
    pub fn tokens_per_sec(&self) -> Option<f64> {
        if self.processing_time == 0 {
            None
        } else {
            Some(self.resp_tokens as f64 * 1000.0 / self.processing_time as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_event_wire_shape() {
        let event = Event {
            id: "chatcmpl-123".to_string(),
            model: "gpt-4o".to_string(),
            group_id: "group01".to_string(),
            processing_time: 500,
            req_tokens: 20,
            resp_tokens: 10,
            timestamp: 1_714_521_600,
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({
                "id": "chatcmpl-123",
                "model": "gpt-4o",
                "group_id": "group01",
                "processing_time": 500,
                "req_tokens": 20,
                "resp_tokens": 10,
                "timestamp": 1_714_521_600,
            })
        );
        assert_eq!(event.total_tokens(), 30);
        assert_eq!(event.tokens_per_sec(), Some(20.0));
    }
}
