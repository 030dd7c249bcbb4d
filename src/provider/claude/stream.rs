//! Stream-JSON parser for Claude Code's `--output-format stream-json` output
//!
//! Only the events a text provider needs are modeled: session init, assistant
//! text and the final result. Everything else is `Unknown`.

use serde_json::Value;

/// A parsed event from Claude Code's stream-json output
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// System initialization with session metadata
    SystemInit {
        /// The model being used
        model: String,
    },
    /// Assistant text output
    AssistantText {
        /// The text content
        text: String,
    },
    /// Final result of the session
    Result {
        /// Whether the session ended in an error
        is_error: bool,
        /// Final result text (or the error message)
        result_text: String,
        /// Duration in milliseconds
        duration_ms: u64,
    },
    /// Unrecognized event type
    Unknown {
        /// The raw event type string
        event_type: String,
    },
}

/// Parse a single line of stream-json output into a `StreamEvent`.
///
/// Returns `None` if the line is empty, not valid JSON, or an assistant
/// message without a text block.
#[must_use]
pub fn parse_event(line: &str) -> Option<StreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let value: Value = serde_json::from_str(line).ok()?;
    let event_type = value.get("type")?.as_str()?;

    match event_type {
        "system" => Some(StreamEvent::SystemInit {
            model: value
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        }),
        "assistant" => parse_assistant_text(&value),
        "result" => Some(parse_result_event(&value)),
        other => Some(StreamEvent::Unknown {
            event_type: other.to_string(),
        }),
    }
}

fn parse_assistant_text(value: &Value) -> Option<StreamEvent> {
    let content = value.get("message")?.get("content")?.as_array()?;
    let text: String = content
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(StreamEvent::AssistantText { text })
    }
}

fn parse_result_event(value: &Value) -> StreamEvent {
    StreamEvent::Result {
        is_error: value
            .get("is_error")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        result_text: value
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        duration_ms: value
            .get("duration_ms")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    }
}

/// Extract the HTTP status from an `API Error: 529 {...}` style message.
#[must_use]
pub fn api_error_status(text: &str) -> Option<u16> {
    let rest = &text[text.find("API Error:")? + "API Error:".len()..];
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.len() == 3 {
        digits.parse().ok()
    } else {
        None
    }
}

/// Collects assistant text and the final result across a session.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    /// Text fragments collected from assistant events
    pub text_fragments: Vec<String>,
    /// Final result (populated from the Result event)
    pub result: Option<StreamEvent>,
}

impl StreamAccumulator {
    /// Create a new empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a stream event and accumulate relevant data
    pub fn process(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::AssistantText { text } => self.text_fragments.push(text.clone()),
            StreamEvent::Result { .. } => self.result = Some(event.clone()),
            _ => {}
        }
    }

    /// The final text: the result event's text, else the joined fragments.
    #[must_use]
    pub fn final_text(&self) -> String {
        match &self.result {
            Some(StreamEvent::Result { result_text, .. }) if !result_text.is_empty() => {
                result_text.clone()
            }
            _ => self.text_fragments.join(""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_line_returns_none() {
        assert!(parse_event("").is_none());
        assert!(parse_event("   ").is_none());
    }

    #[test]
    fn test_parse_invalid_json_returns_none() {
        assert!(parse_event("not json").is_none());
    }

    #[test]
    fn test_parse_system_init_event() {
        let line = r#"{"type":"system","subtype":"init","model":"claude-sonnet","session_id":"abc"}"#;
        assert_eq!(
            parse_event(line),
            Some(StreamEvent::SystemInit {
                model: "claude-sonnet".to_string()
            })
        );
    }

    #[test]
    fn test_parse_assistant_text_joins_text_blocks() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Hello "},{"type":"tool_use","name":"Read"},{"type":"text","text":"there"}]}}"#;
        assert_eq!(
            parse_event(line),
            Some(StreamEvent::AssistantText {
                text: "Hello there".to_string()
            })
        );
    }

    #[test]
    fn test_parse_assistant_without_text_is_none() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Read"}]}}"#;
        assert!(parse_event(line).is_none());
    }

    #[test]
    fn test_parse_result_error_event() {
        let line = r#"{"type":"result","subtype":"error","is_error":true,"result":"API Error: 529 overloaded","duration_ms":1200}"#;
        match parse_event(line).unwrap() {
            StreamEvent::Result {
                is_error,
                result_text,
                duration_ms,
            } => {
                assert!(is_error);
                assert_eq!(result_text, "API Error: 529 overloaded");
                assert_eq!(duration_ms, 1200);
            }
            other => panic!("Expected Result, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_event() {
        let line = r#"{"type":"user","message":{}}"#;
        assert_eq!(
            parse_event(line),
            Some(StreamEvent::Unknown {
                event_type: "user".to_string()
            })
        );
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(api_error_status("API Error: 529 {\"type\":\"overloaded\"}"), Some(529));
        assert_eq!(api_error_status("API Error:429 rate limited"), Some(429));
        assert_eq!(api_error_status("Invalid API key"), None);
        assert_eq!(api_error_status("API Error: connection reset"), None);
    }

    #[test]
    fn test_accumulator_prefers_result_text() {
        let mut acc = StreamAccumulator::new();
        acc.process(&StreamEvent::AssistantText {
            text: "draft".to_string(),
        });
        acc.process(&StreamEvent::Result {
            is_error: false,
            result_text: "final".to_string(),
            duration_ms: 10,
        });
        assert_eq!(acc.final_text(), "final");
    }

    #[test]
    fn test_accumulator_falls_back_to_fragments() {
        let mut acc = StreamAccumulator::new();
        acc.process(&StreamEvent::AssistantText {
            text: "part one, ".to_string(),
        });
        acc.process(&StreamEvent::AssistantText {
            text: "part two".to_string(),
        });
        assert_eq!(acc.final_text(), "part one, part two");
    }
}
