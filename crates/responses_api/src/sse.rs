use serde_json::Value;

use crate::events::{ResponseStatus, ResponseStreamEvent};

/// Incremental parser for SSE byte streams.
///
/// Bytes are buffered until a blank line closes the frame, so a multi-byte
/// character split across network chunks is decoded whole.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: Vec<u8>,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ResponseStreamEvent> {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.contains(&b'\r') {
            normalize_crlf(&mut self.buffer);
        }
        let mut events = Vec::new();

        while let Some(split) = find_frame_end(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..split + 2).collect();
            let frame = String::from_utf8_lossy(&frame[..split]);

            let Some(payload) = extract_data_payload(&frame) else {
                continue;
            };
            if payload == "[DONE]" {
                continue;
            }

            if let Ok(value) = serde_json::from_str::<Value>(&payload) {
                if let Some(event) = map_event(&value) {
                    events.push(event);
                }
            }
        }

        events
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<ResponseStreamEvent> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

/// Rewrites `\r\n` to `\n` in place. A trailing `\r` is kept until the next
/// chunk shows whether a `\n` follows it.
fn normalize_crlf(buffer: &mut Vec<u8>) {
    let mut out = Vec::with_capacity(buffer.len());
    let mut bytes = buffer.iter().copied().peekable();
    while let Some(byte) = bytes.next() {
        if byte == b'\r' && bytes.peek() == Some(&b'\n') {
            continue;
        }
        out.push(byte);
    }
    *buffer = out;
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn map_event(value: &Value) -> Option<ResponseStreamEvent> {
    let event_type = value.get("type")?.as_str()?;

    match event_type {
        "response.output_text.delta" => {
            let delta = value.get("delta").and_then(Value::as_str).unwrap_or("");
            Some(ResponseStreamEvent::OutputTextDelta {
                delta: delta.to_owned(),
            })
        }
        "response.completed" | "response.done" => {
            let response = value.get("response");
            let status = response
                .and_then(|response| response.get("status"))
                .and_then(Value::as_str)
                .and_then(ResponseStatus::parse);
            let output_text = response.and_then(assembled_output_text);
            Some(ResponseStreamEvent::ResponseCompleted {
                status,
                output_text,
            })
        }
        "response.failed" => {
            let message = value
                .get("response")
                .and_then(|response| response.get("error"))
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(ToString::to_string);
            Some(ResponseStreamEvent::ResponseFailed { message })
        }
        "error" => {
            let code = value
                .get("code")
                .and_then(Value::as_str)
                .map(ToString::to_string);
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .map(ToString::to_string);
            Some(ResponseStreamEvent::Error { code, message })
        }
        _ => None,
    }
}

/// Assistant text carried by a completed response object.
///
/// Uses the `output_text` convenience field when present, otherwise joins the
/// `output_text` parts of assistant message items. Returns `None` when neither
/// yields any text.
fn assembled_output_text(response: &Value) -> Option<String> {
    if let Some(text) = response.get("output_text").and_then(Value::as_str) {
        return Some(text.to_owned());
    }

    let mut text = String::new();
    let mut found = false;
    for item in response.get("output")?.as_array()? {
        let is_assistant_message = item.get("type").and_then(Value::as_str) == Some("message")
            && item.get("role").and_then(Value::as_str) == Some("assistant");
        if !is_assistant_message {
            continue;
        }
        let Some(parts) = item.get("content").and_then(Value::as_array) else {
            continue;
        };
        for part in parts {
            if part.get("type").and_then(Value::as_str) != Some("output_text") {
                continue;
            }
            if let Some(part_text) = part.get("text").and_then(Value::as_str) {
                text.push_str(part_text);
                found = true;
            }
        }
    }

    found.then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_sse_frames_incrementally() {
        let mut parser = SseStreamParser::default();
        let mut events = Vec::new();

        events.extend(
            parser.feed(b"data: {\"type\":\"response.output_text.delta\",\"delta\":\"Hello\"}\n\n"),
        );
        assert_eq!(events.len(), 1);

        events.extend(parser.feed(b"data: [DONE]\n\n"));
        assert_eq!(events.len(), 1);
        assert!(parser.is_empty_buffer());
    }

    #[test]
    fn assembled_output_text_joins_assistant_message_parts() {
        let response = json!({
            "status": "completed",
            "output": [
                {"type": "mcp_call", "name": "search_emails"},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "Hello"},
                    {"type": "refusal", "refusal": "no"},
                    {"type": "output_text", "text": " world"}
                ]}
            ]
        });

        assert_eq!(
            assembled_output_text(&response).as_deref(),
            Some("Hello world")
        );
    }

    #[test]
    fn assembled_output_text_prefers_convenience_field() {
        let response = json!({"output_text": "direct", "output": []});
        assert_eq!(assembled_output_text(&response).as_deref(), Some("direct"));
    }

    #[test]
    fn assembled_output_text_is_none_without_message_text() {
        assert_eq!(assembled_output_text(&json!({"status": "completed"})), None);
        assert_eq!(
            assembled_output_text(&json!({"output": [{"type": "mcp_list_tools"}]})),
            None
        );
    }

    #[test]
    fn crlf_framing_is_accepted() {
        let events = SseStreamParser::parse_frames(
            "data: {\"type\":\"response.output_text.delta\",\"delta\":\"x\"}\r\n\r\n",
        );
        assert_eq!(
            events,
            vec![ResponseStreamEvent::OutputTextDelta {
                delta: "x".to_owned()
            }]
        );
    }

    #[test]
    fn crlf_split_between_chunks_still_closes_frame() {
        let mut parser = SseStreamParser::default();
        assert!(parser
            .feed(b"data: {\"type\":\"response.output_text.delta\",\"delta\":\"x\"}\r\n\r")
            .is_empty());

        let events = parser.feed(b"\n");
        assert_eq!(events.len(), 1);
        assert!(parser.is_empty_buffer());
    }
}
