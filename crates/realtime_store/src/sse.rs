//! Incremental `text/event-stream` decoder.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSentEvent {
    pub event: String,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl EventStreamDecoder {
    /// Feeds raw body bytes and returns every event completed by them.
    /// Partial lines (including split UTF-8 sequences) stay buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ServerSentEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim_end_matches(|c| c == '\n' || c == '\r');
            if let Some(event) = self.feed_line(line) {
                events.push(event);
            }
        }
        events
    }

    fn feed_line(&mut self, line: &str) -> Option<ServerSentEvent> {
        if line.is_empty() {
            if self.event.is_none() && self.data.is_empty() {
                return None;
            }
            return Some(ServerSentEvent {
                event: self.event.take().unwrap_or_else(|| "message".to_string()),
                data: std::mem::take(&mut self.data).join("\n"),
            });
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_events_split_across_chunks() {
        let mut decoder = EventStreamDecoder::default();
        assert!(decoder.push(b"event: put\r\ndata: {\"path\":\"/\",").is_empty());
        let events = decoder.push(b"\"data\":null}\r\n\r\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(
            events,
            vec![
                ServerSentEvent {
                    event: "put".into(),
                    data: r#"{"path":"/","data":null}"#.into(),
                },
                ServerSentEvent {
                    event: "keep-alive".into(),
                    data: "null".into(),
                },
            ]
        );
    }

    #[test]
    fn joins_multiline_data_and_skips_comments() {
        let mut decoder = EventStreamDecoder::default();
        let events = decoder.push(b": ping\ndata: a\ndata: b\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn keeps_split_utf8_sequences_intact() {
        let mut decoder = EventStreamDecoder::default();
        let payload = "data: Café\n\n".as_bytes();
        let split = payload.len() - 3;
        assert!(decoder.push(&payload[..split]).is_empty());
        let events = decoder.push(&payload[split..]);
        assert_eq!(events[0].data, "Café");
    }
}
