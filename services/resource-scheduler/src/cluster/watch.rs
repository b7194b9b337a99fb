//! Incremental decoder for the watch stream body.
//!
//! The server writes one JSON object per record, usually newline separated,
//! but chunk boundaries on the wire are arbitrary. The decoder buffers bytes
//! until a complete value is available.

use serde_json::Deserializer;

use super::types::WatchEvent;

#[derive(Debug, Default)]
pub struct WatchDecoder {
    buf: Vec<u8>,
}

impl WatchDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every record it completes.
    ///
    /// A malformed record ends the batch with an error; the stream is corrupt
    /// from that point and must be abandoned. Records decoded before it are
    /// still returned.
    ///
    /// Parsing restarts from the first buffered byte, so a record split over
    /// many chunks is re-scanned once per chunk. Watch records are single pod
    /// objects, which keeps this cheap.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<WatchEvent, serde_json::Error>> {
        self.buf.extend_from_slice(chunk);

        let mut records = Vec::new();
        let mut consumed = 0;
        {
            let mut stream = Deserializer::from_slice(&self.buf).into_iter::<WatchEvent>();
            loop {
                match stream.next() {
                    Some(Ok(event)) => {
                        consumed = stream.byte_offset();
                        records.push(Ok(event));
                    }
                    // Partial record, wait for more bytes.
                    Some(Err(e)) if e.is_eof() => break,
                    Some(Err(e)) => {
                        consumed = self.buf.len();
                        records.push(Err(e));
                        break;
                    }
                    None => {
                        consumed = stream.byte_offset();
                        break;
                    }
                }
            }
        }

        self.buf.drain(..consumed);
        records
    }

    /// Bytes received but not yet decoded.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Close the decoder at end of body. A record left half-received is
    /// returned as a decode error.
    pub fn finish(&mut self) -> Option<serde_json::Error> {
        if self.buf.iter().all(u8::is_ascii_whitespace) {
            self.buf.clear();
            return None;
        }
        let truncated = std::mem::take(&mut self.buf);
        serde_json::from_slice::<WatchEvent>(&truncated).err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_newline_delimited_records() {
        let mut decoder = WatchDecoder::new();
        let body = concat!(
            r#"{"type":"ADDED","object":{"metadata":{"name":"a"}}}"#,
            "\n",
            r#"{"type":"MODIFIED","object":{"metadata":{"name":"b"}}}"#,
            "\n"
        );

        let events: Vec<_> = decoder
            .push(body.as_bytes())
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].object.metadata.name, "a");
        assert_eq!(events[1].event_type, "MODIFIED");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_record_split_across_chunks() {
        let mut decoder = WatchDecoder::new();
        let record = r#"{"type":"ADDED","object":{"metadata":{"name":"split"}}}"#;
        let (head, tail) = record.split_at(20);

        assert!(decoder.push(head.as_bytes()).is_empty());
        assert_eq!(decoder.pending(), 20);

        let events = decoder.push(tail.as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().object.metadata.name, "split");
    }

    #[test]
    fn test_malformed_record_is_an_error() {
        let mut decoder = WatchDecoder::new();
        let records = decoder.push(b"{\"type\": \"ADDED\", \"object\": 17}\n");
        assert_eq!(records.len(), 1);
        assert!(records[0].is_err());
    }

    #[test]
    fn test_records_before_garbage_survive() {
        let mut decoder = WatchDecoder::new();
        let body = concat!(
            r#"{"type":"ADDED","object":{"metadata":{"name":"ok"}}}"#,
            "\n<html>bad gateway</html>\n"
        );

        let records = decoder.push(body.as_bytes());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].as_ref().unwrap().object.metadata.name, "ok");
        assert!(records[1].is_err());
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_truncated_record_reported_at_end_of_body() {
        let mut decoder = WatchDecoder::new();
        assert!(decoder.push(br#"{"type":"ADDED","object":{"metad"#).is_empty());

        let err = decoder.finish().expect("truncated record");
        assert!(err.is_eof());
        assert_eq!(decoder.pending(), 0);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_trailing_whitespace_is_clean_end() {
        let mut decoder = WatchDecoder::new();
        let records = decoder.push(b"{\"type\":\"ADDED\",\"object\":{}}\n");
        assert_eq!(records.len(), 1);
        assert!(decoder.finish().is_none());
    }
}
