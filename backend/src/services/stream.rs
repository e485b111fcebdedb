//! Newline-delimited record transport.
//!
//! The server writes one self-contained JSON record per line as soon as the
//! store yields it. The client feeds whatever chunks the network delivers
//! into a [`LineDecoder`], which keeps the unfinished tail between chunks.
//!
//! Decoding policy: every non-empty piece between delimiters, including the
//! unterminated tail, is parsed on arrival. A piece that fails to parse is
//! kept as the carry-over, together with its delimiter if one followed it, and
//! retried with the next chunk. A failed piece that is followed by another
//! piece cannot have been a fragment of it, so it is dropped and counted as
//! rejected. A corrupt final line is therefore indistinguishable from an
//! incomplete one until more data arrives. Whatever is still carried when the
//! stream ends is discarded.

use std::marker::PhantomData;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::coordinator::FetchError;

pub const RECORD_DELIMITER: u8 = b'\n';

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Serialize one record followed by the delimiter.
pub fn encode_record<T: Serialize>(record: &T) -> serde_json::Result<Bytes> {
    let mut buf = serde_json::to_vec(record)?;
    buf.push(RECORD_DELIMITER);
    Ok(Bytes::from(buf))
}

/// Encode a record stream line by line, without buffering the result set.
pub fn encode_records<S, T, E>(records: S) -> impl Stream<Item = Result<Bytes, E>>
where
    S: Stream<Item = Result<T, E>>,
    T: Serialize,
    E: From<serde_json::Error>,
{
    records.map(|record| record.and_then(|r| encode_record(&r).map_err(E::from)))
}

/// Incremental decoder for newline-delimited JSON records.
#[derive(Debug)]
pub struct LineDecoder<T> {
    carry: Vec<u8>,
    rejected: usize,
    _record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> LineDecoder<T> {
    pub fn new() -> Self {
        Self {
            carry: Vec::new(),
            rejected: 0,
            _record: PhantomData,
        }
    }

    /// Feed one chunk; returns the records completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<T> {
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(chunk);

        let mut decoded = Vec::new();
        // (piece, followed by a delimiter)
        let mut pending: Option<(&[u8], bool)> = None;

        let mut pieces = data.split(|b| *b == RECORD_DELIMITER).peekable();
        while let Some(piece) = pieces.next() {
            let terminated = pieces.peek().is_some();
            let line = piece.trim_ascii();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice::<T>(line) {
                Ok(record) => {
                    if let Some((bad, _)) = pending.take() {
                        self.reject(bad);
                    }
                    decoded.push(record);
                }
                Err(_) => {
                    if let Some((bad, _)) = pending.replace((piece, terminated)) {
                        self.reject(bad);
                    }
                }
            }
        }

        if let Some((fragment, terminated)) = pending {
            self.carry = fragment.to_vec();
            if terminated {
                self.carry.push(RECORD_DELIMITER);
            }
        }
        decoded
    }

    fn reject(&mut self, line: &[u8]) {
        self.rejected += 1;
        warn!(
            "Dropping undecodable stream line ({} bytes): {}",
            line.len(),
            String::from_utf8_lossy(&line[..line.len().min(120)])
        );
    }

    /// Bytes currently held back waiting for the rest of a line.
    pub fn carry_over(&self) -> &[u8] {
        &self.carry
    }

    /// Complete lines dropped because they could not be parsed.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// End of stream: discard the carry-over and return how many bytes were lost.
    pub fn finish(self) -> usize {
        if !self.carry.is_empty() {
            debug!(
                "Stream ended with {} undecoded bytes; discarding",
                self.carry.len()
            );
        }
        self.carry.len()
    }
}

impl<T: DeserializeOwned> Default for LineDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapt a byte stream into a stream of decoded records, yielded as they complete.
pub fn decode_records<T, S, E>(bytes: S) -> impl Stream<Item = Result<T, E>>
where
    S: Stream<Item = Result<Bytes, E>>,
    T: DeserializeOwned,
{
    async_stream::try_stream! {
        let mut decoder = LineDecoder::<T>::new();
        futures::pin_mut!(bytes);
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            for record in decoder.push(&chunk) {
                yield record;
            }
        }
        decoder.finish();
    }
}

/// Drain a byte stream into the full record list.
///
/// Cancellation wins over pending data: once `cancel` fires, partial results
/// are dropped and [`FetchError::Cancelled`] is returned.
pub async fn decode_stream<T, S, E>(bytes: S, cancel: &CancellationToken) -> Result<Vec<T>, FetchError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<FetchError>,
    T: DeserializeOwned,
{
    let mut decoder = LineDecoder::<T>::new();
    let mut records = Vec::new();
    futures::pin_mut!(bytes);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Stream decode cancelled after {} records", records.len());
                return Err(FetchError::Cancelled);
            }
            next = bytes.next() => match next {
                Some(Ok(chunk)) => records.extend(decoder.push(&chunk)),
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }
    }

    decoder.finish();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FluxRecord;

    #[test]
    fn test_encode_record_is_one_line() {
        let bytes = encode_record(&FluxRecord::new("A", 1, 2)).unwrap();
        assert_eq!(&bytes[..], b"{\"stationId\":\"A\",\"inbound\":1,\"outbound\":2}\n");
    }

    #[test]
    fn test_split_record_is_carried_over() {
        let mut decoder = LineDecoder::<FluxRecord>::new();
        assert!(decoder.push(b"{\"stationId\":\"A\",\"inb").is_empty());
        assert!(!decoder.carry_over().is_empty());
        let records = decoder.push(b"ound\":1,\"outbound\":2}\n");
        assert_eq!(records, vec![FluxRecord::new("A", 1, 2)]);
        assert!(decoder.carry_over().is_empty());
    }

    #[test]
    fn test_record_without_delimiter_is_emitted_once() {
        let mut decoder = LineDecoder::<FluxRecord>::new();
        let first = decoder.push(b"{\"stationId\":\"A\",\"inbound\":1,\"outbound\":2}");
        assert_eq!(first.len(), 1);
        let second = decoder.push(b"\n{\"stationId\":\"B\",\"inbound\":3,\"outbound\":4}\n");
        assert_eq!(second, vec![FluxRecord::new("B", 3, 4)]);
    }

    #[test]
    fn test_corrupt_line_followed_by_good_line_is_rejected() {
        let mut decoder = LineDecoder::<FluxRecord>::new();
        let records = decoder
            .push(b"not json\n{\"stationId\":\"B\",\"inbound\":3,\"outbound\":4}\n");
        assert_eq!(records.len(), 1);
        assert_eq!(decoder.rejected(), 1);
        assert!(decoder.carry_over().is_empty());
    }

    #[test]
    fn test_carried_corrupt_line_keeps_its_delimiter() {
        let mut decoder = LineDecoder::<FluxRecord>::new();
        assert!(decoder.push(b"garbage\n").is_empty());
        assert_eq!(decoder.carry_over(), b"garbage\n");

        assert!(decoder.push(b"{\"stationId\"").is_empty());
        assert_eq!(decoder.rejected(), 1);
        assert_eq!(decoder.carry_over(), b"{\"stationId\"");
    }

    #[test]
    fn test_split_inside_string_keeps_whitespace() {
        let mut decoder = LineDecoder::<serde_json::Value>::new();
        assert!(decoder.push(b"{\"stationName\":\"W 4 St ").is_empty());
        let records = decoder.push(b"& 6 Av\"}\n");
        assert_eq!(records, vec![serde_json::json!({"stationName": "W 4 St & 6 Av"})]);
    }

    #[test]
    fn test_finish_discards_carry_over() {
        let mut decoder = LineDecoder::<FluxRecord>::new();
        decoder.push(b"{\"stationId\":");
        assert_eq!(decoder.finish(), 13);
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let mut decoder = LineDecoder::<FluxRecord>::new();
        let records = decoder.push(b"\n\r\n  \n{\"stationId\":\"A\",\"inbound\":0,\"outbound\":0}\r\n");
        assert_eq!(records.len(), 1);
        assert_eq!(decoder.rejected(), 0);
    }
}
