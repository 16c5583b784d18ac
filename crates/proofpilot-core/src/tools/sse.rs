//! Minimal server-sent-events decoding.
//!
//! Only `data:` lines matter to the tool protocol; every other field
//! (`event:`, `id:`, comments) is skipped.

use futures::{Stream, StreamExt};

/// Turn a stream of byte chunks into the payloads of its `data:` lines.
///
/// Lines may be split across chunks; a trailing line without a newline is
/// still decoded when the stream ends.
pub fn data_frames<S, B, E>(chunks: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    async_stream::try_stream! {
        futures::pin_mut!(chunks);
        let mut buf: Vec<u8> = Vec::new();

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            buf.extend_from_slice(chunk.as_ref());

            while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                if let Some(data) = data_payload(&line) {
                    yield data;
                }
            }
        }

        if let Some(data) = data_payload(&buf) {
            yield data;
        }
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let payload = text.trim().strip_prefix("data:")?.trim();
    if payload.is_empty() {
        None
    } else {
        Some(payload.to_string())
    }
}
