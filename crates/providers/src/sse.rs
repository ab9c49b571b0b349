//! Server-sent event framing used by both adapters.
//!
//! Gemini (`alt=sse`) and Perplexity (`"stream": true`) differ only in the
//! JSON inside each `data:` line, so each adapter supplies a parser and
//! this module handles buffering and termination.

use crate::util::from_reqwest;
use pa_domain::error::Result;
use pa_domain::stream::{BoxStream, StreamEvent};

/// Pull every complete `data:` payload out of `buffer`.
///
/// Events end at a blank line. Other fields (`event:`, `id:`, `retry:`) are
/// dropped. An unterminated event stays in the buffer as raw bytes until
/// more arrive, so a UTF-8 sequence split across reads decodes intact.
pub(crate) fn drain_data_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.windows(2).position(|w| w == b"\n\n") {
        let event: Vec<u8> = buffer.drain(..pos + 2).collect();
        let block = String::from_utf8_lossy(&event[..pos]);

        data_lines.extend(
            block
                .lines()
                .filter_map(|line| line.trim().strip_prefix("data:"))
                .map(str::trim)
                .filter(|data| !data.is_empty())
                .map(str::to_string),
        );
    }

    data_lines
}

/// Turn a streaming response into a [`BoxStream`] of events.
///
/// `parse_data` maps one `data:` payload to zero or more events. The stream
/// ends after the first `Done`; if the body closes without one, a
/// `Done { finish_reason: "stop" }` is appended.
pub(crate) fn sse_response_stream<F>(
    provider: String,
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer: Vec<u8> = Vec::new();
        let mut done_emitted = false;

        loop {
            let chunk = match response.chunk().await {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(from_reqwest(&provider, e));
                    break;
                }
            };

            let finished = chunk.is_none();
            match chunk {
                // CR never appears unescaped inside a JSON payload.
                Some(bytes) => buffer.extend(bytes.iter().copied().filter(|&b| b != b'\r')),
                // Body closed: terminate any trailing partial event.
                None if !buffer.iter().all(u8::is_ascii_whitespace) => {
                    buffer.extend_from_slice(b"\n\n")
                }
                None => {}
            }

            for data in drain_data_lines(&mut buffer) {
                for event in parse_data(&data) {
                    let is_done = matches!(&event, Ok(StreamEvent::Done { .. }));
                    yield event;
                    if is_done {
                        done_emitted = true;
                        break;
                    }
                }
                if done_emitted {
                    break;
                }
            }

            if finished || done_emitted {
                break;
            }
        }

        if !done_emitted {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            });
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_chunks_split_across_reads() {
        let mut buf = b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Ray\"}]}}]}\n\ndata: {\"cand".to_vec();
        let first = drain_data_lines(&mut buf);
        assert_eq!(first.len(), 1);
        assert!(first[0].contains("\"Ray\""));
        assert_eq!(buf, b"data: {\"cand");

        buf.extend_from_slice(b"idates\":[]}\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["{\"candidates\":[]}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn multibyte_char_split_across_reads() {
        let event = "data: {\"text\":\"café\"}\n\n".as_bytes();
        let split = event.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut buf = event[..split].to_vec();
        assert!(drain_data_lines(&mut buf).is_empty());

        buf.extend_from_slice(&event[split..]);
        assert_eq!(drain_data_lines(&mut buf), vec!["{\"text\":\"café\"}"]);
    }

    #[test]
    fn perplexity_sentinel_and_keepalives() {
        let mut buf = b": keepalive\n\nevent: ping\ndata:\n\ndata:  [DONE] \n\n".to_vec();
        assert_eq!(drain_data_lines(&mut buf), vec!["[DONE]"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn every_data_line_in_a_block_is_kept() {
        let mut buf = b"id: 7\ndata: one\ndata: two\n\n".to_vec();
        assert_eq!(drain_data_lines(&mut buf), vec!["one", "two"]);
    }
}
