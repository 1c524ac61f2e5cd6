//! Stream capture for child process output
//!
//! Two independent consumers run as concurrently scheduled tasks against the
//! child's byte streams. The stderr consumer accumulates raw text until
//! end-of-stream. The stdout consumer accumulates raw text while also
//! reassembling logical lines at carriage-return or line-feed boundaries and
//! feeding each completed line through the progress parser to the caller's
//! callback.
//!
//! A read error on either stream is a non-fatal local failure: it is logged
//! and the consumer terminates, keeping whatever was captured so far.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::warn;

use crate::progress::{ProgressCallback, parse_progress_line};

const READ_BUF_SIZE: usize = 4096;

/// Accumulate an entire stream as UTF-8 text (stderr consumer)
pub async fn gobble<R: AsyncRead + Unpin>(mut stream: R) -> String {
    let mut captured = Vec::new();
    if let Err(e) = stream.read_to_end(&mut captured).await {
        warn!(error = %e, "stderr read failed, keeping partial capture");
    }
    String::from_utf8_lossy(&captured).into_owned()
}

/// Accumulate a stream as UTF-8 text while detecting line boundaries
/// (stdout consumer)
///
/// Every byte lands in the raw capture buffer, so the full output is
/// available even without a callback. Line reassembly happens regardless;
/// the progress parser is only invoked when a callback was supplied.
/// Callback invocations occur in the order lines appear on the stream.
pub async fn extract<R: AsyncRead + Unpin>(
    mut stream: R,
    callback: Option<ProgressCallback>,
) -> String {
    let mut captured = Vec::new();
    let mut line = Vec::new();
    let mut buf = [0u8; READ_BUF_SIZE];

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "stdout read failed, keeping partial capture");
                break;
            }
        };

        for &byte in &buf[..n] {
            captured.push(byte);
            if byte == b'\r' || byte == b'\n' {
                if let Some(callback) = &callback {
                    let text = String::from_utf8_lossy(&line);
                    callback(parse_progress_line(&text));
                }
                line.clear();
            } else {
                line.push(byte);
            }
        }
    }

    String::from_utf8_lossy(&captured).into_owned()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressSample;
    use std::sync::{Arc, Mutex};

    fn collecting_callback() -> (ProgressCallback, Arc<Mutex<Vec<ProgressSample>>>) {
        let samples = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&samples);
        let callback: ProgressCallback = Arc::new(move |sample| {
            sink.lock().unwrap().push(sample);
        });
        (callback, samples)
    }

    #[tokio::test]
    async fn gobble_captures_entire_stream() {
        let text = gobble(&b"ERROR: something broke\nmore detail\n"[..]).await;
        assert_eq!(text, "ERROR: something broke\nmore detail\n");
    }

    #[tokio::test]
    async fn extract_accumulates_raw_output_without_callback() {
        let input = b"[download]  45.2% of 10MiB at 1.23MiB/s\npartial tail";
        let text = extract(&input[..], None).await;
        assert_eq!(text, String::from_utf8_lossy(input));
    }

    #[tokio::test]
    async fn extract_invokes_callback_per_line_in_order() {
        let input = b"[download]  10.0% of 10MiB at 1.00MiB/s\n\
                      [download]  45.2% of 10MiB at 1.23MiB/s\n\
                      [Merger] Merging formats\n";
        let (callback, samples) = collecting_callback();

        let text = extract(&input[..], Some(callback)).await;

        let samples = samples.lock().unwrap();
        assert_eq!(samples.len(), 3);
        assert!((samples[0].percent - 10.0).abs() < f32::EPSILON);
        assert!((samples[1].percent - 45.2).abs() < f32::EPSILON);
        assert_eq!(samples[1].rate, "1.23MiB/s");
        assert_eq!(samples[2].percent, 0.0);
        assert_eq!(samples[2].line, "[Merger] Merging formats");
        assert_eq!(samples[2].phase, crate::progress::PhaseSignal::Merging);
        assert_eq!(text, String::from_utf8_lossy(input));
    }

    #[tokio::test]
    async fn carriage_return_is_a_line_boundary() {
        // Progress lines are typically redrawn in place with bare CRs.
        let input = b"[download]  10.0% of 1MiB at 1.00KiB/s\r[download]  99.9% of 1MiB at 2.00KiB/s\r";
        let (callback, samples) = collecting_callback();

        extract(&input[..], Some(callback)).await;

        let samples = samples.lock().unwrap();
        assert_eq!(samples.len(), 2);
        assert!((samples[1].percent - 99.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn trailing_partial_line_is_captured_but_not_reported() {
        let input = b"[download]  10.0% of 1MiB at 1.00KiB/s\n[download]  55.5";
        let (callback, samples) = collecting_callback();

        let text = extract(&input[..], Some(callback)).await;

        // Only the completed line reached the callback, but the raw capture
        // still holds the unterminated tail.
        assert_eq!(samples.lock().unwrap().len(), 1);
        assert!(text.ends_with("[download]  55.5"));
    }

    #[tokio::test]
    async fn empty_streams_yield_empty_captures() {
        assert_eq!(gobble(&b""[..]).await, "");
        let (callback, samples) = collecting_callback();
        assert_eq!(extract(&b""[..], Some(callback)).await, "");
        assert!(samples.lock().unwrap().is_empty());
    }
}
