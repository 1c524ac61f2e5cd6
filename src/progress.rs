//! Progress parsing for extraction-tool output lines
//!
//! The wrapped tool reports download state as free text on stdout. Lines
//! beginning with the `[download]` status marker may carry a completion
//! percentage and a transfer rate; everything else is passed through
//! untouched so callers can still react to non-progress status lines.
//!
//! The text patterns here are an externally imposed, best-effort contract
//! with the tool and may change between tool releases. Phase detection is
//! therefore kept behind the single narrow [`interpret_line`] function.

use std::sync::{Arc, LazyLock};

use regex::Regex;

/// Status-marker prefix of progress-bearing output lines
const DOWNLOAD_MARKER: &str = "[download]";

#[allow(clippy::expect_used)]
static PROGRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.]+)%.*?at\s+([\d.]+[KMGT]?iB/s)").expect("valid pattern"));

/// One parsed sample of tool output
///
/// `percent` and `rate` are zero/empty when the line carried no recognizable
/// progress information; `line` always preserves the raw text.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSample {
    /// Completion percentage (0.0 when the line carried no progress)
    pub percent: f32,
    /// Transfer rate verbatim from the tool (e.g. "1.23MiB/s"), empty when absent
    pub rate: String,
    /// The raw output line
    pub line: String,
    /// Lifecycle phase transition this line announced, if any
    pub phase: PhaseSignal,
}

/// Callback invoked once per completed stdout line with its parsed sample
pub type ProgressCallback = Arc<dyn Fn(ProgressSample) + Send + Sync + 'static>;

/// Higher-level lifecycle signal derived from a tool output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseSignal {
    /// The tool started merging separate audio/video streams
    Merging,
    /// The tool is deleting temporary files; the merged output is complete
    CleaningUp,
    /// The tool entered a container fixup pass
    Fixup,
    /// No phase transition on this line
    None,
}

/// Parse one line of tool output into a [`ProgressSample`]
///
/// Total over all inputs: a line that does not match the progress pattern
/// (including lines without the status marker) yields a zero percentage and
/// an empty rate, never an error.
pub fn parse_progress_line(line: &str) -> ProgressSample {
    let phase = interpret_line(line);

    if line.starts_with(DOWNLOAD_MARKER) {
        if let Some(caps) = PROGRESS_RE.captures(line) {
            let percent = caps.get(1).and_then(|m| m.as_str().parse::<f32>().ok());
            let rate = caps.get(2).map(|m| m.as_str().to_string());
            if let (Some(percent), Some(rate)) = (percent, rate) {
                return ProgressSample {
                    percent,
                    rate,
                    line: line.to_string(),
                    phase,
                };
            }
        }
    }

    ProgressSample {
        percent: 0.0,
        rate: String::new(),
        line: line.to_string(),
        phase,
    }
}

/// Interpret a tool output line as a phase-transition signal
///
/// Callers layering lifecycle handling (e.g. relocating the final file once
/// merging completes) should route every raw line through here rather than
/// matching prefixes themselves.
pub fn interpret_line(line: &str) -> PhaseSignal {
    if line.starts_with("[Merger]") {
        PhaseSignal::Merging
    } else if line.starts_with("Deleting") {
        PhaseSignal::CleaningUp
    } else if line.starts_with("[FixupM3u8]") {
        PhaseSignal::Fixup
    } else {
        PhaseSignal::None
    }
}
