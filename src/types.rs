//! Core types for ytdlp-bridge

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of one completed extraction-tool invocation
///
/// Immutable once constructed; the caller owns it and persists whatever it
/// needs itself.
#[derive(Debug, Clone)]
pub struct Response {
    /// The resolved command tokens actually executed (interpreter, tool
    /// script, then the serialized request)
    pub command: Vec<String>,
    /// Process exit code (`-1` when the process was terminated by a signal)
    pub exit_code: i32,
    /// Elapsed wall-clock time of the invocation
    pub elapsed: Duration,
    /// Full captured standard-output text
    pub output: String,
}

impl Response {
    /// Elapsed wall-clock time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

/// Structured media description decoded from the tool's JSON dump
///
/// Field coverage follows what the tool emits for a single media item;
/// unknown fields are ignored and absent fields decode as `None`/zero so a
/// partial dump still yields a usable record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaInfo {
    /// Stable media identifier assigned by the source site
    pub id: Option<String>,
    /// Short title
    pub title: Option<String>,
    /// Complete title
    pub fulltitle: Option<String>,
    /// Upload date in the tool's YYYYMMDD convention
    pub upload_date: Option<String>,
    /// Site-facing display identifier
    pub display_id: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
    /// Free-text description
    pub description: Option<String>,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Extractor that produced this record
    pub extractor: Option<String>,
    /// Extractor key
    pub extractor_key: Option<String>,
    /// Uploader display name
    pub uploader: Option<String>,
    /// Uploader identifier
    pub uploader_id: Option<String>,
    /// Canonical web page URL
    pub webpage_url: Option<String>,
    /// Resolution label (e.g. "1920x1080")
    pub resolution: Option<String>,
    /// Video width in pixels
    pub width: Option<u32>,
    /// Video height in pixels
    pub height: Option<u32>,
    /// Selected format label
    pub format: Option<String>,
    /// Selected format identifier
    pub format_id: Option<String>,
    /// File extension of the selected format
    pub ext: Option<String>,
    /// Exact file size in bytes, when the source reports one
    pub filesize: Option<u64>,
    /// Approximate file size in bytes
    pub filesize_approx: Option<u64>,
    /// Formats the tool actually selected for download
    pub requested_formats: Option<Vec<MediaFormat>>,
    /// All formats known for this media item
    pub formats: Option<Vec<MediaFormat>>,
}

impl MediaInfo {
    /// Best-effort total size in bytes of what a download would fetch
    ///
    /// Sums the requested formats when present, otherwise falls back to the
    /// format matching `format_id`. Zero when nothing is known.
    pub fn effective_size(&self) -> u64 {
        let duration = self.duration.unwrap_or(0.0);

        if let Some(requested) = &self.requested_formats {
            return requested.iter().map(|f| f.effective_size(duration)).sum();
        }

        self.formats
            .as_ref()
            .and_then(|formats| {
                formats
                    .iter()
                    .find(|f| f.format_id.is_some() && f.format_id == self.format_id)
            })
            .map(|f| f.effective_size(duration))
            .unwrap_or(0)
    }
}

/// One audio/video format entry from the tool's JSON dump
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaFormat {
    /// Format identifier
    pub format_id: Option<String>,
    /// Format label
    pub format: Option<String>,
    /// Short format note (e.g. "1080p")
    pub format_note: Option<String>,
    /// File extension
    pub ext: Option<String>,
    /// Video codec name, "none" for audio-only formats
    pub vcodec: Option<String>,
    /// Audio codec name, "none" for video-only formats
    pub acodec: Option<String>,
    /// Width in pixels
    pub width: Option<u32>,
    /// Height in pixels
    pub height: Option<u32>,
    /// Frames per second
    pub fps: Option<f64>,
    /// Total bitrate in KBit/s
    pub tbr: Option<f64>,
    /// Exact file size in bytes
    pub filesize: Option<u64>,
    /// Approximate file size in bytes
    pub filesize_approx: Option<u64>,
}

impl MediaFormat {
    /// Size in bytes, falling back from exact to approximate to a
    /// bitrate-times-duration estimate
    pub fn effective_size(&self, duration_secs: f64) -> u64 {
        if let Some(size) = self.filesize.filter(|s| *s > 0) {
            return size;
        }
        if let Some(size) = self.filesize_approx.filter(|s| *s > 0) {
            return size;
        }
        // tbr is KBit/s: bytes = duration * tbr * 1000 / 8
        (duration_secs * self.tbr.unwrap_or(0.0) * 125.0) as u64
    }
}
