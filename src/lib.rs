//! # ytdlp-bridge
//!
//! Backend library for applications embedding the yt-dlp media extraction
//! tool as a managed subprocess.
//!
//! ## Design Philosophy
//!
//! ytdlp-bridge is designed to be:
//! - **Runtime-owning** - Unpacks and wires up its bundled Python/ffmpeg/aria2c runtime
//! - **Cancellable** - Every registered request can be cancelled from any task
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Line-streaming** - Progress reaches the caller per output line, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ytdlp_bridge::{BootstrapConfig, Config, Engine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         bootstrap: Some(BootstrapConfig {
//!             install_dir: "/data/runtime".into(),
//!             tmp_dir: "/data/tmp".into(),
//!             python_archive: "/bundle/python.zip".into(),
//!             ffmpeg_archive: "/bundle/ffmpeg.zip".into(),
//!             aria2c_archive: "/bundle/aria2c.zip".into(),
//!             tool_source: "/bundle/ytdlp".into(),
//!             interpreter: "usr/bin/python3".into(),
//!             ffmpeg_bin: "usr/bin/ffmpeg".into(),
//!             aria2c_bin: "usr/bin/aria2c".into(),
//!         }),
//!         ..Default::default()
//!     };
//!
//!     let engine = Engine::new(config);
//!     engine.init().await?;
//!
//!     let info = engine.fetch_info("https://example.com/watch?v=abc").await?;
//!     println!("title: {:?}", info.title);
//!
//!     let callback: ytdlp_bridge::ProgressCallback = Arc::new(|sample| {
//!         println!("{:5.1}% {}", sample.percent, sample.rate);
//!     });
//!     engine
//!         .download("https://example.com/watch?v=abc", "dl-1", Some(callback))
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Bundled-runtime bootstrap
pub mod bootstrap;
/// Configuration types
pub mod config;
/// Extraction engine
pub mod engine;
/// Error types
pub mod error;
/// Progress-line parsing
pub mod progress;
/// In-flight process registry
pub mod registry;
/// Command model
pub mod request;
/// Child output stream capture
pub mod stream;
/// Core types
pub mod types;

// Re-export commonly used types
pub use bootstrap::RuntimePaths;
pub use config::{BootstrapConfig, CancelPolicy, Config};
pub use engine::Engine;
pub use error::{BootstrapError, Error, Result};
pub use progress::{PhaseSignal, ProgressCallback, ProgressSample, interpret_line};
pub use registry::{ProcessHandle, ProcessRegistry};
pub use request::Request;
pub use types::{MediaFormat, MediaInfo, Response};
