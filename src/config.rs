//! Configuration types for ytdlp-bridge

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level engine configuration
///
/// Every field has a sensible default so `Config::default()` produces a
/// usable engine as long as a runtime can be located on the host, see
/// [`crate::bootstrap::RuntimePaths::from_system`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Bundled-runtime bootstrap settings (None = use a host-provided runtime)
    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,

    /// Directory downloads are written into (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Output filename template in the tool's own template syntax
    /// (default: "%(title)s.%(ext)s")
    #[serde(default = "default_output_template")]
    pub output_template: String,

    /// What cancelling an in-flight request does to the OS process
    #[serde(default)]
    pub cancel_policy: CancelPolicy,

    /// Route downloads through the bundled aria2c accelerator (default: true)
    #[serde(default = "default_true")]
    pub use_accelerator: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bootstrap: None,
            download_dir: default_download_dir(),
            output_template: default_output_template(),
            cancel_policy: CancelPolicy::default(),
            use_accelerator: true,
        }
    }
}

/// Locations of the bundled runtime archives and install targets
///
/// The bootstrapper unpacks each archive into a component directory under
/// `install_dir`; an already-present component directory is trusted and
/// skipped. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Directory the runtime components are installed into
    pub install_dir: PathBuf,

    /// Scratch directory handed to the tool via TMPDIR
    pub tmp_dir: PathBuf,

    /// Bundled Python distribution archive (zip)
    pub python_archive: PathBuf,

    /// Bundled ffmpeg archive (zip)
    pub ffmpeg_archive: PathBuf,

    /// Bundled aria2c archive (zip)
    pub aria2c_archive: PathBuf,

    /// The extraction tool script to install
    pub tool_source: PathBuf,

    /// Python interpreter path relative to the unpacked distribution
    /// (default: "usr/bin/python3")
    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,

    /// ffmpeg binary path relative to its unpacked archive
    /// (default: "usr/bin/ffmpeg")
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: PathBuf,

    /// aria2c binary path relative to its unpacked archive
    /// (default: "usr/bin/aria2c")
    #[serde(default = "default_aria2c_bin")]
    pub aria2c_bin: PathBuf,
}

/// Effect of [`crate::engine::Engine::cancel`] on the underlying process
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Only remove the registry entry; the process keeps running and its
    /// eventual failure is reported as a cancellation instead of an error
    #[default]
    MarkOnly,
    /// Remove the registry entry and kill the process immediately
    Kill,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_output_template() -> String {
    "%(title)s.%(ext)s".to_string()
}

fn default_interpreter() -> PathBuf {
    PathBuf::from("usr/bin/python3")
}

fn default_ffmpeg_bin() -> PathBuf {
    PathBuf::from("usr/bin/ffmpeg")
}

fn default_aria2c_bin() -> PathBuf {
    PathBuf::from("usr/bin/aria2c")
}

fn default_true() -> bool {
    true
}
