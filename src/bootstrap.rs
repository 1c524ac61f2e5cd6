//! Bundled-runtime bootstrap
//!
//! The extraction tool runs on top of a relocatable Python distribution plus
//! ffmpeg and aria2c helper binaries, all shipped as zip archives next to
//! the application. [`init`] unpacks each archive into its own component
//! directory under the install dir and returns the [`RuntimePaths`] the
//! engine needs to spawn processes.
//!
//! Extraction is idempotent per component: a component directory that
//! already exists is trusted as-is, and a failed extraction removes its
//! partial directory so the next attempt starts clean.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use which::which;

use crate::config::BootstrapConfig;
use crate::error::BootstrapError;

/// Installed filename of the extraction tool script
const TOOL_FILE_NAME: &str = "ytdlp";

/// Resolved locations of everything the engine needs at spawn time
///
/// Paths pointing into a bundled runtime come from [`init`]; a host-provided
/// runtime comes from [`RuntimePaths::from_system`]. Optional fields are
/// only populated for bundled runtimes, where the unpacked distribution is
/// not at the location it was built for and the process environment must
/// compensate.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    /// Runtime install root
    pub install_dir: PathBuf,
    /// Python interpreter executing the tool
    pub interpreter: PathBuf,
    /// The installed extraction tool script
    pub tool_script: PathBuf,
    /// ffmpeg binary handed to the tool via its location flag
    pub ffmpeg: PathBuf,
    /// aria2c binary used as external download accelerator
    pub aria2c: PathBuf,
    /// Shared-library search path for the relocated interpreter
    pub ld_library_path: Option<String>,
    /// CA bundle of the relocated distribution
    pub ssl_cert_file: Option<PathBuf>,
    /// PYTHONHOME of the relocated distribution (doubles as HOME)
    pub python_home: Option<PathBuf>,
    /// Scratch directory handed to the tool via TMPDIR
    pub tmp_dir: Option<PathBuf>,
}

impl RuntimePaths {
    /// Build runtime paths from binaries already installed on the host
    ///
    /// Looks up `python3`, `ffmpeg` and `aria2c` on PATH. No environment
    /// overrides are applied for a host runtime.
    pub fn from_system(tool_script: impl Into<PathBuf>) -> crate::error::Result<Self> {
        let tool_script = tool_script.into();
        let interpreter = which("python3").map_err(|e| {
            crate::error::Error::Io(io::Error::new(io::ErrorKind::NotFound, e.to_string()))
        })?;
        let ffmpeg = which("ffmpeg").map_err(|e| {
            crate::error::Error::Io(io::Error::new(io::ErrorKind::NotFound, e.to_string()))
        })?;
        let aria2c = which("aria2c").map_err(|e| {
            crate::error::Error::Io(io::Error::new(io::ErrorKind::NotFound, e.to_string()))
        })?;
        let install_dir = interpreter
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Self {
            install_dir,
            interpreter,
            tool_script,
            ffmpeg,
            aria2c,
            ld_library_path: None,
            ssl_cert_file: None,
            python_home: None,
            tmp_dir: None,
        })
    }
}

/// Unpack the bundled runtime described by `config`
///
/// The returned paths are computed before any extraction happens, so a
/// partially pre-installed runtime resolves to the same locations as a fresh
/// one.
pub fn init(config: &BootstrapConfig) -> std::result::Result<RuntimePaths, BootstrapError> {
    let python_dir = config.install_dir.join("python");
    let tool_dir = config.install_dir.join("yt_dlp");
    let ffmpeg_dir = config.install_dir.join("ffmpeg");
    let aria2c_dir = config.install_dir.join("aria2c");

    let python_usr = python_dir.join("usr");
    let ld_library_path = format!(
        "{}:{}",
        python_usr.join("lib").display(),
        ffmpeg_dir.join("usr").join("lib").display()
    );

    let paths = RuntimePaths {
        install_dir: config.install_dir.clone(),
        interpreter: python_dir.join(&config.interpreter),
        tool_script: tool_dir.join(TOOL_FILE_NAME),
        ffmpeg: ffmpeg_dir.join(&config.ffmpeg_bin),
        aria2c: aria2c_dir.join(&config.aria2c_bin),
        ld_library_path: Some(ld_library_path),
        ssl_cert_file: Some(python_usr.join("etc").join("tls").join("cert.pem")),
        python_home: Some(python_usr),
        tmp_dir: Some(config.tmp_dir.clone()),
    };

    install_archive("python", &config.python_archive, &python_dir)?;
    install_tool(&config.tool_source, &tool_dir)?;
    install_archive("ffmpeg", &config.ffmpeg_archive, &ffmpeg_dir)?;
    install_archive("aria2c", &config.aria2c_archive, &aria2c_dir)?;

    fs::create_dir_all(&config.tmp_dir).map_err(|e| BootstrapError::Install {
        component: "tmp",
        reason: e.to_string(),
    })?;

    info!(install_dir = ?config.install_dir, "runtime bootstrap complete");
    Ok(paths)
}

/// Unpack one archive component unless its directory already exists
fn install_archive(
    component: &'static str,
    archive: &Path,
    dir: &Path,
) -> std::result::Result<(), BootstrapError> {
    if dir.exists() {
        debug!(?dir, component, "component already installed, skipping");
        return Ok(());
    }

    info!(?archive, ?dir, component, "extracting runtime component");
    fs::create_dir_all(dir).map_err(|e| BootstrapError::Extract {
        component,
        dir: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    if let Err(e) = extract_zip(component, archive, dir) {
        // Remove the partial directory so a retry starts clean
        if let Err(rm) = fs::remove_dir_all(dir) {
            warn!(?dir, error = %rm, "failed to remove partial component directory");
        }
        return Err(e);
    }

    Ok(())
}

/// Install the single-file tool script unless its directory already exists
fn install_tool(source: &Path, dir: &Path) -> std::result::Result<(), BootstrapError> {
    if dir.exists() {
        debug!(?dir, "tool already installed, skipping");
        return Ok(());
    }

    info!(?source, ?dir, "installing extraction tool");
    let result = (|| -> io::Result<()> {
        fs::create_dir_all(dir)?;
        let target = dir.join(TOOL_FILE_NAME);
        fs::copy(source, &target)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(0o755))?;
        }
        Ok(())
    })();

    if let Err(e) = result {
        if dir.exists() {
            if let Err(rm) = fs::remove_dir_all(dir) {
                warn!(?dir, error = %rm, "failed to remove partial tool directory");
            }
        }
        return Err(BootstrapError::Install {
            component: "tool",
            reason: e.to_string(),
        });
    }

    Ok(())
}

/// Extract a zip archive into `dest`, skipping entries with unsafe paths
fn extract_zip(
    component: &'static str,
    archive_path: &Path,
    dest: &Path,
) -> std::result::Result<(), BootstrapError> {
    let open_err = |e: String| BootstrapError::ArchiveOpen {
        archive: archive_path.to_path_buf(),
        reason: e,
    };
    let extract_err = |e: String| BootstrapError::Extract {
        component,
        dir: dest.to_path_buf(),
        reason: e,
    };

    let file = fs::File::open(archive_path).map_err(|e| open_err(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| open_err(e.to_string()))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| extract_err(format!("failed to read entry {}: {}", index, e)))?;

        let entry_path = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            None => {
                warn!(index, "skipping archive entry with unsafe path");
                continue;
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|e| extract_err(format!("failed to create directory: {}", e)))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| extract_err(format!("failed to create parent directories: {}", e)))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|e| extract_err(format!("failed to create output file: {}", e)))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|e| extract_err(format!("failed to write file: {}", e)))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&entry_path, fs::Permissions::from_mode(mode))
                .map_err(|e| extract_err(format!("failed to set permissions: {}", e)))?;
        }
    }

    debug!(archive = ?archive_path, ?dest, "archive extracted");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn write_test_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, data) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    fn test_config(root: &Path) -> BootstrapConfig {
        let python_archive = root.join("python.zip");
        let ffmpeg_archive = root.join("ffmpeg.zip");
        let aria2c_archive = root.join("aria2c.zip");
        let tool_source = root.join("tool-src");

        write_test_zip(
            &python_archive,
            &[
                ("usr/bin/python3", b"#!python"),
                ("usr/lib/libpython.so", b"\x7fELF"),
                ("usr/etc/tls/cert.pem", b"PEM"),
            ],
        );
        write_test_zip(&ffmpeg_archive, &[("usr/bin/ffmpeg", b"\x7fELF")]);
        write_test_zip(&aria2c_archive, &[("usr/bin/aria2c", b"\x7fELF")]);
        fs::write(&tool_source, b"#!/usr/bin/env python3\n").unwrap();

        BootstrapConfig {
            install_dir: root.join("runtime"),
            tmp_dir: root.join("tmp"),
            python_archive,
            ffmpeg_archive,
            aria2c_archive,
            tool_source,
            interpreter: PathBuf::from("usr/bin/python3"),
            ffmpeg_bin: PathBuf::from("usr/bin/ffmpeg"),
            aria2c_bin: PathBuf::from("usr/bin/aria2c"),
        }
    }

    // --- init ---

    #[test]
    fn init_unpacks_all_components() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let paths = init(&config).unwrap();

        assert!(paths.interpreter.is_file());
        assert!(paths.tool_script.is_file());
        assert!(paths.ffmpeg.is_file());
        assert!(paths.aria2c.is_file());
        assert!(paths.ssl_cert_file.as_ref().unwrap().is_file());
        assert!(config.tmp_dir.is_dir());

        let ld = paths.ld_library_path.unwrap();
        assert!(ld.contains("python/usr/lib"));
        assert!(ld.contains("ffmpeg/usr/lib"));
    }

    #[test]
    fn init_skips_existing_component_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        init(&config).unwrap();

        // Plant a marker, then point the config at a nonexistent archive.
        // A second init must not touch the installed component.
        let marker = config.install_dir.join("python").join("marker");
        fs::write(&marker, b"keep").unwrap();
        let mut config = config;
        config.python_archive = dir.path().join("missing.zip");

        init(&config).unwrap();
        assert!(marker.is_file());
    }

    #[test]
    fn failed_extraction_removes_partial_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        fs::write(&config.python_archive, b"this is not a zip archive").unwrap();
        config.install_dir = dir.path().join("runtime2");

        let err = init(&config).unwrap_err();
        assert!(matches!(err, BootstrapError::ArchiveOpen { .. }));
        assert!(!config.install_dir.join("python").exists());
    }

    #[test]
    fn missing_tool_source_reports_install_error_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.tool_source = dir.path().join("nonexistent-tool");
        config.install_dir = dir.path().join("runtime3");

        let err = init(&config).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Install {
                component: "tool",
                ..
            }
        ));
        assert!(!config.install_dir.join("yt_dlp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn installed_tool_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let paths = init(&config).unwrap();

        let mode = fs::metadata(&paths.tool_script).unwrap().permissions().mode();
        assert_eq!(mode & 0o755, 0o755);
    }

    // --- extract_zip ---

    #[test]
    fn extract_zip_skips_unsafe_entry_paths() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        write_test_zip(
            &archive,
            &[("../escape.txt", b"nope"), ("safe.txt", b"ok")],
        );

        let dest = dir.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        extract_zip("test", &archive, &dest).unwrap();

        assert!(dest.join("safe.txt").is_file());
        assert!(!dir.path().join("escape.txt").exists());
    }
}
