//! Extraction engine
//!
//! [`Engine`] ties the pieces together: it bootstraps the bundled runtime
//! once, spawns one extraction-tool process per request, captures both
//! output streams concurrently, reports progress through the caller's
//! callback, and classifies the outcome. Requests registered under an
//! identifier can be cancelled from any task via [`Engine::cancel`].

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::bootstrap::{self, RuntimePaths};
use crate::config::{CancelPolicy, Config};
use crate::error::{BootstrapError, Error, Result};
use crate::progress::ProgressCallback;
use crate::registry::{ProcessHandle, ProcessRegistry};
use crate::request::Request;
use crate::stream;
use crate::types::{MediaInfo, Response};

/// Orchestrator for extraction-tool subprocesses
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct Engine {
    config: Config,
    runtime: OnceLock<RuntimePaths>,
    registry: ProcessRegistry,
}

impl Engine {
    /// Create an engine; no process can run until [`Engine::init`] succeeds
    pub fn new(config: Config) -> Self {
        Self {
            config,
            runtime: OnceLock::new(),
            registry: ProcessRegistry::new(),
        }
    }

    /// Bootstrap the bundled runtime described by the configuration
    ///
    /// Idempotent: once a bootstrap has succeeded, later calls return
    /// immediately. Fails with [`BootstrapError::MissingConfig`] when the
    /// configuration carries no bootstrap section.
    pub async fn init(&self) -> Result<()> {
        if self.runtime.get().is_some() {
            return Ok(());
        }

        let bootstrap_config = self
            .config
            .bootstrap
            .clone()
            .ok_or(Error::Bootstrap(BootstrapError::MissingConfig))?;

        let paths = tokio::task::spawn_blocking(move || bootstrap::init(&bootstrap_config))
            .await
            .map_err(|e| Error::Interrupted(e.to_string()))??;

        // A racing init may have won; either winner carries the same paths.
        let _ = self.runtime.set(paths);
        Ok(())
    }

    /// Install pre-resolved runtime paths, skipping the bootstrap
    ///
    /// For hosts that already carry a runtime (see
    /// [`RuntimePaths::from_system`]). No-op if the engine is initialized.
    pub fn init_with_paths(&self, paths: RuntimePaths) {
        let _ = self.runtime.set(paths);
    }

    /// Whether a runtime is installed and processes can be spawned
    pub fn is_initialized(&self) -> bool {
        self.runtime.get().is_some()
    }

    /// Run one extraction-tool invocation to completion
    ///
    /// When `id` is provided the process is registered under it for the
    /// whole run and can be cancelled concurrently. The callback receives
    /// one parsed sample per stdout line. On a nonzero exit the outcome is
    /// classified: a registered id that disappeared mid-flight means the
    /// request was cancelled; a JSON dump run with `--ignore-errors` that
    /// still produced output counts as success; anything else is a failure
    /// carrying the captured stderr.
    pub async fn execute(
        &self,
        mut request: Request,
        id: Option<&str>,
        callback: Option<ProgressCallback>,
    ) -> Result<Response> {
        let runtime = self.runtime.get().ok_or(Error::NotInitialized)?;

        if let Some(id) = id {
            if self.registry.is_registered(id).await {
                return Err(Error::DuplicateRequest { id: id.to_string() });
            }
        }

        self.normalize(&mut request, runtime);

        let args = request.build_command();
        let mut command_line = Vec::with_capacity(args.len() + 2);
        command_line.push(runtime.interpreter.display().to_string());
        command_line.push(runtime.tool_script.display().to_string());
        command_line.extend(args.iter().cloned());

        debug!(?command_line, ?id, "spawning extraction process");
        let started = Instant::now();
        let mut child = self.spawn(runtime, &args)?;

        if let Some(id) = id {
            if let Err(e) = self
                .registry
                .register(id, ProcessHandle::new(child.id()))
                .await
            {
                // Lost a registration race after the pre-check
                child.start_kill().ok();
                return Err(e);
            }
        }

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            _ => {
                child.start_kill().ok();
                self.unregister(id).await;
                return Err(Error::ProcessStart(std::io::Error::other(
                    "child process streams were not piped",
                )));
            }
        };

        let stdout_task = tokio::spawn(stream::extract(stdout, callback));
        let stderr_task = tokio::spawn(stream::gobble(stderr));

        let (out, err_text) = match (stdout_task.await, stderr_task.await) {
            (Ok(out), Ok(err_text)) => (out, err_text),
            (out_res, err_res) => {
                let reason = out_res
                    .err()
                    .or(err_res.err())
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                child.start_kill().ok();
                self.unregister(id).await;
                return Err(Error::Interrupted(reason));
            }
        };

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                child.start_kill().ok();
                self.unregister(id).await;
                return Err(Error::Interrupted(e.to_string()));
            }
        };

        // None means the process died to a signal
        let exit_code = status.code().unwrap_or(-1);
        let elapsed = started.elapsed();
        debug!(exit_code, ?elapsed, ?id, "extraction process finished");

        if exit_code != 0 {
            if let Some(id) = id {
                if !self.registry.is_registered(id).await {
                    info!(id, "extraction ended by cancellation");
                    return Err(Error::Cancelled { id: id.to_string() });
                }
            }
            self.unregister(id).await;

            // A metadata dump with --ignore-errors can exit nonzero for
            // items it skipped while still producing the records we need.
            let dump_with_output = request.has_option("--dump-json")
                && request.has_option("--ignore-errors")
                && !out.is_empty();
            if !dump_with_output {
                return Err(Error::ExtractionFailed { stderr: err_text });
            }
        } else {
            self.unregister(id).await;
        }

        Ok(Response {
            command: command_line,
            exit_code,
            elapsed,
            output: out,
        })
    }

    /// Fetch structured metadata for a single URL without downloading it
    pub async fn fetch_info(&self, url: &str) -> Result<MediaInfo> {
        let mut request = Request::new(url);
        request.add_option("--dump-json");

        let id = format!("info-{}", now_millis());
        let response = self.execute(request, Some(&id), None).await?;

        if response.output.trim().is_empty() {
            return Err(Error::Parse("tool produced no metadata output".to_string()));
        }

        let mut info: MediaInfo = serde_json::from_str(response.output.trim())
            .map_err(|e| Error::Parse(e.to_string()))?;
        if let Some(thumbnail) = info.thumbnail.take() {
            info.thumbnail = Some(upgrade_to_https(thumbnail));
        }
        Ok(info)
    }

    /// Download a URL into the configured download directory
    ///
    /// Registers the process under `id` so it can be cancelled; forwards
    /// every stdout line to `callback` when one is given.
    pub async fn download(
        &self,
        url: &str,
        id: &str,
        callback: Option<ProgressCallback>,
    ) -> Result<Response> {
        let runtime = self.runtime.get().ok_or(Error::NotInitialized)?;

        let mut request = Request::new(url);
        request.add_option("--no-mtime");
        if self.config.use_accelerator {
            request.add_option_arg("--downloader", runtime.aria2c.display().to_string());
        }
        let template = self.config.download_dir.join(&self.config.output_template);
        request.add_option_arg("-o", template.display().to_string());

        self.execute(request, Some(id), callback).await
    }

    /// Cancel the in-flight request registered under `id`
    ///
    /// Returns whether an entry was removed. Under
    /// [`CancelPolicy::MarkOnly`] the process keeps running and its eventual
    /// nonzero exit is reported as [`Error::Cancelled`]; under
    /// [`CancelPolicy::Kill`] the process is also killed immediately.
    pub async fn cancel(&self, id: &str) -> bool {
        let Some(handle) = self.registry.unregister(id).await else {
            debug!(id, "cancel requested for unknown id");
            return false;
        };

        info!(id, pid = ?handle.pid, policy = ?self.config.cancel_policy, "cancelling request");
        if self.config.cancel_policy == CancelPolicy::Kill {
            if let Some(pid) = handle.pid {
                kill_process(pid);
            }
        }
        true
    }

    /// Number of requests currently in flight
    pub async fn in_flight(&self) -> usize {
        self.registry.len().await
    }

    /// Apply the invocation-independent options every run gets
    fn normalize(&self, request: &mut Request, runtime: &RuntimePaths) {
        if !request.has_option("--cache-dir") {
            request.add_option("--no-cache-dir");
        }

        let aria2c_path = runtime.aria2c.display().to_string();
        if request.build_command().contains(&aria2c_path) {
            request.add_option_arg(
                "--external-downloader-args",
                "aria2c:--summary-interval=1 --file-allocation=none",
            );
            if let Some(cert) = &runtime.ssl_cert_file {
                request.add_option_arg(
                    "--external-downloader-args",
                    format!("aria2c:--ca-certificate={}", cert.display()),
                );
            }
        }

        request.add_option_arg("--ffmpeg-location", runtime.ffmpeg.display().to_string());
    }

    fn spawn(&self, runtime: &RuntimePaths, args: &[String]) -> Result<Child> {
        let mut command = Command::new(&runtime.interpreter);
        command
            .arg(&runtime.tool_script)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ld) = &runtime.ld_library_path {
            command.env("LD_LIBRARY_PATH", ld);
        }
        if let Some(cert) = &runtime.ssl_cert_file {
            command.env("SSL_CERT_FILE", cert);
        }
        if let Some(home) = &runtime.python_home {
            command.env("PYTHONHOME", home);
            command.env("HOME", home);
        }
        if let Some(tmp) = &runtime.tmp_dir {
            command.env("TMPDIR", tmp);
        }
        let path = std::env::var("PATH").unwrap_or_default();
        command.env(
            "PATH",
            format!("{}:{}", path, runtime.install_dir.display()),
        );

        command.spawn().map_err(Error::ProcessStart)
    }

    async fn unregister(&self, id: Option<&str>) {
        if let Some(id) = id {
            self.registry.unregister(id).await;
        }
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

fn upgrade_to_https(url: String) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url,
    }
}

#[cfg(unix)]
fn kill_process(pid: u32) {
    // SAFETY: plain syscall on a pid we spawned; worst case the pid is
    // already gone and kill returns ESRCH.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        warn!(pid, "kill failed, process may have already exited");
    }
}

#[cfg(not(unix))]
fn kill_process(pid: u32) {
    warn!(pid, "kill-on-cancel is not supported on this platform");
}
