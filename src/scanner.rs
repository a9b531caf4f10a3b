use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::error::ScanError;
use crate::types::ScanMode;

/// Something that can produce a raw nmap-style text report for a target.
///
/// The HTTP layer only talks to this trait, so tests can swap the subprocess out.
#[async_trait]
pub trait PortScanner: Send + Sync {
    async fn scan(&self, target: &str, mode: ScanMode) -> Result<String, ScanError>;
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Path or name of the nmap executable.
    pub binary: PathBuf,
    /// How many nmap processes may run at once. Extra requests wait for a slot.
    pub max_concurrent: usize,
    /// Wall-clock limit per process, `None` for no limit.
    pub timeout: Option<Duration>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("nmap"),
            max_concurrent: 4,
            timeout: Some(Duration::from_secs(600)),
        }
    }
}

/// Runs the real `nmap` binary, one process per call.
///
/// - Admission is bounded by a `Semaphore` sized from `max_concurrent`.
/// - Each run is bounded by `timeout`; the child is killed when it expires.
/// - The child is spawned with `kill_on_drop`, so dropping the future (client went away)
///   also terminates the process.
#[derive(Debug, Clone)]
pub struct NmapScanner {
    binary: PathBuf,
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
}

impl NmapScanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            binary: config.binary,
            permits: Arc::new(Semaphore::new(config.max_concurrent.clamp(1, 256))),
            timeout: config.timeout,
        }
    }

    #[cfg(test)]
    fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// First line of `nmap --version`, used at startup to check the binary is usable.
    pub async fn version(&self) -> Result<String, ScanError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.launch_error(e))?;
        if !output.status.success() {
            return Err(ScanError::Execution(format!(
                "{} --version exited with {}",
                self.binary.display(),
                output.status
            )));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn command(&self, target: &str, mode: ScanMode) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(mode.nmap_args())
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn launch_error(&self, e: io::Error) -> ScanError {
        ScanError::Execution(format!("failed to launch {}: {e}", self.binary.display()))
    }
}

#[async_trait]
impl PortScanner for NmapScanner {
    async fn scan(&self, target: &str, mode: ScanMode) -> Result<String, ScanError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ScanError::Execution("scanner is shutting down".into()))?;

        let mut cmd = self.command(target, mode);
        debug!(?cmd, "spawning nmap");
        let start = Instant::now();
        let child = cmd.spawn().map_err(|e| self.launch_error(e))?;

        let output = await_output(child.wait_with_output(), self.timeout).await?;
        info!(
            host = target,
            mode = mode.as_str(),
            elapsed = ?start.elapsed(),
            status = %output.status,
            "nmap finished"
        );
        check_output(&self.binary, output)
    }
}

/// Wait for the child with an optional deadline. On expiry the future, and with it the
/// child, is dropped.
async fn await_output<F>(waiting: F, timeout: Option<Duration>) -> Result<Output, ScanError>
where
    F: Future<Output = io::Result<Output>>,
{
    let res = match timeout {
        Some(limit) => time::timeout(limit, waiting)
            .await
            .map_err(|_| ScanError::Timeout(limit))?,
        None => waiting.await,
    };
    res.map_err(|e| ScanError::Execution(format!("failed to collect nmap output: {e}")))
}

/// Anything on stderr counts as a failed scan, as does a non-zero exit.
fn check_output(binary: &std::path::Path, output: Output) -> Result<String, ScanError> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return Err(ScanError::Execution(stderr.to_string()));
    }
    if !output.status.success() {
        return Err(ScanError::Execution(format!(
            "{} exited with {}",
            binary.display(),
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
