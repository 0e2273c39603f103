//! Thumbnail generation through an external converter process.
//!
//! The converter reads the first frame of the source, fits it into the
//! configured bounding box, strips metadata and writes a PNG. Output always
//! goes to a per-invocation temporary file next to the final cache entry;
//! the queue renames it into place once the process succeeds.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use flume::{Receiver, Sender};
use tokio::process::{Child, Command};
use tracing::{debug, trace, warn};

use super::queue::{JobEvent, JobId};

/// A fully resolved converter invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// File the converter writes.
    pub temp: PathBuf,
    /// Final cache path.
    pub target: PathBuf,
}

impl ConvertCommand {
    pub fn new(
        program: &Path,
        thumb_box: (u32, u32),
        source: &Path,
        target: &Path,
        job: JobId,
    ) -> Self {
        let temp = temp_path(target, job);

        let mut first_frame = source.as_os_str().to_os_string();
        first_frame.push("[0]");

        let args = vec![
            first_frame,
            OsString::from("-thumbnail"),
            OsString::from(format!("{}x{}>", thumb_box.0, thumb_box.1)),
            OsString::from("-strip"),
            temp.as_os_str().to_os_string(),
        ];

        Self {
            program: program.to_path_buf(),
            args,
            temp,
            target: target.to_path_buf(),
        }
    }
}

/// Temporary output path for one converter run.
///
/// The suffix carries the process id, a nanosecond timestamp and the job id,
/// so concurrent jobs for the same cache key never share a file.
pub fn temp_path(target: &Path, job: JobId) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(
        "{}.{}-{}-{}.tmp.png",
        stem,
        std::process::id(),
        nanos,
        job.0
    ))
}

/// Signals the queue can send to a running converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Ask the process to exit (SIGTERM on unix).
    Terminate,
    /// Force the process down.
    Kill,
}

/// Queue-side handle of a running converter.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    signals: Sender<Signal>,
    exited: Arc<AtomicBool>,
}

/// Spawner-side counterpart of a `ProcessHandle`.
#[derive(Debug)]
pub struct ProcessControl {
    pub signals: Receiver<Signal>,
    /// Set by the spawner once the process is gone.
    pub exited: Arc<AtomicBool>,
}

impl ProcessHandle {
    pub fn new(pid: Option<u32>) -> (Self, ProcessControl) {
        let (tx, rx) = flume::unbounded();
        let exited = Arc::new(AtomicBool::new(false));
        let handle = Self {
            pid,
            signals: tx,
            exited: Arc::clone(&exited),
        };
        (handle, ProcessControl { signals: rx, exited })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// Send a graceful termination now and a forced kill after `grace` if the
    /// process is still alive by then. Must be called inside a tokio runtime.
    pub fn terminate(&self, grace: Duration) {
        if self.has_exited() {
            return;
        }
        let _ = self.signals.send(Signal::Terminate);

        let signals = self.signals.clone();
        let exited = Arc::clone(&self.exited);
        let pid = self.pid;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if !exited.load(Ordering::Acquire) {
                debug!(?pid, "Converter ignored termination, killing");
                let _ = signals.send(Signal::Kill);
            }
        });
    }
}

/// Starts converter processes and reports their exit on `exits`.
pub trait ProcessSpawner {
    fn spawn(
        &self,
        job: JobId,
        command: &ConvertCommand,
        exits: Sender<JobEvent>,
    ) -> std::io::Result<ProcessHandle>;
}

/// Spawner backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl ProcessSpawner for TokioSpawner {
    fn spawn(
        &self,
        job: JobId,
        command: &ConvertCommand,
        exits: Sender<JobEvent>,
    ) -> std::io::Result<ProcessHandle> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let (handle, control) = ProcessHandle::new(child.id());
        trace!(job = job.0, pid = ?handle.pid(), "Spawned converter");
        tokio::spawn(watch_child(job, child, control, exits));
        Ok(handle)
    }
}

async fn watch_child(job: JobId, mut child: Child, control: ProcessControl, exits: Sender<JobEvent>) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            signal = control.signals.recv_async() => match signal {
                Ok(signal) => deliver(&mut child, signal),
                Err(_) => break child.wait().await,
            },
        }
    };
    control.exited.store(true, Ordering::Release);

    let success = match status {
        Ok(status) => status.success(),
        Err(e) => {
            warn!(job = job.0, error = %e, "Failed to wait for converter");
            false
        }
    };
    let _ = exits.send(JobEvent::Exited { job, success });
}

fn deliver(child: &mut Child, signal: Signal) {
    match signal {
        Signal::Terminate => terminate_gracefully(child),
        Signal::Kill => {
            if let Err(e) = child.start_kill() {
                warn!(pid = ?child.id(), error = %e, "Failed to kill converter");
            }
        }
    }
}

#[cfg(unix)]
fn terminate_gracefully(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: plain syscall on a pid we own; a stale pid only yields ESRCH.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            debug!(pid, "SIGTERM not delivered");
        }
    }
}

#[cfg(not(unix))]
fn terminate_gracefully(child: &mut Child) {
    let _ = child.start_kill();
}
