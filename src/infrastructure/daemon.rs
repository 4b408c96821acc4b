//! FIFO-driven run coordinator.
//!
//! The daemon fires scheduler bursts back-to-back with zero delay and blocks
//! only when the run pauses for human input. While paused it waits on a named
//! pipe at `.covenant/dispatch`; any external process can write a line there
//! to wake it. Two safeguards bound the wait: a short health-check tier that
//! logs liveness, and a long `max_idle` tier after which the daemon gives up
//! and exits so a dead run never holds a terminal hostage.
//!
//! Coordination is filesystem-only on purpose. The FIFO, the pid file, and
//! the shutdown sentinel mean `status`, `signal`, and `stop` work from any
//! process with no socket or daemon protocol involved.

use std::fs::{self, OpenOptions};
use std::io::{self, Read as _, Write as _};
use std::os::fd::AsFd;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::libc;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::kill;
use nix::sys::stat::Mode;
use nix::unistd::{mkfifo, Pid};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::models::{DaemonConfig, RunState, RunStatus};
use crate::infrastructure::project::STATE_DIR_NAME;
use crate::services::scheduler::Scheduler;

/// Named pipe the daemon listens on while paused.
pub const FIFO_NAME: &str = "dispatch";

/// File holding the daemon's process id.
pub const PID_FILE: &str = "daemon.pid";

/// Sentinel file that asks the daemon to exit between phases.
pub const SHUTDOWN_SENTINEL: &str = "shutdown";

/// Liveness report for a project's daemon.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DaemonHealth {
    pub alive: bool,
    pub pid: Option<i32>,
    pub fifo_exists: bool,
}

/// Event-driven coordinator: dispatches phases immediately, blocks only on
/// human input.
pub struct Daemon {
    scheduler: Scheduler,
    fifo_path: PathBuf,
    pid_path: PathBuf,
    shutdown_path: PathBuf,
    health_check_interval: u64,
    max_idle: u64,
}

impl Daemon {
    pub fn new(scheduler: Scheduler, config: &DaemonConfig) -> Self {
        let state_dir = scheduler.store().state_dir().to_path_buf();
        Self {
            scheduler,
            fifo_path: state_dir.join(FIFO_NAME),
            pid_path: state_dir.join(PID_FILE),
            shutdown_path: state_dir.join(SHUTDOWN_SENTINEL),
            health_check_interval: config.health_check_interval,
            max_idle: config.max_idle,
        }
    }

    /// Path of the dispatch FIFO this daemon listens on.
    pub fn fifo_path(&self) -> &Path {
        &self.fifo_path
    }

    /// Run the dispatch loop to completion. The FIFO and pid file exist for
    /// exactly the lifetime of this call.
    pub async fn run(&self) -> PipelineResult<RunState> {
        self.ensure_fifo()?;
        fs::write(&self.pid_path, std::process::id().to_string())?;
        // A sentinel left behind by a previous run must not kill this one.
        if self.shutdown_path.exists() {
            fs::remove_file(&self.shutdown_path)?;
        }

        let result = self.dispatch_loop().await;
        self.cleanup();
        result
    }

    async fn dispatch_loop(&self) -> PipelineResult<RunState> {
        loop {
            let mut state = self.scheduler.store().load_state()?;

            // The sentinel is only honored between phases so a burst is
            // never cut off halfway.
            if self.check_shutdown() {
                info!("shutdown requested, exiting cleanly between phases");
                state.pause("Shutdown requested");
                self.scheduler.store().save_state(&state)?;
                self.scheduler
                    .store()
                    .append_audit("daemon_shutdown", "Clean shutdown between phases")?;
                return Ok(state);
            }

            if state.status.is_terminal() {
                info!(status = state.status.as_str(), "run terminal");
                return Ok(state);
            }

            if state.status == RunStatus::Paused {
                info!(reason = %state.pause_reason, "paused, waiting for signal on FIFO");
                let Some(signal_msg) = self.wait_for_signal().await? else {
                    error!(
                        max_idle = self.max_idle,
                        "timed out waiting for input, exiting"
                    );
                    state
                        .pause_reason
                        .push_str(" [DAEMON TIMED OUT - manual resume required]");
                    self.scheduler.store().save_state(&state)?;
                    return Ok(state);
                };

                info!(signal = %signal_msg, "received signal");
                if signal_msg == "shutdown" {
                    state.pause_reason = "Shutdown requested".to_string();
                    self.scheduler.store().save_state(&state)?;
                    self.scheduler
                        .store()
                        .append_audit("daemon_shutdown", "Clean shutdown via FIFO signal")?;
                    return Ok(state);
                }

                state.resume();
                self.scheduler.store().save_state(&state)?;
                self.scheduler
                    .store()
                    .append_audit("daemon_resume", &format!("Signal: {signal_msg}"))?;
                continue;
            }

            // Active: fire the next phase immediately, no sleep.
            info!(phase = state.phase.as_str(), "dispatching phase");
            self.scheduler
                .store()
                .append_audit("daemon_dispatch", &format!("Phase: {}", state.phase))?;

            match timeout(
                Duration::from_secs(self.max_idle),
                self.scheduler.run_once(),
            )
            .await
            {
                Ok(burst) => {
                    let after = burst?;
                    info!(
                        phase = after.phase.as_str(),
                        status = after.status.as_str(),
                        cost_usd = after.total_cost_usd,
                        "phase complete"
                    );
                }
                Err(_) => {
                    error!(
                        phase = state.phase.as_str(),
                        max_idle = self.max_idle,
                        "phase timed out"
                    );
                    state.fail(format!(
                        "Phase {} timed out after {}s",
                        state.phase, self.max_idle
                    ));
                    self.scheduler.store().save_state(&state)?;
                    return Ok(state);
                }
            }
        }
    }

    async fn wait_for_signal(&self) -> PipelineResult<Option<String>> {
        let fifo_path = self.fifo_path.clone();
        let health_check_interval = self.health_check_interval;
        let max_idle = self.max_idle;
        tokio::task::spawn_blocking(move || {
            blocking_wait(&fifo_path, health_check_interval, max_idle)
        })
        .await
        .map_err(|err| PipelineError::Daemon(format!("signal wait task failed: {err}")))?
    }

    fn check_shutdown(&self) -> bool {
        if self.shutdown_path.exists() {
            if let Err(err) = fs::remove_file(&self.shutdown_path) {
                warn!(%err, "could not remove shutdown sentinel");
            }
            return true;
        }
        false
    }

    fn ensure_fifo(&self) -> PipelineResult<()> {
        if let Some(parent) = self.fifo_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Ok(meta) = fs::symlink_metadata(&self.fifo_path) {
            if meta.file_type().is_fifo() {
                return Ok(());
            }
            // A regular file squatting on the path gets replaced.
            fs::remove_file(&self.fifo_path)?;
        }
        mkfifo(&self.fifo_path, Mode::from_bits_truncate(0o644)).map_err(|err| {
            PipelineError::Daemon(format!(
                "mkfifo {} failed: {err}",
                self.fifo_path.display()
            ))
        })?;
        info!(path = %self.fifo_path.display(), "created FIFO");
        Ok(())
    }

    fn cleanup(&self) {
        for path in [&self.fifo_path, &self.pid_path] {
            if path.exists() {
                if let Err(err) = fs::remove_file(path) {
                    warn!(path = %path.display(), %err, "daemon cleanup failed");
                }
            }
        }
    }
}

/// Blocking FIFO read with a two-tier timeout: wake and log every
/// `health_check_interval` seconds, give up after `max_idle` seconds.
///
/// The pipe is held open read-write for the whole wait. The write half is
/// never used; holding it keeps the pipe from reporting EOF between external
/// writers, and guarantees a sender's non-blocking open always finds a
/// reader while the daemon is actually waiting.
fn blocking_wait(
    fifo_path: &Path,
    health_check_interval: u64,
    max_idle: u64,
) -> PipelineResult<Option<String>> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(fifo_path)?;

    let start = Instant::now();
    let deadline = Duration::from_secs(max_idle);
    let tier_one = Duration::from_secs(health_check_interval.max(1));

    loop {
        let elapsed = start.elapsed();
        if elapsed >= deadline {
            return Ok(None);
        }
        let remaining = tier_one.min(deadline - elapsed);
        let millis = u16::try_from(remaining.as_millis()).unwrap_or(u16::MAX);

        let ready = {
            let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::from(millis)) {
                Ok(n) => n,
                Err(Errno::EINTR) => 0,
                Err(err) => {
                    return Err(PipelineError::Daemon(format!(
                        "poll on dispatch FIFO failed: {err}"
                    )))
                }
            }
        };

        if ready > 0 {
            let mut buf = [0u8; 4096];
            match file.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    return Ok(Some(String::from_utf8_lossy(&buf[..n]).trim().to_string()))
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => return Err(err.into()),
            }
        }

        debug!(
            elapsed_secs = start.elapsed().as_secs(),
            "still waiting for dispatch signal"
        );
    }
}

/// Write a message to a project's dispatch FIFO.
///
/// Returns true if a daemon was listening, false when the FIFO is missing,
/// is not actually a FIFO, or has no reader.
pub fn send_signal(project_dir: impl AsRef<Path>, message: &str) -> PipelineResult<bool> {
    let fifo_path = project_dir
        .as_ref()
        .join(STATE_DIR_NAME)
        .join(FIFO_NAME);
    let Ok(meta) = fs::symlink_metadata(&fifo_path) else {
        return Ok(false);
    };
    if !meta.file_type().is_fifo() {
        return Ok(false);
    }

    let mut file = match OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(&fifo_path)
    {
        Ok(f) => f,
        // No reader on the pipe means no daemon.
        Err(err) if err.raw_os_error() == Some(libc::ENXIO) => return Ok(false),
        Err(err) => return Err(err.into()),
    };
    file.write_all(format!("{message}\n").as_bytes())?;
    Ok(true)
}

/// Drop the shutdown sentinel so a running daemon exits between phases.
pub fn request_shutdown(project_dir: impl AsRef<Path>) -> PipelineResult<()> {
    let state_dir = project_dir.as_ref().join(STATE_DIR_NAME);
    fs::create_dir_all(&state_dir)?;
    fs::write(state_dir.join(SHUTDOWN_SENTINEL), b"")?;
    Ok(())
}

/// Inspect pid file and FIFO to tell whether a daemon is alive.
pub fn check_daemon_health(project_dir: impl AsRef<Path>) -> DaemonHealth {
    let state_dir = project_dir.as_ref().join(STATE_DIR_NAME);
    let mut health = DaemonHealth::default();

    if let Ok(meta) = fs::symlink_metadata(state_dir.join(FIFO_NAME)) {
        health.fifo_exists = meta.file_type().is_fifo();
    }
    if let Ok(raw) = fs::read_to_string(state_dir.join(PID_FILE)) {
        if let Ok(pid) = raw.trim().parse::<i32>() {
            health.pid = Some(pid);
            // Signal 0 probes for existence without sending anything.
            health.alive = kill(Pid::from_raw(pid), None).is_ok();
        }
    }
    health
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_fifo(dir: &Path) -> PathBuf {
        let state_dir = dir.join(STATE_DIR_NAME);
        fs::create_dir_all(&state_dir).unwrap();
        let path = state_dir.join(FIFO_NAME);
        mkfifo(&path, Mode::from_bits_truncate(0o644)).unwrap();
        path
    }

    #[test]
    fn test_send_signal_without_fifo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!send_signal(dir.path(), "resume").unwrap());
    }

    #[test]
    fn test_send_signal_rejects_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join(STATE_DIR_NAME);
        fs::create_dir_all(&state_dir).unwrap();
        fs::write(state_dir.join(FIFO_NAME), "not a fifo").unwrap();
        assert!(!send_signal(dir.path(), "resume").unwrap());
    }

    #[test]
    fn test_send_signal_without_reader() {
        let dir = tempfile::tempdir().unwrap();
        make_fifo(dir.path());
        // FIFO exists but nobody holds the read end open.
        assert!(!send_signal(dir.path(), "resume").unwrap());
    }

    #[test]
    fn test_health_with_no_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let health = check_daemon_health(dir.path());
        assert!(!health.alive);
        assert!(!health.fifo_exists);
        assert_eq!(health.pid, None);
    }

    #[test]
    fn test_health_sees_stale_pid() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join(STATE_DIR_NAME);
        fs::create_dir_all(&state_dir).unwrap();
        // Far above any real pid_max, so the probe must fail.
        fs::write(state_dir.join(PID_FILE), "999999999").unwrap();
        let health = check_daemon_health(dir.path());
        assert_eq!(health.pid, Some(999_999_999));
        assert!(!health.alive);
    }

    #[test]
    fn test_health_sees_live_pid() {
        let dir = tempfile::tempdir().unwrap();
        make_fifo(dir.path());
        let state_dir = dir.path().join(STATE_DIR_NAME);
        fs::write(
            state_dir.join(PID_FILE),
            std::process::id().to_string(),
        )
        .unwrap();
        let health = check_daemon_health(dir.path());
        assert!(health.alive);
        assert!(health.fifo_exists);
    }

    #[test]
    fn test_blocking_wait_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = make_fifo(dir.path());
        let start = Instant::now();
        let result = blocking_wait(&fifo, 1, 1).unwrap();
        assert_eq!(result, None);
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_blocking_wait_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = make_fifo(dir.path());
        let project_dir = dir.path().to_path_buf();

        let reader = std::thread::spawn(move || blocking_wait(&fifo, 1, 10));
        // Give the reader time to open the pipe, then signal it.
        std::thread::sleep(Duration::from_millis(200));
        assert!(send_signal(&project_dir, "resume").unwrap());

        let msg = reader.join().unwrap().unwrap();
        assert_eq!(msg.as_deref(), Some("resume"));
    }

    #[test]
    fn test_request_shutdown_creates_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        request_shutdown(dir.path()).unwrap();
        assert!(dir
            .path()
            .join(STATE_DIR_NAME)
            .join(SHUTDOWN_SENTINEL)
            .exists());
    }
}
