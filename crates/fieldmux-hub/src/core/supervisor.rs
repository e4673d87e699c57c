//! Generic bounded-restart child process supervisor (C10).
//!
//! Both the SRT link receiver (C2) and the media relay (C4) are
//! instantiations of this: spawn a child, watch it exit, restart with a
//! backoff up to a cap, and support a graceful SIGTERM-then-SIGKILL stop.
//! If the child binary can't be found on `PATH`, the supervisor runs in
//! "simulated mode" instead of failing outright — the control plane stays
//! observable without the media toolchain installed.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

const DEFAULT_MAX_RESTARTS: u32 = 10;
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Parameters for a supervised child process.
#[derive(Debug, Clone)]
pub struct SupervisorSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub max_restarts: u32,
    pub restart_backoff: Duration,
    pub grace_period: Duration,
}

impl SupervisorSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            max_restarts: DEFAULT_MAX_RESTARTS,
            restart_backoff: Duration::from_secs(1),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

/// Shared, externally observable status of a supervised process.
#[derive(Debug, Default)]
struct Shared {
    active: AtomicBool,
    restarts: AtomicU32,
    permanently_failed: AtomicBool,
    simulated: AtomicBool,
}

/// A handle to a running (or simulated) supervised child process.
pub struct Supervisor {
    spec: SupervisorSpec,
    shared: Arc<Shared>,
    stopping: Arc<AtomicBool>,
    notify: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

/// Point-in-time status of a supervised process, as reported by `status()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorStatus {
    pub active: bool,
    pub restarts: u32,
    pub permanently_failed: bool,
    pub simulated: bool,
}

fn binary_exists(program: &str) -> bool {
    if program.contains('/') {
        return std::path::Path::new(program).is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join(program).is_file())
        })
        .unwrap_or(false)
}

impl Supervisor {
    /// Start supervising the child described by `spec`. Returns immediately;
    /// the supervision loop runs on a spawned task.
    pub fn start(spec: SupervisorSpec) -> Self {
        let shared = Arc::new(Shared::default());
        let stopping = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());

        let task = tokio::spawn(run(
            spec.clone(),
            shared.clone(),
            stopping.clone(),
            notify.clone(),
        ));

        Self {
            spec,
            shared,
            stopping,
            notify,
            task: Some(task),
        }
    }

    /// Stop the supervised process: SIGTERM, grace period, then SIGKILL.
    /// Idempotent — calling it twice is a no-op the second time.
    pub async fn stop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn status(&self) -> SupervisorStatus {
        SupervisorStatus {
            active: self.shared.active.load(Ordering::SeqCst),
            restarts: self.shared.restarts.load(Ordering::SeqCst),
            permanently_failed: self.shared.permanently_failed.load(Ordering::SeqCst),
            simulated: self.shared.simulated.load(Ordering::SeqCst),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

async fn run(
    spec: SupervisorSpec,
    shared: Arc<Shared>,
    stopping: Arc<AtomicBool>,
    notify: Arc<Notify>,
) {
    if !binary_exists(&spec.program) {
        shared.simulated.store(true, Ordering::SeqCst);
        shared.active.store(false, Ordering::SeqCst);
        tracing::warn!(name = %spec.name, program = %spec.program, "binary not found — running in simulated mode");
        notify.notified().await;
        return;
    }

    loop {
        if stopping.load(Ordering::SeqCst) {
            return;
        }

        let mut child = match Command::new(&spec.program)
            .args(&spec.args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(name = %spec.name, error = %e, "failed to spawn child");
                let restarts = shared.restarts.fetch_add(1, Ordering::SeqCst) + 1;
                if restarts > spec.max_restarts {
                    shared.permanently_failed.store(true, Ordering::SeqCst);
                    tracing::error!(name = %spec.name, "restart cap exceeded, giving up");
                    return;
                }
                tokio::time::sleep(spec.restart_backoff).await;
                continue;
            }
        };

        shared.active.store(true, Ordering::SeqCst);
        tracing::info!(name = %spec.name, pid = ?child.id(), "child started");
        let pid = child.id();

        tokio::select! {
            status = child.wait() => {
                shared.active.store(false, Ordering::SeqCst);
                tracing::warn!(name = %spec.name, ?status, "child exited");
                if stopping.load(Ordering::SeqCst) {
                    return;
                }
                let restarts = shared.restarts.fetch_add(1, Ordering::SeqCst) + 1;
                if restarts > spec.max_restarts {
                    shared.permanently_failed.store(true, Ordering::SeqCst);
                    tracing::error!(name = %spec.name, "restart cap exceeded, giving up");
                    return;
                }
                tokio::time::sleep(spec.restart_backoff).await;
            }
            _ = notify.notified() => {
                if let Some(pid) = pid {
                    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM); }
                }
                if tokio::time::timeout(spec.grace_period, child.wait()).await.is_err() {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
                shared.active.store(false, Ordering::SeqCst);
                tracing::info!(name = %spec.name, "child stopped");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_exists_finds_sh_on_path() {
        assert!(binary_exists("sh") || binary_exists("/bin/sh"));
    }

    #[test]
    fn binary_exists_rejects_nonsense() {
        assert!(!binary_exists("definitely-not-a-real-binary-xyz"));
    }

    #[tokio::test]
    async fn simulated_mode_when_binary_missing() {
        let spec = SupervisorSpec::new("test", "definitely-not-a-real-binary-xyz", vec![]);
        let mut sup = Supervisor::start(spec);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let status = sup.status();
        assert!(status.simulated);
        assert!(!status.active);
        sup.stop().await;
    }

    #[tokio::test]
    async fn real_child_reports_active_then_exits() {
        let spec = SupervisorSpec::new("test", "sleep", vec!["0.2".into()]);
        let mut sup = Supervisor::start(spec);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sup.status().active);
        tokio::time::sleep(Duration::from_millis(400)).await;
        sup.stop().await;
    }

    #[tokio::test]
    async fn stop_terminates_long_running_child_promptly() {
        let spec = SupervisorSpec::new("test", "sleep", vec!["30".into()]);
        let mut sup = Supervisor::start(spec);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sup.status().active);
        let start = std::time::Instant::now();
        sup.stop().await;
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!sup.status().active);
    }
}
