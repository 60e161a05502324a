/// Process execution and monitoring
///
/// One sandboxed child per call. The child leads its own process group, so
/// termination always covers every descendant that stayed in the group.
/// Exit is observed without reaping, the group is killed, and only then is
/// the leader reaped; the pid cannot be recycled while we still signal it.
use crate::config::types::{JudgeError, Result};
use crate::core::types::{LaunchRequest, ProcessOutcome, ProcessState};
use crate::exec::limiter::LivenessCheck;
use crate::exec::preexec::{prepare_child, ResourceLimits};
use crate::utils::output::{OutputCollector, OutputLimits};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Fixed search path for the sandboxed child
pub const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Seam between the orchestrator and the OS.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, request: &LaunchRequest, watchdog: &mut dyn LivenessCheck) -> Result<ProcessOutcome>;
}

/// Guarded lifecycle: `NotStarted -> Running -> {Completed, TimedOut, Killed}`
#[derive(Debug)]
pub struct Lifecycle {
    state: ProcessState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: ProcessState::NotStarted,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn advance(&mut self, next: ProcessState) -> Result<()> {
        let allowed = matches!(
            (self.state, next),
            (ProcessState::NotStarted, ProcessState::Running)
                | (ProcessState::Running, ProcessState::Completed)
                | (ProcessState::Running, ProcessState::TimedOut)
                | (ProcessState::Running, ProcessState::Killed)
        );
        if !allowed {
            return Err(JudgeError::Process(format!(
                "illegal process transition {:?} -> {:?}",
                self.state, next
            )));
        }
        log::debug!("Process state {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Process executor backed by fork/exec, rlimits and process groups
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    poll_interval: Duration,
    collection_timeout: Duration,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            collection_timeout: Duration::from_secs(2),
        }
    }
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn command(request: &LaunchRequest) -> Command {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .current_dir(&request.workdir)
            .env_clear()
            .env("PATH", SANDBOX_PATH)
            .env("HOME", &request.workdir)
            .env("TMPDIR", &request.workdir)
            .env("LANG", "C.UTF-8")
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        let limits = ResourceLimits::from_request(request);
        unsafe {
            cmd.pre_exec(move || prepare_child(&limits));
        }
        cmd
    }
}

impl ProcessRunner for ProcessExecutor {
    fn run(&self, request: &LaunchRequest, watchdog: &mut dyn LivenessCheck) -> Result<ProcessOutcome> {
        let mut lifecycle = Lifecycle::new();
        let collector = OutputCollector::new(OutputLimits {
            stdout_limit: request.output_limit_bytes,
            stderr_limit: request.output_limit_bytes,
            collection_timeout: self.collection_timeout,
        });

        let mut child = Self::command(request).spawn().map_err(|e| {
            JudgeError::Process(format!(
                "Failed to start {}: {}",
                request.program.display(),
                e
            ))
        })?;
        lifecycle.advance(ProcessState::Running)?;

        let pid = child.id() as libc::pid_t;
        let pending = collector.start(child.stdout.take(), child.stderr.take());
        let started = Instant::now();
        let hard_deadline = request.timeout + request.grace;
        watchdog.start();
        log::debug!("Started sandboxed pid {} (deadline {:?})", pid, hard_deadline);

        let mut watchdog_violation = None;
        let terminal = loop {
            match exited_without_reaping(pid) {
                Ok(true) => break ProcessState::Completed,
                Ok(false) => {}
                Err(e) => {
                    kill_group(pid);
                    let _ = reap(pid);
                    return Err(e);
                }
            }

            if started.elapsed() >= hard_deadline {
                log::warn!("pid {} exceeded hard deadline {:?}", pid, hard_deadline);
                break ProcessState::TimedOut;
            }

            if let Some(violation) = watchdog.check() {
                log::warn!("Watchdog stopping pid {}: {}", pid, violation.description);
                watchdog_violation = Some(violation);
                break ProcessState::Killed;
            }

            thread::sleep(self.poll_interval);
        };

        // Clears descendants on every path, including a normal exit.
        kill_group(pid);
        let reaped = reap(pid)?;
        let wall_time = started.elapsed();
        lifecycle.advance(terminal)?;

        let output = pending.finish();
        if let Some(bytes) = reaped.peak_memory_bytes {
            watchdog.record_peak_memory(bytes);
        }

        Ok(ProcessOutcome {
            state: lifecycle.state(),
            exit_code: reaped.exit_code,
            signal: reaped.signal,
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
            stdout_integrity: output.stdout_integrity,
            stderr_integrity: output.stderr_integrity,
            wall_time,
            peak_memory_bytes: reaped.peak_memory_bytes,
            watchdog_violation,
        })
    }
}

/// Whether `pid` has exited, leaving it waitable.
fn exited_without_reaping(pid: libc::pid_t) -> Result<bool> {
    let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
    let rc = unsafe {
        libc::waitid(
            libc::P_PID,
            pid as libc::id_t,
            &mut info,
            libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
        )
    };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(JudgeError::Process(format!("waitid({}) failed: {}", pid, err)));
    }
    Ok(unsafe { info.si_pid() } != 0)
}

fn kill_group(pgid: libc::pid_t) {
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => log::warn!("killpg({}) failed: {}", pgid, e),
    }
}

struct Reaped {
    exit_code: Option<i32>,
    signal: Option<i32>,
    peak_memory_bytes: Option<u64>,
}

/// Reap `pid` and read its resource usage.
fn reap(pid: libc::pid_t) -> Result<Reaped> {
    let mut status: libc::c_int = 0;
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };

    loop {
        let rc = unsafe { libc::wait4(pid, &mut status, 0, &mut usage) };
        if rc == pid {
            break;
        }
        let err = std::io::Error::last_os_error();
        if rc < 0 && err.kind() == std::io::ErrorKind::Interrupted {
            continue;
        }
        return Err(JudgeError::Process(format!("wait4({}) failed: {}", pid, err)));
    }

    let (exit_code, signal) = if libc::WIFEXITED(status) {
        (Some(libc::WEXITSTATUS(status)), None)
    } else if libc::WIFSIGNALED(status) {
        (None, Some(libc::WTERMSIG(status)))
    } else {
        (None, None)
    };

    // ru_maxrss is reported in KiB on Linux.
    let peak_memory_bytes = (usage.ru_maxrss > 0).then(|| usage.ru_maxrss as u64 * 1024);

    Ok(Reaped {
        exit_code,
        signal,
        peak_memory_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::OutputIntegrity;
    use crate::core::types::{Violation, ViolationCategory};
    use crate::exec::limiter::ResourceLimiter;
    use std::path::{Path, PathBuf};

    fn shell_request(script: &str, workdir: &Path, timeout: Duration) -> LaunchRequest {
        LaunchRequest {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), script.to_string()],
            workdir: workdir.to_path_buf(),
            timeout,
            grace: Duration::from_millis(200),
            memory_limit_bytes: 512 * 1024 * 1024,
            cpu_limit_secs: 10,
            output_limit_bytes: 1024,
            file_size_limit_bytes: 1024,
            open_files_limit: 64,
        }
    }

    fn has_shell() -> bool {
        Path::new("/bin/sh").exists()
    }

    fn run(script: &str, timeout: Duration) -> ProcessOutcome {
        let dir = tempfile::tempdir().unwrap();
        let mut limiter = ResourceLimiter::with_limit(Duration::from_secs(60));
        ProcessExecutor::new()
            .run(&shell_request(script, dir.path(), timeout), &mut limiter)
            .unwrap()
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut lifecycle = Lifecycle::new();
        assert!(lifecycle.advance(ProcessState::Completed).is_err());
        lifecycle.advance(ProcessState::Running).unwrap();
        lifecycle.advance(ProcessState::TimedOut).unwrap();
        assert!(lifecycle.state().is_terminal());
        assert!(lifecycle.advance(ProcessState::Running).is_err());
    }

    #[test]
    fn test_completed_with_output_and_exit_code() {
        if !has_shell() {
            eprintln!("Skipping: /bin/sh unavailable");
            return;
        }
        let outcome = run("echo out; echo err >&2; exit 3", Duration::from_secs(5));
        assert_eq!(outcome.state, ProcessState::Completed);
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stdout, "out\n");
        assert_eq!(outcome.stderr, "err\n");
        assert!(!outcome.timed_out());
    }

    #[test]
    fn test_environment_is_scrubbed() {
        if !has_shell() {
            eprintln!("Skipping: /bin/sh unavailable");
            return;
        }
        let outcome = run("echo \"$PATH|$HOME\"; pwd", Duration::from_secs(5));
        let mut lines = outcome.stdout.lines();
        let env_line = lines.next().unwrap();
        let cwd = lines.next().unwrap();
        assert!(env_line.starts_with(SANDBOX_PATH));
        assert!(env_line.ends_with(cwd));
    }

    #[test]
    fn test_hard_deadline_kills_group() {
        if !has_shell() {
            eprintln!("Skipping: /bin/sh unavailable");
            return;
        }
        let started = Instant::now();
        let outcome = run("sleep 30 & sleep 30; wait", Duration::from_millis(300));
        assert_eq!(outcome.state, ProcessState::TimedOut);
        assert!(outcome.timed_out());
        assert_eq!(outcome.signal, Some(libc::SIGKILL));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_watchdog_kill() {
        if !has_shell() {
            eprintln!("Skipping: /bin/sh unavailable");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let mut limiter = ResourceLimiter::with_limit(Duration::from_millis(100));
        let outcome = ProcessExecutor::new()
            .run(
                &shell_request("sleep 30", dir.path(), Duration::from_secs(10)),
                &mut limiter,
            )
            .unwrap();
        assert_eq!(outcome.state, ProcessState::Killed);
        let violation: Violation = outcome.watchdog_violation.unwrap();
        assert_eq!(violation.category, ViolationCategory::Timeout);
    }

    #[test]
    fn test_output_truncated_but_drained() {
        if !has_shell() {
            eprintln!("Skipping: /bin/sh unavailable");
            return;
        }
        let outcome = run(
            "i=0; while [ $i -lt 2000 ]; do echo xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx; i=$((i+1)); done >&2; echo done",
            Duration::from_secs(10),
        );
        assert_eq!(outcome.state, ProcessState::Completed);
        assert_eq!(outcome.stderr.len(), 1024);
        assert_eq!(outcome.stderr_integrity, OutputIntegrity::TruncatedByJudgeLimit);
        assert_eq!(outcome.stdout, "done\n");
    }

    #[test]
    fn test_missing_program_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = shell_request("", dir.path(), Duration::from_secs(1));
        request.program = PathBuf::from("/nonexistent/interpreter");
        let mut limiter = ResourceLimiter::with_limit(Duration::from_secs(1));
        let err = ProcessExecutor::new().run(&request, &mut limiter).unwrap_err();
        assert!(matches!(err, JudgeError::Process(_)));
    }
}
