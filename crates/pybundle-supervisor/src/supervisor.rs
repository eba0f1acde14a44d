//! Single-job subprocess supervision.
//!
//! The supervisor owns at most one active job at a time. It spawns the
//! process with piped stdout/stderr, streams each line to the caller over a
//! channel from dedicated reader threads, polls for exit, and delivers
//! exactly one terminal event. Cancellation sends SIGTERM, waits out a grace
//! period, then SIGKILLs.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use uuid::Uuid;

use crate::events::{JobEvent, OutputLine, OutputSource, TerminalReport};
use crate::job::{Job, JobState};

/// Default grace period between SIGTERM and SIGKILL
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Poll interval for process exit and the cancel flag
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors from supervisor operations
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("a job is already running")]
    AlreadyRunning,
}

/// Command line plus working directory for one job
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program to execute
    pub program: String,
    /// Program arguments
    pub args: Vec<String>,
    /// Working directory for the process
    pub working_dir: PathBuf,
    /// Extra environment variables, added on top of the inherited environment
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a spec with no arguments and no extra environment
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            envs: Vec::new(),
        }
    }

    /// Append arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append one extra environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

/// The active job's shared handles
struct ActiveJob {
    job: Arc<Mutex<Job>>,
    cancel: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

/// Supervises one external build invocation at a time.
pub struct Supervisor {
    active: Mutex<Option<ActiveJob>>,
    grace_period: Duration,
}

impl Supervisor {
    /// Create a supervisor with the default termination grace period
    pub fn new() -> Self {
        Self::with_grace_period(DEFAULT_GRACE_PERIOD)
    }

    /// Create a supervisor with a custom termination grace period
    pub fn with_grace_period(grace_period: Duration) -> Self {
        Self {
            active: Mutex::new(None),
            grace_period,
        }
    }

    /// Launch a job.
    ///
    /// Fails with `AlreadyRunning` if a job is still active. On a spawn
    /// error the job goes PENDING → FAILED and the terminal event carries
    /// the launch-error reason; no output phase is entered. Otherwise the
    /// job runs asynchronously: `Line` events arrive in order on `events`,
    /// followed by exactly one `Terminated` event.
    pub fn start(
        &self,
        spec: CommandSpec,
        events: Sender<JobEvent>,
    ) -> Result<Uuid, SupervisorError> {
        let mut active = lock(&self.active);
        if let Some(current) = active.as_ref() {
            if !current.done.load(Ordering::SeqCst) {
                return Err(SupervisorError::AlreadyRunning);
            }
        }

        let mut job = Job::new(&spec.program, spec.args.clone(), spec.working_dir.clone());
        let job_id = job.id;

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &spec.envs {
            command.env(key, value);
        }

        match command.spawn() {
            Ok(child) => {
                let _ = job.start();
                let job = Arc::new(Mutex::new(job));
                let cancel = Arc::new(AtomicBool::new(false));
                let done = Arc::new(AtomicBool::new(false));

                let monitor_job = Arc::clone(&job);
                let monitor_cancel = Arc::clone(&cancel);
                let monitor_done = Arc::clone(&done);
                let grace = self.grace_period;
                thread::spawn(move || {
                    run_job(child, monitor_job, monitor_cancel, monitor_done, events, grace);
                });

                *active = Some(ActiveJob { job, cancel, done });
                Ok(job_id)
            }
            Err(e) => {
                let _ = job.fail();
                job.finished_at = Some(Utc::now());
                let _ = events.send(JobEvent::Terminated(TerminalReport {
                    job_id,
                    state: JobState::Failed,
                    exit_code: None,
                    term_signal: None,
                    launch_error: Some(e.to_string()),
                    duration_ms: 0,
                }));
                *active = Some(ActiveJob {
                    job: Arc::new(Mutex::new(job)),
                    cancel: Arc::new(AtomicBool::new(false)),
                    done: Arc::new(AtomicBool::new(true)),
                });
                Ok(job_id)
            }
        }
    }

    /// Request termination of the active job.
    ///
    /// No-op (and no event) if nothing is running. The terminal CANCELLED
    /// event is only delivered once the process has actually stopped.
    /// Returns whether a cancellation was requested.
    pub fn cancel(&self) -> bool {
        let active = lock(&self.active);
        match active.as_ref() {
            Some(current) if !current.done.load(Ordering::SeqCst) => {
                {
                    let mut job = lock(&current.job);
                    if job.state == JobState::Running {
                        let _ = job.request_cancel();
                    }
                }
                current.cancel.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    /// Whether a job is currently active
    pub fn is_running(&self) -> bool {
        let active = lock(&self.active);
        active
            .as_ref()
            .map(|a| !a.done.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Snapshot of the current job, if any (the most recent one once terminal)
    pub fn status(&self) -> Option<Job> {
        let active = lock(&self.active);
        active.as_ref().map(|a| lock(&a.job).clone())
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock a mutex, recovering the guard if a panicking thread poisoned it
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Monitor thread body: stream output, wait for exit, deliver the outcome
fn run_job(
    mut child: Child,
    job: Arc<Mutex<Job>>,
    cancel: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    events: Sender<JobEvent>,
    grace: Duration,
) {
    let started = Instant::now();
    let job_id = lock(&job).id;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_handle = spawn_reader(stdout, OutputSource::Stdout, Arc::clone(&job), events.clone());
    let stderr_handle = spawn_reader(stderr, OutputSource::Stderr, Arc::clone(&job), events.clone());

    let status = loop {
        if cancel.load(Ordering::SeqCst) {
            terminate_child(&mut child, grace);
            break child.wait().ok();
        }
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(_) => break None,
        }
    };

    // Drain both pipes before the terminal event so no line arrives after it
    let _ = stdout_handle.join();
    let _ = stderr_handle.join();

    let cancelled = cancel.load(Ordering::SeqCst);
    let (state, exit_code, term_signal) = match status {
        Some(status) => {
            let code = status.code();
            let signal = signal_name(&status);
            if cancelled {
                (JobState::Cancelled, code, signal)
            } else if status.success() {
                (JobState::Succeeded, Some(0), None)
            } else {
                (JobState::Failed, code, signal)
            }
        }
        // wait() itself failed; nothing more is known about the child
        None => (JobState::Failed, None, None),
    };

    {
        let mut job = lock(&job);
        let _ = job.transition(state);
        job.exit_code = exit_code;
        job.term_signal = term_signal.clone();
        job.finished_at = Some(Utc::now());
    }

    // Allow a new start before the caller drains the event
    done.store(true, Ordering::SeqCst);

    let _ = events.send(JobEvent::Terminated(TerminalReport {
        job_id,
        state,
        exit_code,
        term_signal,
        launch_error: None,
        duration_ms: started.elapsed().as_millis() as u64,
    }));
}

/// Read one pipe line by line, recording and forwarding each line
fn spawn_reader<R>(
    pipe: Option<R>,
    source: OutputSource,
    job: Arc<Mutex<Job>>,
    events: Sender<JobEvent>,
) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        if let Some(pipe) = pipe {
            let reader = BufReader::new(pipe);
            for line in reader.lines() {
                if let Ok(text) = line {
                    let line = OutputLine { source, text };
                    lock(&job).output.push(line.clone());
                    let _ = events.send(JobEvent::Line(line));
                } else {
                    break;
                }
            }
        }
    })
}

/// Terminate a child process gracefully then forcefully
fn terminate_child(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let pid = Pid::from_raw(child.id() as i32);
        let _ = signal::kill(pid, Signal::SIGTERM);
    }
    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }

    let start = Instant::now();
    while start.elapsed() < grace {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(_) => return,
        }
    }

    let _ = child.kill();
}

/// Signal name for a signal-killed process, in the form "SIG15"
fn signal_name(status: &ExitStatus) -> Option<String> {
    if status.code().is_some() {
        return None;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal().map(|s| format!("SIG{}", s))
    }
    #[cfg(not(unix))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", std::env::temp_dir()).args(["-c", script])
    }

    fn drain(rx: &mpsc::Receiver<JobEvent>) -> (Vec<OutputLine>, TerminalReport) {
        let mut lines = Vec::new();
        loop {
            match rx.recv().expect("event channel closed before terminal event") {
                JobEvent::Line(line) => lines.push(line),
                JobEvent::Terminated(report) => return (lines, report),
            }
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_echo_succeeds_with_one_line() {
        let supervisor = Supervisor::new();
        let (tx, rx) = mpsc::channel();

        supervisor.start(sh("echo hello"), tx).unwrap();
        let (lines, report) = drain(&rx);

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "hello");
        assert_eq!(lines[0].source, OutputSource::Stdout);
        assert_eq!(report.state, JobState::Succeeded);
        assert_eq!(report.exit_code, Some(0));
    }

    #[test]
    #[cfg(unix)]
    fn test_nonzero_exit_reports_failed_with_code() {
        let supervisor = Supervisor::new();
        let (tx, rx) = mpsc::channel();

        supervisor.start(sh("exit 3"), tx).unwrap();
        let (lines, report) = drain(&rx);

        assert!(lines.is_empty());
        assert_eq!(report.state, JobState::Failed);
        assert_eq!(report.exit_code, Some(3));
        assert!(report.launch_error.is_none());
    }

    #[test]
    fn test_launch_failure_no_output_phase() {
        let supervisor = Supervisor::new();
        let (tx, rx) = mpsc::channel();

        let spec = CommandSpec::new("/nonexistent/program/path", std::env::temp_dir());
        supervisor.start(spec, tx).unwrap();
        let (lines, report) = drain(&rx);

        assert!(lines.is_empty());
        assert_eq!(report.state, JobState::Failed);
        assert!(report.exit_code.is_none());
        assert!(report.launch_error.is_some());
        // Immediately startable again
        assert!(!supervisor.is_running());
    }

    #[test]
    #[cfg(unix)]
    fn test_second_start_rejected_while_running() {
        let supervisor = Supervisor::new();
        let (tx, rx) = mpsc::channel();

        supervisor.start(sh("sleep 5"), tx).unwrap();
        let (tx2, _rx2) = mpsc::channel();
        let err = supervisor.start(sh("echo nope"), tx2).unwrap_err();
        assert!(matches!(err, SupervisorError::AlreadyRunning));

        // The running job is unaffected by the rejected start
        assert!(supervisor.is_running());

        supervisor.cancel();
        let (_, report) = drain(&rx);
        assert_eq!(report.state, JobState::Cancelled);
    }

    #[test]
    fn test_cancel_without_job_is_noop() {
        let supervisor = Supervisor::new();
        assert!(!supervisor.cancel());
    }

    #[test]
    #[cfg(unix)]
    fn test_cancel_reports_cancelled_after_process_stops() {
        let supervisor = Supervisor::with_grace_period(Duration::from_secs(1));
        let (tx, rx) = mpsc::channel();

        supervisor.start(sh("sleep 30"), tx).unwrap();
        assert!(supervisor.cancel());

        let (_, report) = drain(&rx);
        assert_eq!(report.state, JobState::Cancelled);
        assert!(!supervisor.is_running());

        let job = supervisor.status().unwrap();
        assert_eq!(job.state, JobState::Cancelled);
        assert!(job.finished_at.is_some());
    }

    #[test]
    #[cfg(unix)]
    fn test_output_order_preserved() {
        let supervisor = Supervisor::new();
        let (tx, rx) = mpsc::channel();

        supervisor.start(sh("for i in 1 2 3 4 5; do echo line-$i; done"), tx).unwrap();
        let (lines, report) = drain(&rx);

        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["line-1", "line-2", "line-3", "line-4", "line-5"]);
        assert!(report.is_success());
    }

    #[test]
    #[cfg(unix)]
    fn test_stderr_lines_tagged() {
        let supervisor = Supervisor::new();
        let (tx, rx) = mpsc::channel();

        supervisor.start(sh("echo oops >&2"), tx).unwrap();
        let (lines, _) = drain(&rx);

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].source, OutputSource::Stderr);
        assert_eq!(lines[0].text, "oops");
    }

    #[test]
    #[cfg(unix)]
    fn test_restart_after_terminal() {
        let supervisor = Supervisor::new();

        let (tx, rx) = mpsc::channel();
        supervisor.start(sh("echo first"), tx).unwrap();
        let (_, report) = drain(&rx);
        assert!(report.is_success());

        let (tx, rx) = mpsc::channel();
        supervisor.start(sh("echo second"), tx).unwrap();
        let (lines, report) = drain(&rx);
        assert_eq!(lines[0].text, "second");
        assert!(report.is_success());
    }

    #[test]
    #[cfg(unix)]
    fn test_job_records_captured_output() {
        let supervisor = Supervisor::new();
        let (tx, rx) = mpsc::channel();

        supervisor.start(sh("echo captured"), tx).unwrap();
        let (_, _) = drain(&rx);

        let job = supervisor.status().unwrap();
        assert_eq!(job.output.len(), 1);
        assert_eq!(job.output[0].text, "captured");
        assert_eq!(job.exit_code, Some(0));
    }
}
