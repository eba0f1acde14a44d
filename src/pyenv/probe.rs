//! Interpreter discovery, validation, and probing.
//!
//! Probing runs short interpreter subprocesses under a timeout: a liveness
//! check (`-c "import sys"`), a version query, and a `pip list` for the
//! installed packages. pip being unavailable degrades to an empty package
//! list rather than failing the probe.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use regex_lite::Regex;

use super::{infer_kind, PackageInfo, PythonEnv};

/// Poll interval while waiting on a probe subprocess
const POLL_INTERVAL: Duration = Duration::from_millis(50);

const VALIDATE_SNIPPET: &str = "import sys";
const VERSION_SNIPPET: &str = "import platform;print(platform.python_version(), end='')";

/// Errors from interpreter probing
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("{path} is not an executable file")]
    NotExecutable { path: String },

    #[error("failed to launch {path}: {source}")]
    Launch {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("interpreter check timed out after {0:?}")]
    Timeout(Duration),

    #[error("{path} is not a working Python interpreter")]
    NotPython { path: String },

    #[error("unexpected interpreter output: {0}")]
    BadOutput(String),
}

struct ProbeOutput {
    status: ExitStatus,
    stdout: String,
}

/// Validate that `path` points to a runnable Python interpreter
pub fn validate(python: &Path, timeout: Duration) -> bool {
    if !python.is_file() {
        return false;
    }
    matches!(
        run_python(python, &["-c", VALIDATE_SNIPPET], timeout),
        Ok(output) if output.status.success()
    )
}

/// Probe an interpreter: liveness, version, environment kind, and packages
pub fn probe(python: &Path, timeout: Duration) -> Result<PythonEnv, ProbeError> {
    if !python.is_file() {
        return Err(ProbeError::NotExecutable {
            path: python.display().to_string(),
        });
    }

    let liveness = run_python(python, &["-c", VALIDATE_SNIPPET], timeout)?;
    if !liveness.status.success() {
        return Err(ProbeError::NotPython {
            path: python.display().to_string(),
        });
    }

    let version = run_python(python, &["-c", VERSION_SNIPPET], timeout)?
        .stdout
        .trim()
        .to_string();
    let looks_like_version = Regex::new(r"^\d+\.\d+(\.\d+)?")
        .ok()
        .map(|re| re.is_match(&version))
        .unwrap_or(false);
    if !looks_like_version {
        return Err(ProbeError::BadOutput(version));
    }

    Ok(PythonEnv {
        executable: python.to_path_buf(),
        version,
        kind: infer_kind(python),
        packages: installed_packages(python, timeout),
    })
}

/// Whether a module can be imported by this interpreter
pub fn module_installed(python: &Path, module: &str, timeout: Duration) -> bool {
    let snippet = format!("import {}", module);
    matches!(
        run_python(python, &["-c", &snippet], timeout),
        Ok(output) if output.status.success()
    )
}

/// Installed packages via `pip list --format json`; empty when pip is
/// missing or its output does not parse
fn installed_packages(python: &Path, timeout: Duration) -> Vec<PackageInfo> {
    match run_python(python, &["-m", "pip", "list", "--format", "json"], timeout) {
        Ok(output) if output.status.success() => {
            serde_json::from_str(&output.stdout).unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

/// Candidate interpreters for a project, in precedence order:
/// the active virtualenv, the active conda env, a project-local `.venv`,
/// then `python3`/`python` on PATH. Only existing files are returned.
pub fn discover(project_dir: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(virtual_env) = std::env::var("VIRTUAL_ENV") {
        candidates.push(interpreter_in(Path::new(&virtual_env)));
    }
    if let Ok(conda_prefix) = std::env::var("CONDA_PREFIX") {
        candidates.push(interpreter_in(Path::new(&conda_prefix)));
    }
    candidates.push(interpreter_in(&project_dir.join(".venv")));

    for name in ["python3", "python"] {
        if let Some(path) = find_on_path(name) {
            candidates.push(path);
        }
    }

    let mut found = Vec::new();
    for candidate in candidates {
        if candidate.is_file() && !found.contains(&candidate) {
            found.push(candidate);
        }
    }
    found
}

/// The interpreter path inside an environment prefix
fn interpreter_in(prefix: &Path) -> PathBuf {
    if cfg!(windows) {
        prefix.join("Scripts").join("python.exe")
    } else {
        prefix.join("bin").join("python")
    }
}

/// Look an executable up on PATH
fn find_on_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Run the interpreter with the given args, draining stdout on a separate
/// thread, killing it if it outlives the timeout
fn run_python(python: &Path, args: &[&str], timeout: Duration) -> Result<ProbeOutput, ProbeError> {
    let mut child = Command::new(python)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| ProbeError::Launch {
            path: python.display().to_string(),
            source,
        })?;

    let stdout = child.stdout.take();
    let reader = thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut stdout) = stdout {
            let _ = stdout.read_to_string(&mut buf);
        }
        buf
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ProbeError::Timeout(timeout));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                return Err(ProbeError::Launch {
                    path: python.display().to_string(),
                    source,
                });
            }
        }
    };

    let stdout = reader.join().unwrap_or_default();
    Ok(ProbeOutput { status, stdout })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_validate_rejects_missing_file() {
        assert!(!validate(Path::new("/no/such/python"), TIMEOUT));
    }

    #[test]
    fn test_probe_rejects_missing_file() {
        let err = probe(Path::new("/no/such/python"), TIMEOUT).unwrap_err();
        assert!(matches!(err, ProbeError::NotExecutable { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_probe_rejects_non_python_executable() {
        // /bin/sh runs, but `-c "import sys"` is not a shell no-op that
        // succeeds quietly; `import` is not a shell builtin
        let err = probe(Path::new("/bin/sh"), TIMEOUT);
        assert!(err.is_err());
    }

    #[test]
    fn test_discover_finds_project_venv() {
        let dir = tempfile::tempdir().unwrap();
        let venv_bin = dir.path().join(".venv").join("bin");
        fs::create_dir_all(&venv_bin).unwrap();
        fs::write(venv_bin.join("python"), "").unwrap();

        let found = discover(dir.path());
        assert!(found.contains(&venv_bin.join("python")));
    }

    #[test]
    fn test_discover_skips_missing_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let found = discover(dir.path());
        // no .venv in an empty dir; anything found must exist
        for path in &found {
            assert!(path.is_file());
        }
    }
}
