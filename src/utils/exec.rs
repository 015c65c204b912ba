//! External process execution.
//!
//! Two modes:
//!
//! - [`run_once`]: run to completion with inherited stdio
//! - [`Supervisor`]: keep a long-running process (a watcher) alive on a
//!   background thread, restarting it after exits when asked to
//!
//! Commands are resolved on `PATH` up front, so a missing tool is reported
//! by name instead of as a bare spawn error.

use crate::{config::SiteConfig, log};
use anyhow::{Context, Result, bail};
use parking_lot::Mutex;
use std::{
    path::PathBuf,
    process::{Child, Command, Stdio},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

/// Placeholder expanded to `[build.css]` in preprocessor arguments.
const CSS_PLACEHOLDER: &str = "{css}";

/// Delay before a supervised process is started again.
const RESTART_BACKOFF: Duration = Duration::from_secs(1);

/// Poll interval while waiting on a supervised child.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Process Spec
// ============================================================================

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Label used in logs.
    pub name: String,
    /// Program followed by its fixed leading arguments.
    pub command: Vec<String>,
    pub args: Vec<String>,
    /// Working directory; inherited when `None`.
    pub cwd: Option<PathBuf>,
    /// Restart after every exit (supervised mode only).
    pub restart: bool,
}

impl ProcessSpec {
    /// The stylesheet preprocessor, one-shot or in watch mode.
    pub fn preprocessor(config: &SiteConfig, watch: bool) -> Self {
        let pre = &config.build.preprocessor;
        let css = config.build.css.display().to_string();

        let mut args = pre.args.clone();
        if watch {
            args.extend(pre.watch_args.iter().cloned());
        }
        let args = args
            .iter()
            .map(|arg| arg.replace(CSS_PLACEHOLDER, &css))
            .collect();

        Self {
            name: pre.command.first().cloned().unwrap_or_default(),
            command: pre.command.clone(),
            args,
            cwd: Some(config.root.clone()).filter(|p| !p.as_os_str().is_empty()),
            restart: watch && pre.restart,
        }
    }

    fn command(&self) -> Result<Command> {
        let Some(program) = self.command.first() else {
            bail!("`{}`: empty command", self.name);
        };
        let program = which::which(program)
            .with_context(|| format!("`{program}` not found. Please install it first."))?;

        let mut command = Command::new(program);
        command
            .args(&self.command[1..])
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        Ok(command)
    }
}

// ============================================================================
// One-shot
// ============================================================================

/// Run `spec` to completion. Fails on spawn failure or non-zero exit.
pub fn run_once(spec: &ProcessSpec) -> Result<()> {
    let status = spec
        .command()?
        .status()
        .with_context(|| format!("Failed to execute `{}`", spec.name))?;

    if !status.success() {
        bail!("Command `{}` failed with {status}", spec.name);
    }
    Ok(())
}

// ============================================================================
// Supervised
// ============================================================================

/// Handle to a supervised background process.
pub struct Supervisor {
    name: String,
    stop: Arc<AtomicBool>,
    child: Arc<Mutex<Option<Child>>>,
    handle: Option<JoinHandle<()>>,
}

impl Supervisor {
    /// Start `spec` on a background thread. Never fails: spawn errors are
    /// logged by the thread.
    pub fn spawn(spec: ProcessSpec) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let child = Arc::new(Mutex::new(None));
        let name = spec.name.clone();

        let handle = {
            let stop = Arc::clone(&stop);
            let child = Arc::clone(&child);
            thread::spawn(move || supervise(&spec, &stop, &child))
        };

        Self {
            name,
            stop,
            child,
            handle: Some(handle),
        }
    }

    /// Whether the supervising thread has finished.
    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Kill the process and wait for the supervising thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(child) = self.child.lock().as_mut() {
            let _ = child.kill();
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log!("error"; "{} supervisor panicked", self.name);
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn supervise(spec: &ProcessSpec, stop: &AtomicBool, slot: &Mutex<Option<Child>>) {
    while !stop.load(Ordering::SeqCst) {
        match spec.command().and_then(|mut c| {
            c.spawn()
                .with_context(|| format!("Failed to execute `{}`", spec.name))
        }) {
            Ok(child) => {
                *slot.lock() = Some(child);
                match wait(slot, stop) {
                    Some(status) if status.success() => log!("exec"; "{} exited", spec.name),
                    Some(status) => log!("error"; "{} exited with {status}", spec.name),
                    None => {}
                }
                *slot.lock() = None;
            }
            Err(e) => {
                log!("error"; "{:#}", e);
                // retrying can't find a missing program
                return;
            }
        }

        if !spec.restart || stop.load(Ordering::SeqCst) {
            return;
        }
        sleep_unless_stopped(RESTART_BACKOFF, stop);
        if !stop.load(Ordering::SeqCst) {
            log!("exec"; "restarting {}", spec.name);
        }
    }
}

/// Poll the child in `slot` until it exits. `None` when the wait itself fails.
fn wait(slot: &Mutex<Option<Child>>, stop: &AtomicBool) -> Option<std::process::ExitStatus> {
    loop {
        let polled = match slot.lock().as_mut() {
            Some(child) => child.try_wait(),
            None => return None,
        };
        match polled {
            Ok(Some(status)) => return Some(status),
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                if !stop.load(Ordering::SeqCst) {
                    log!("error"; "waiting on process: {e}");
                }
                return None;
            }
        }
    }
}

fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let mut waited = Duration::ZERO;
    while waited < total && !stop.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
        waited += POLL_INTERVAL;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn spec(command: &[&str], restart: bool) -> ProcessSpec {
        ProcessSpec {
            name: command[0].to_owned(),
            command: command.iter().map(|s| (*s).to_owned()).collect(),
            args: Vec::new(),
            cwd: None,
            restart,
        }
    }

    #[test]
    fn test_preprocessor_spec_expands_css() {
        let mut config = SiteConfig::default();
        config.root = PathBuf::from("/proj");
        config.build.css = PathBuf::from("/proj/src/css");
        config.build.preprocessor.restart = true;

        let once = ProcessSpec::preprocessor(&config, false);
        assert_eq!(once.command, ["sass"]);
        assert_eq!(
            once.args,
            ["--style=compressed", "--source-map", "/proj/src/css:/proj/src/css"]
        );
        assert!(!once.restart);

        let watching = ProcessSpec::preprocessor(&config, true);
        assert_eq!(watching.args.last().map(String::as_str), Some("--watch"));
        assert!(watching.restart);
        assert_eq!(watching.cwd, Some(PathBuf::from("/proj")));
    }

    #[test]
    fn test_missing_command() {
        let err = run_once(&spec(&["pagewright-no-such-tool"], false)).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_empty_command() {
        assert!(run_once(&spec(&[""], false)).is_err());
        let empty = ProcessSpec {
            command: Vec::new(),
            ..spec(&["x"], false)
        };
        assert!(run_once(&empty).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_once_exit_status() {
        run_once(&spec(&["true"], false)).unwrap();
        let err = run_once(&spec(&["false"], false)).unwrap_err();
        assert!(err.to_string().contains("failed"));
    }

    #[cfg(unix)]
    #[test]
    fn test_supervisor_without_restart_finishes() {
        let supervisor = Supervisor::spawn(spec(&["true"], false));
        let start = Instant::now();
        while !supervisor.is_finished() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(supervisor.is_finished());
    }

    #[cfg(unix)]
    #[test]
    fn test_supervisor_stop_kills_child() {
        let supervisor = Supervisor::spawn(spec(&["sleep", "30"], true));
        thread::sleep(Duration::from_millis(200));
        assert!(!supervisor.is_finished());

        let start = Instant::now();
        supervisor.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
