//! Command execution shim.
//!
//! [`Executor`] is the only seam that touches process execution. Every call is
//! bounded by a [`Context`]: when the context is cancelled or its deadline
//! passes, the in-flight process is killed and [`Error::Context`] is returned,
//! so callers can tell "tool absent" apart from "operation timed out".

use crate::error::{ContextError, Error, Result};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Context
// ============================================================================

/// Cancellation token with an optional deadline.
///
/// Clones share the cancel flag. Derived contexts ([`Context::with_timeout`])
/// also share it, so cancelling the root cancels every child.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that never expires on its own.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that expires after `timeout` (or earlier, if the
    /// parent deadline comes first).
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(deadline),
        }
    }

    /// Cancel this context and everything derived from it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Return `Err(Error::Context)` if the context is done.
    pub fn check(&self) -> Result<()> {
        match self.err() {
            Some(reason) => Err(Error::Context(reason)),
            None => Ok(()),
        }
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

// ============================================================================
// Command Output
// ============================================================================

/// Raw result of one external command.
///
/// A non-zero exit is not an error at this layer; adapters decide what a
/// failing exit means for their operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code (`None` when killed by a signal)
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// stdout followed by stderr, the way a terminal would show them.
    pub fn combined(&self) -> String {
        let mut out = self.stdout_str();
        let err = self.stderr_str();
        if !out.is_empty() && !err.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&err);
        out
    }
}

/// Render a command line for logs and error messages.
pub fn render_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Runs external programs.
///
/// Implementations must honor the context: a done context is reported as
/// [`Error::Context`], never as a generic failure.
pub trait Executor: Send + Sync {
    /// Run `program` with `args`, capturing stdout, stderr and exit code.
    fn run(&self, ctx: &Context, program: &str, args: &[String]) -> Result<CommandOutput>;

    /// Resolve `program` on the search path.
    fn look_path(&self, program: &str) -> Option<PathBuf>;
}

/// Executor backed by `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, ctx: &Context, program: &str, args: &[String]) -> Result<CommandOutput> {
        ctx.check()?;
        log::debug!("exec: {}", render_command(program, args));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: program.to_string(),
                source,
            })?;

        // Drain both pipes concurrently so a chatty child never blocks on a full pipe
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some(reason) = ctx.err() {
                log::debug!("killing {program}: {reason}");
                if let Err(e) = child.kill() {
                    log::debug!("kill {program}: {e}");
                }
                // Reap; the readers are left to finish on their own
                if let Err(e) = child.wait() {
                    log::debug!("reap {program}: {e}");
                }
                return Err(Error::Context(reason));
            }
            let nap = ctx
                .remaining()
                .map_or(POLL_INTERVAL, |left| left.min(POLL_INTERVAL));
            thread::sleep(nap.max(Duration::from_millis(1)));
        };

        Ok(CommandOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
            code: status.code(),
        })
    }

    fn look_path(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            log::debug!("reading child output: {e}");
        }
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader.and_then(|h| h.join().ok()).unwrap_or_default()
}

// ============================================================================
// Test doubles
// ============================================================================

/// Scripted executor for tests.
#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::{CommandOutput, Context, Executor, render_command};
    use crate::error::{ContextError, Error, Result};
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::path::PathBuf;
    use std::sync::{Mutex, PoisonError};

    #[derive(Debug, Clone)]
    enum Reply {
        Output(CommandOutput),
        Context(ContextError),
    }

    /// Executor that replays canned responses keyed by the full command line
    /// (`"brew list"`), recording every call.
    ///
    /// The last scripted reply for a command repeats once the queue drains.
    /// Unscripted commands exit 127.
    #[derive(Debug, Default)]
    pub struct ScriptedExecutor {
        replies: Mutex<HashMap<String, VecDeque<Reply>>>,
        binaries: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `name` resolvable through [`Executor::look_path`].
        pub fn with_binary(mut self, name: &str) -> Self {
            self.binaries.insert(name.to_string());
            self
        }

        /// Script stdout and exit code for a command line.
        pub fn on(self, command: &str, code: i32, stdout: &str) -> Self {
            self.push(
                command,
                Reply::Output(CommandOutput {
                    stdout: stdout.as_bytes().to_vec(),
                    stderr: Vec::new(),
                    code: Some(code),
                }),
            )
        }

        /// Script stderr and exit code for a command line.
        pub fn on_stderr(self, command: &str, code: i32, stderr: &str) -> Self {
            self.push(
                command,
                Reply::Output(CommandOutput {
                    stdout: Vec::new(),
                    stderr: stderr.as_bytes().to_vec(),
                    code: Some(code),
                }),
            )
        }

        /// Script a context failure for a command line.
        pub fn on_context(self, command: &str, reason: ContextError) -> Self {
            self.push(command, Reply::Context(reason))
        }

        fn push(mut self, command: &str, reply: Reply) -> Self {
            self.replies
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(command.to_string())
                .or_default()
                .push_back(reply);
            self
        }

        /// Every command line run so far, in order.
        pub fn calls(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// How many times `command` ran.
        pub fn call_count(&self, command: &str) -> usize {
            self.calls().iter().filter(|c| *c == command).count()
        }
    }

    impl Executor for ScriptedExecutor {
        fn run(&self, ctx: &Context, program: &str, args: &[String]) -> Result<CommandOutput> {
            ctx.check()?;
            let line = render_command(program, args);
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(line.clone());

            let mut replies = self.replies.lock().unwrap_or_else(PoisonError::into_inner);
            let reply = match replies.get_mut(&line) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            };

            match reply {
                Some(Reply::Output(output)) => Ok(output),
                Some(Reply::Context(reason)) => Err(Error::Context(reason)),
                None => Ok(CommandOutput {
                    stdout: Vec::new(),
                    stderr: format!("unscripted command: {line}").into_bytes(),
                    code: Some(127),
                }),
            }
        }

        fn look_path(&self, program: &str) -> Option<PathBuf> {
            self.binaries
                .contains(program)
                .then(|| PathBuf::from("/usr/local/bin").join(program))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedExecutor;
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_context_cancel_propagates_to_children() {
        let root = Context::background();
        let child = root.with_timeout(Duration::from_secs(60));
        assert!(child.err().is_none());

        root.cancel();
        assert_eq!(child.err(), Some(ContextError::Cancelled));
        assert!(child.check().unwrap_err().is_context());
    }

    #[test]
    fn test_context_keeps_earlier_deadline() {
        let short = Context::background().with_timeout(Duration::from_millis(1));
        let longer = short.with_timeout(Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(longer.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn test_combined_output() {
        let output = CommandOutput {
            stdout: b"line one".to_vec(),
            stderr: b"Warning: already installed".to_vec(),
            code: Some(1),
        };
        assert!(!output.success());
        assert_eq!(output.combined(), "line one\nWarning: already installed");
    }

    #[test]
    fn test_render_command() {
        assert_eq!(render_command("brew", &[]), "brew");
        assert_eq!(render_command("brew", &args(&["install", "git"])), "brew install git");
    }

    #[test]
    fn test_scripted_executor_replays_and_records() {
        let exec = ScriptedExecutor::new()
            .with_binary("brew")
            .on("brew list", 0, "git\n")
            .on("brew list", 0, "git\ncurl\n");
        let ctx = Context::background();

        let first = exec.run(&ctx, "brew", &args(&["list"])).unwrap();
        let second = exec.run(&ctx, "brew", &args(&["list"])).unwrap();
        let third = exec.run(&ctx, "brew", &args(&["list"])).unwrap();

        assert_eq!(first.stdout_str(), "git\n");
        assert_eq!(second.stdout_str(), "git\ncurl\n");
        assert_eq!(third.stdout_str(), "git\ncurl\n");
        assert_eq!(exec.call_count("brew list"), 3);
        assert!(exec.look_path("brew").is_some());
        assert!(exec.look_path("apt").is_none());
    }

    #[test]
    fn test_scripted_executor_unscripted_exits_127() {
        let exec = ScriptedExecutor::new();
        let out = exec
            .run(&Context::background(), "pipx", &args(&["list"]))
            .unwrap();
        assert_eq!(out.code, Some(127));
    }

    #[test]
    fn test_scripted_executor_honors_cancelled_context() {
        let exec = ScriptedExecutor::new().on("brew list", 0, "git");
        let ctx = Context::background();
        ctx.cancel();
        let err = exec.run(&ctx, "brew", &args(&["list"])).unwrap_err();
        assert!(err.is_context());
        assert!(exec.calls().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_executor_captures_output() {
        let out = SystemExecutor
            .run(
                &Context::background(),
                "sh",
                &args(&["-c", "echo out; echo err >&2; exit 3"]),
            )
            .unwrap();
        assert_eq!(out.stdout_str(), "out\n");
        assert_eq!(out.stderr_str(), "err\n");
        assert_eq!(out.code, Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_executor_kills_on_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let started = Instant::now();
        let err = SystemExecutor
            .run(&ctx, "sleep", &args(&["5"]))
            .unwrap_err();
        assert!(err.is_context());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_system_executor_missing_binary_is_spawn_error() {
        let err = SystemExecutor
            .run(
                &Context::background(),
                "definitely-not-a-real-binary-4242",
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
        assert!(!err.is_context());
    }
}
