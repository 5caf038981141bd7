//! External command execution.
//!
//! Commands are described as a program plus a structured argument list and
//! spawned directly, never through a shell. Combined stdout/stderr goes to a
//! log file which is read back once the process has exited.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{Error, Result};

/// A program invocation: executable path plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Program name used in log lines and errors
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Whether any argument equals `flag`
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Result of a process that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` if the process was terminated by a signal
    pub code: Option<i32>,
    /// Full combined output as captured in the log file
    pub output: String,
    /// Log file the output was written to
    pub log_path: PathBuf,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn an unsuccessful exit into [`Error::NonZeroExit`].
    pub fn into_result(self, program: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::NonZeroExit {
                program: program.to_string(),
                code: self.code,
                output: self.output,
                log_path: self.log_path,
            })
        }
    }
}

/// Executes external commands
///
/// A non-zero exit is reported through [`CommandOutput::code`], not as an
/// error; errors are reserved for failures to launch or supervise the process.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` in `cwd`, writing combined output to `log_path` (created or
    /// truncated), and wait for it to finish.
    async fn run(&self, spec: &CommandSpec, cwd: &Path, log_path: &Path) -> Result<CommandOutput>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Create a runner that waits indefinitely
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner that kills processes running longer than `timeout`
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec, cwd: &Path, log_path: &Path) -> Result<CommandOutput> {
        let program = spec.program_name();
        debug!("Running `{}` in {} (log: {})", spec, cwd.display(), log_path.display());

        let stdout = tokio::fs::File::create(log_path).await?.into_std().await;
        let stderr = stdout.try_clone()?;

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        // Own process group, so a timeout can take down helpers the tool forks
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|source| Error::ProcessLaunch {
                program: program.clone(),
                source,
            })?;

        let start = Instant::now();
        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!("{} exceeded {:?}, killing it", program, limit);
                    kill_process_group(&child, &program);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill {}: {}", program, e);
                    }
                    return Err(Error::Timeout {
                        program,
                        timeout: limit,
                        log_path: log_path.to_path_buf(),
                    });
                }
            },
            None => child.wait().await?,
        };

        let raw = tokio::fs::read(log_path).await?;
        let output = String::from_utf8_lossy(&raw).into_owned();

        debug!(
            "{} finished with {:?} in {:?}",
            program,
            status.code(),
            start.elapsed()
        );

        Ok(CommandOutput {
            code: status.code(),
            output,
            log_path: log_path.to_path_buf(),
        })
    }
}

/// SIGKILL every process in the child's group
#[cfg(unix)]
fn kill_process_group(child: &tokio::process::Child, program: &str) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pid) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        warn!("Failed to kill process group of {}: {}", program, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &tokio::process::Child, _program: &str) {}
