//! Test helper utilities.
//!
//! Provides a scripted command runner and an in-process database server
//! that record what happened to them in a shared journal.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use xbackup_core::{
    BackupManager, CommandOutput, CommandRunner, CommandSpec, DatabaseServer, Error, Result,
    ToolConfig,
};

pub const INNOBACKUPEX: &str = "/opt/xb/bin/innobackupex";
pub const XTRABACKUP: &str = "/opt/xb/bin/xtrabackup";

/// Ordered log of runner and server events
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// What the next scripted run does
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Exit(i32),
    /// Killed after running too long, output so far stays in the log
    TimedOut,
    /// The program could not be started, the log stays empty
    NotLaunched,
}

/// Command runner that pretends to be the backup tool
///
/// Outcomes are taken from a queue (exit 0 once it is empty). Backup runs
/// create their target directory like the real tool does.
pub struct ScriptedRunner {
    journal: Journal,
    calls: Mutex<Vec<CommandSpec>>,
    outcomes: Mutex<VecDeque<Outcome>>,
}

impl ScriptedRunner {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            calls: Mutex::new(Vec::new()),
            outcomes: Mutex::new(VecDeque::new()),
        }
    }

    /// Make the next run exit with `code`
    pub fn exit_next(&self, code: i32) {
        self.then(Outcome::Exit(code));
    }

    /// Queue the outcome of the next run
    pub fn then(&self, outcome: Outcome) {
        self.outcomes.lock().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }
}

/// Short name for a tool invocation, based on its mode flag
pub fn describe(spec: &CommandSpec) -> String {
    for mode in ["--copy-back", "--apply-log", "--incremental"] {
        if spec.has_arg(mode) {
            return format!("run {}", mode);
        }
    }
    "run backup".to_string()
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec, _cwd: &Path, log_path: &Path) -> Result<CommandOutput> {
        self.calls.lock().push(spec.clone());
        self.journal.push(describe(spec));

        let outcome = self.outcomes.lock().pop_front().unwrap_or(Outcome::Exit(0));
        let code = match outcome {
            Outcome::Exit(code) => code,
            Outcome::TimedOut => {
                tokio::fs::write(log_path, format!("{}\nstill running\n", spec)).await?;
                return Err(Error::Timeout {
                    program: spec.program_name(),
                    timeout: Duration::from_secs(1),
                    log_path: log_path.to_path_buf(),
                });
            }
            Outcome::NotLaunched => {
                tokio::fs::write(log_path, "").await?;
                return Err(Error::ProcessLaunch {
                    program: spec.program_name(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
        };
        let is_backup = !spec.has_arg("--apply-log") && !spec.has_arg("--copy-back");
        if is_backup && code == 0 {
            if let Some(target) = spec.args.last() {
                tokio::fs::create_dir_all(target).await?;
            }
        }

        let output = format!("{}\ncompleted with {}\n", spec, code);
        tokio::fs::write(log_path, &output).await?;

        Ok(CommandOutput {
            code: Some(code),
            output,
            log_path: log_path.to_path_buf(),
        })
    }
}

/// In-process server whose stop/start only hit the journal
pub struct FakeServer {
    config_file: PathBuf,
    data_dir: PathBuf,
    journal: Journal,
    fail_start: bool,
}

impl FakeServer {
    pub fn new(root: &Path, journal: Journal) -> Self {
        let data_dir = root.join("data");
        std::fs::create_dir_all(data_dir.join("test")).unwrap();
        std::fs::write(data_dir.join("ibdata1"), "pages").unwrap();
        std::fs::write(data_dir.join("test/t1.ibd"), "pages").unwrap();

        Self {
            config_file: root.join("my.cnf"),
            data_dir,
            journal,
            fail_start: false,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn data_entries(&self) -> usize {
        std::fs::read_dir(&self.data_dir).unwrap().count()
    }
}

#[async_trait]
impl DatabaseServer for FakeServer {
    fn config_file(&self) -> &Path {
        &self.config_file
    }

    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn port(&self) -> u16 {
        13306
    }

    async fn stop(&self) -> Result<()> {
        self.journal.push("stop");
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.journal.push("start");
        if self.fail_start {
            return Err(Error::Server("server did not come back".to_string()));
        }
        Ok(())
    }
}

/// Everything a lifecycle test needs, kept alive together
pub struct Harness {
    pub temp_dir: TempDir,
    pub journal: Journal,
    pub runner: Arc<ScriptedRunner>,
    pub server: FakeServer,
    pub manager: BackupManager,
}

impl Harness {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let journal = Journal::default();
        let runner = Arc::new(ScriptedRunner::new(journal.clone()));
        let server = FakeServer::new(temp_dir.path(), journal.clone());

        let tool = ToolConfig::new(INNOBACKUPEX.into(), XTRABACKUP.into());
        let manager = BackupManager::new(tool, temp_dir.path().join("backups"), runner.clone())
            .await
            .unwrap();

        Self {
            temp_dir,
            journal,
            runner,
            server,
            manager,
        }
    }

    pub fn backup_root(&self) -> PathBuf {
        self.temp_dir.path().join("backups")
    }
}

/// Argument list of a spec as plain strings
pub fn args_of(spec: &CommandSpec) -> Vec<String> {
    spec.args
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}
