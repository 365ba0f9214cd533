//! External command execution and the per-subject run log.
//!
//! The pipeline never spawns processes directly: it holds a [`CommandRunner`]
//! (injected, so tests can script tool behavior) and a [`RunLog`]. The
//! [`Shell`] pairs the two, writing each argv to the log before execution and
//! the captured output after it.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Mutex;

use super::error::ExtractionError;

/// Prefix of every line the pipeline itself writes to a run log.
const LOG_PREFIX: &str = "[extract-cp]";

// ═══════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════

/// An argument vector for one external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Program name without directories, for error messages.
    pub fn program_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// The argument at `index` as lossy UTF-8, if present.
    pub fn arg_str(&self, index: usize) -> Option<String> {
        self.args
            .get(index)
            .map(|a| a.to_string_lossy().into_owned())
    }
}

/// Shell-quoted command line, suitable for copy-paste reproduction.
impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            f.write_str(" ")?;
            f.write_str(&shell_quote(&arg.to_string_lossy()))?;
        }
        Ok(())
    }
}

fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    }
}

/// What a finished command produced.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: CommandStatus,
    /// Standard output followed by standard error.
    pub output: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Exited(i32),
    /// Terminated without an exit code (e.g. killed by a signal).
    Terminated,
}

impl CommandStatus {
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl From<ExitStatus> for CommandStatus {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => Self::Exited(code),
            None => Self::Terminated,
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit status: {code}"),
            Self::Terminated => f.write_str("termination by signal"),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Runner capability
// ═══════════════════════════════════════════════════════════

/// Runs an external command to completion.
///
/// Implementations report a non-zero exit through [`CommandOutput::status`];
/// `Err` is reserved for commands that could not be started at all.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput, ExtractionError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<R> {
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput, ExtractionError> {
        (**self).run(command)
    }
}

/// Runs commands as child processes of this one.
///
/// Standard output and standard error share one capture file, so the
/// captured bytes keep the order in which the tool wrote them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput, ExtractionError> {
        let mut capture = tempfile::tempfile()?;
        let stdout = Stdio::from(capture.try_clone()?);
        let stderr = Stdio::from(capture.try_clone()?);

        let status = Command::new(command.program())
            .args(command.get_args())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .map_err(|source| ExtractionError::Spawn {
                program: command.program_name(),
                source,
            })?;

        let mut output = Vec::new();
        capture.seek(SeekFrom::Start(0))?;
        capture.read_to_end(&mut output)?;
        Ok(CommandOutput {
            status: status.into(),
            output,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Run log
// ═══════════════════════════════════════════════════════════

/// Append-only per-subject log of progress messages and tool invocations.
pub struct RunLog {
    path: PathBuf,
    sink: Mutex<BufWriter<File>>,
}

impl RunLog {
    /// Create (truncating) the log file at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, ExtractionError> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            sink: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A free-text progress message.
    pub fn message(&self, msg: impl AsRef<str>) -> Result<(), ExtractionError> {
        let line = format!("{LOG_PREFIX} MESSAGE  >>>  {}  <<<\n", msg.as_ref());
        self.write_bytes(line.as_bytes())
    }

    /// The exact command line about to run. Flushed immediately so the log
    /// shows what was running if the process dies.
    pub fn command(&self, command: &ToolCommand) -> Result<(), ExtractionError> {
        let line = format!("{LOG_PREFIX} COMMAND $> {command}\n");
        self.write_bytes(line.as_bytes())?;
        self.flush()
    }

    /// Raw output captured from a command.
    pub fn output(&self, bytes: &[u8]) -> Result<(), ExtractionError> {
        self.write_bytes(bytes)
    }

    pub fn flush(&self) -> Result<(), ExtractionError> {
        let mut sink = self.lock();
        sink.flush()?;
        Ok(())
    }

    fn write_bytes(&self, bytes: &[u8]) -> Result<(), ExtractionError> {
        let mut sink = self.lock();
        sink.write_all(bytes)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BufWriter<File>> {
        // A poisoned log still holds whatever was written before the panic.
        self.sink.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for RunLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLog").field("path", &self.path).finish()
    }
}

// ═══════════════════════════════════════════════════════════
// Logged execution
// ═══════════════════════════════════════════════════════════

/// A command runner bound to one subject's run log.
#[derive(Clone, Copy)]
pub struct Shell<'a> {
    runner: &'a dyn CommandRunner,
    log: &'a RunLog,
}

impl<'a> Shell<'a> {
    pub fn new(runner: &'a dyn CommandRunner, log: &'a RunLog) -> Self {
        Self { runner, log }
    }

    pub fn log(&self) -> &'a RunLog {
        self.log
    }

    /// Run `command`, logging argv and output. Non-zero exit is an error.
    pub fn run(&self, command: &ToolCommand) -> Result<(), ExtractionError> {
        self.log.command(command)?;
        tracing::debug!(command = %command, "Running external tool");

        let result = self.runner.run(command)?;
        self.log.output(&result.output)?;

        if !result.status.success() {
            self.log.flush()?;
            return Err(ExtractionError::ExternalTool {
                program: command.program_name(),
                status: result.status.to_string(),
                log: self.log.path().to_path_buf(),
            });
        }
        Ok(())
    }

    pub fn message(&self, msg: impl AsRef<str>) -> Result<(), ExtractionError> {
        self.log.message(msg)
    }
}
