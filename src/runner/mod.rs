//! Multi-strategy process runner
//!
//! Hardened hosts differ in which process-spawning primitives are usable, so
//! the runner keeps an ordered list of strategies from most to least capable
//! and dispatches every command through the first one that probes as
//! available on this host. The probe result is cached for the lifetime of
//! the process.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};

use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by the runner. `ExecutionUnavailable` is fatal for the
/// call and is never retried.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no usable process execution primitive found on this host")]
    ExecutionUnavailable,

    #[error("command execution failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One host primitive for spawning a process and capturing its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Shell-string execution capturing the child's full stdout buffer.
    ShellCapture,
    /// Piped stdout accumulated line by line, joined with `\n`.
    LineAccumulate,
    /// Piped stdout read as one byte stream.
    StreamPipe,
    /// `popen(3)` through libc.
    #[cfg(unix)]
    Popen,
    /// Explicit `pipe`/`fork`/`execvp` with raw fd plumbing.
    #[cfg(unix)]
    ProcPipes,
}

#[cfg(unix)]
const STRATEGY_ORDER: &[Strategy] = &[
    Strategy::ShellCapture,
    Strategy::LineAccumulate,
    Strategy::StreamPipe,
    Strategy::Popen,
    Strategy::ProcPipes,
];

#[cfg(not(unix))]
const STRATEGY_ORDER: &[Strategy] = &[
    Strategy::ShellCapture,
    Strategy::LineAccumulate,
    Strategy::StreamPipe,
];

/// First available strategy, probed once per process. Racing the probe from
/// multiple threads is harmless since every thread computes the same value.
static SELECTED: Lazy<Option<Strategy>> = Lazy::new(|| {
    let found = STRATEGY_ORDER.iter().copied().find(Strategy::available);
    match found {
        Some(strategy) => debug!("[runner] selected strategy {:?}", strategy),
        None => debug!("[runner] no execution strategy available"),
    }
    found
});

/// Builds the platform shell invocation for a command string.
fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(cmd);
        command
    } else {
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(cmd);
        command
    }
}

fn shell_exists() -> bool {
    if cfg!(windows) {
        // cmd.exe is resolved through PATH and present on every supported host.
        true
    } else {
        std::path::Path::new("/bin/sh").exists()
    }
}

impl Strategy {
    /// Whether the host primitives this strategy needs are all present.
    fn available(&self) -> bool {
        match self {
            Strategy::ShellCapture | Strategy::LineAccumulate | Strategy::StreamPipe => {
                shell_exists()
            }
            #[cfg(unix)]
            Strategy::Popen | Strategy::ProcPipes => true,
        }
    }

    /// Run a fully composed command line and capture its stdout text.
    pub(crate) fn execute(&self, cmd: &str) -> Result<String, RunnerError> {
        match self {
            Strategy::ShellCapture => {
                let output = shell_command(cmd).output()?;
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Strategy::LineAccumulate => {
                let mut child = shell_command(cmd).stdout(Stdio::piped()).spawn()?;
                let mut lines = Vec::new();
                if let Some(stdout) = child.stdout.take() {
                    for line in BufReader::new(stdout).lines() {
                        lines.push(line?);
                    }
                }
                child.wait()?;
                Ok(lines.join("\n"))
            }
            Strategy::StreamPipe => {
                let mut child = shell_command(cmd).stdout(Stdio::piped()).spawn()?;
                let mut output = String::new();
                if let Some(mut stdout) = child.stdout.take() {
                    stdout.read_to_string(&mut output)?;
                }
                child.wait()?;
                Ok(output)
            }
            #[cfg(unix)]
            Strategy::Popen => exec_popen(cmd),
            #[cfg(unix)]
            Strategy::ProcPipes => exec_proc_pipes(cmd),
        }
    }
}

#[cfg(unix)]
fn exec_popen(cmd: &str) -> Result<String, RunnerError> {
    use std::ffi::CString;

    let c_cmd = CString::new(cmd).map_err(|_| {
        RunnerError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "command contains a NUL byte",
        ))
    })?;

    let handle = unsafe { libc::popen(c_cmd.as_ptr(), c"r".as_ptr()) };
    if handle.is_null() {
        return Err(RunnerError::Io(std::io::Error::last_os_error()));
    }

    let mut output = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = unsafe { libc::fread(buf.as_mut_ptr() as *mut libc::c_void, 1, buf.len(), handle) };
        if n == 0 {
            break;
        }
        output.extend_from_slice(&buf[..n]);
    }
    unsafe { libc::pclose(handle) };
    Ok(String::from_utf8_lossy(&output).into_owned())
}

#[cfg(unix)]
fn exec_proc_pipes(cmd: &str) -> Result<String, RunnerError> {
    use std::ffi::CString;

    let mut fds = [0i32; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(RunnerError::Io(std::io::Error::last_os_error()));
    }
    let (read_fd, write_fd) = (fds[0], fds[1]);

    match unsafe { libc::fork() } {
        -1 => {
            unsafe {
                libc::close(read_fd);
                libc::close(write_fd);
            }
            Err(RunnerError::Io(std::io::Error::last_os_error()))
        }
        0 => unsafe {
            // Child: wire stdout to the pipe and exec the shell. Only
            // async-signal-safe calls between fork and exec.
            libc::dup2(write_fd, libc::STDOUT_FILENO);
            libc::close(read_fd);
            libc::close(write_fd);
            let c_cmd = match CString::new(cmd) {
                Ok(c) => c,
                Err(_) => libc::_exit(127),
            };
            let argv = [
                c"/bin/sh".as_ptr(),
                c"-c".as_ptr(),
                c_cmd.as_ptr(),
                std::ptr::null(),
            ];
            libc::execvp(c"/bin/sh".as_ptr(), argv.as_ptr());
            libc::_exit(127)
        },
        pid => {
            unsafe { libc::close(write_fd) };
            let mut output = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = unsafe {
                    libc::read(read_fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len())
                };
                if n <= 0 {
                    break;
                }
                output.extend_from_slice(&buf[..n as usize]);
            }
            unsafe {
                libc::close(read_fd);
                let mut status = 0;
                libc::waitpid(pid, &mut status, 0);
            }
            Ok(String::from_utf8_lossy(&output).into_owned())
        }
    }
}

/// Runs shell command lines through the selected host strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Runner;

impl Runner {
    /// Execute a command line and return its merged stdout/stderr text.
    ///
    /// Blocks until the command completes. Any time ceiling is the
    /// responsibility of the deployment environment.
    pub fn run(&self, cmd: &str) -> Result<String, RunnerError> {
        let strategy = Self::selected().ok_or(RunnerError::ExecutionUnavailable)?;
        strategy.execute(&format!("{cmd} 2>&1"))
    }

    /// The strategy chosen for this process, if any.
    pub fn selected() -> Option<Strategy> {
        *SELECTED
    }
}
