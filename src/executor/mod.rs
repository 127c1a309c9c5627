//! Command execution engine
//!
//! One call = one stateless process invocation. The executor wraps the user
//! command with the directory probe, runs it, and recovers the resulting
//! working directory and identity banner from the output. Nothing is
//! persisted here; the session layer owns that.

use anyhow::Result;

use crate::protocol::{self, Platform};
use crate::runner::Runner;

/// Outcome of a single executed command.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Captured merged stdout/stderr, probe line stripped.
    pub output: String,

    /// Working directory after the command ran.
    pub working_dir: String,

    /// Identity banner, `username@hostname`.
    pub user: String,
}

/// Runs commands and recovers post-execution shell state.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    runner: Runner,
    platform: Platform,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            runner: Runner,
            platform: Platform::current(),
        }
    }

    /// Execute a shell command line and capture output plus shell state.
    ///
    /// The command string is passed to the shell verbatim; restricting it is
    /// the job of layers outside this crate.
    pub fn execute(&self, cmd: &str) -> Result<ExecResult> {
        let raw = self.run_probed(cmd)?;
        let (output, dir) = protocol::unwrap_probe(&raw, self.platform);
        let working_dir = match dir {
            Some(dir) => dir,
            // Probe absent or malformed; the live directory is authoritative.
            None => self.get_working_dir()?,
        };
        let user = self.combined_user_hostname()?;
        Ok(ExecResult {
            output,
            working_dir,
            user,
        })
    }

    /// Run a command wrapped with the directory probe, returning raw output.
    pub(crate) fn run_probed(&self, cmd: &str) -> Result<String> {
        let wrapped = protocol::wrap_with_probe(cmd, self.platform);
        Ok(self.runner.run(&wrapped)?)
    }

    /// Change the process working directory.
    ///
    /// Resolves the path to its canonical real form and verifies it is a
    /// directory first. Returns false without side effects otherwise.
    pub fn cwd(&self, path: &str) -> bool {
        let Ok(real) = std::fs::canonicalize(path) else {
            return false;
        };
        if !real.is_dir() {
            return false;
        }
        std::env::set_current_dir(&real).is_ok()
    }

    /// The live working directory of the process.
    pub fn get_working_dir(&self) -> Result<String> {
        if let Ok(dir) = std::env::current_dir() {
            return Ok(dir.to_string_lossy().into_owned());
        }
        // Native query can fail if the directory was unlinked under us.
        let cmd = match self.platform {
            Platform::Unix => "pwd",
            Platform::Windows => "cd",
        };
        Ok(self.runner.run(cmd)?.trim_end().to_string())
    }

    /// Identity banner shown next to the prompt.
    pub fn combined_user_hostname(&self) -> Result<String> {
        Ok(format!("{}@{}", self.user_name()?, self.hostname()?))
    }

    fn user_name(&self) -> Result<String> {
        if let Some(name) = native_user_name() {
            return Ok(name);
        }
        let raw = self.runner.run("whoami")?;
        let trimmed = raw.trim();
        // Windows reports DOMAIN\user; keep the user part.
        let name = trimmed.rsplit('\\').next().unwrap_or(trimmed);
        if name.is_empty() {
            Ok("NONE".to_string())
        } else {
            Ok(name.to_string())
        }
    }

    fn hostname(&self) -> Result<String> {
        if let Some(host) = native_hostname() {
            return Ok(host);
        }
        let cmd = match self.platform {
            Platform::Unix => "hostname",
            Platform::Windows => "echo %USERDOMAIN%",
        };
        Ok(self.runner.run(cmd)?.trim_end().to_string())
    }
}

#[cfg(unix)]
fn native_user_name() -> Option<String> {
    unsafe {
        let pw = libc::getpwuid(libc::geteuid());
        if pw.is_null() {
            return None;
        }
        let name = std::ffi::CStr::from_ptr((*pw).pw_name);
        Some(name.to_string_lossy().into_owned())
    }
}

#[cfg(not(unix))]
fn native_user_name() -> Option<String> {
    std::env::var("USERNAME").ok()
}

#[cfg(unix)]
fn native_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Some(String::from_utf8_lossy(&buf[..end]).into_owned())
}

#[cfg(not(unix))]
fn native_hostname() -> Option<String> {
    None
}
