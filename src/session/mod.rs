//! Per-caller session orchestration
//!
//! The shell illusion is stateless: every call re-applies the caller's
//! stored working directory before running, and persists the directory the
//! command left behind. The storage and audit collaborators are traits so
//! the core never depends on a concrete backend.

use anyhow::Result;
use tracing::warn;

use crate::executor::{ExecResult, Executor};
use crate::hint::{self, HintKind};

/// Keyed string preference storage, one working directory per caller.
pub trait PreferenceStore {
    fn get_dir(&self, caller: &str) -> Result<Option<String>>;
    fn set_dir(&self, caller: &str, dir: &str) -> Result<()>;
    fn clear_dir(&self, caller: &str) -> Result<()>;
}

/// Immutable record of executed commands. Invoked once per successful
/// execute call, never for hinting.
pub trait AuditSink {
    fn record(&self, caller: &str, command: &str) -> Result<()>;
}

/// Hint call outcome, echoing the prompt state alongside the matches.
#[derive(Debug, Clone)]
pub struct HintOutcome {
    pub matches: Vec<String>,
    pub user: String,
    pub working_dir: String,
}

/// One caller's view of the shell, bound to a store and an audit sink.
pub struct Session<'a> {
    executor: &'a Executor,
    store: &'a dyn PreferenceStore,
    audit: &'a dyn AuditSink,
    caller: &'a str,
}

impl<'a> Session<'a> {
    pub fn new(
        executor: &'a Executor,
        store: &'a dyn PreferenceStore,
        audit: &'a dyn AuditSink,
        caller: &'a str,
    ) -> Self {
        Self {
            executor,
            store,
            audit,
            caller,
        }
    }

    /// Execute a command in the caller's stored working directory and
    /// persist the directory it left behind.
    pub fn run(&self, command: &str) -> Result<ExecResult> {
        self.apply_stored_dir()?;
        let result = self.executor.execute(command)?;
        // The probe reports where the subshell ended up; the process itself
        // never followed a `cd` the command made, so persist the difference.
        let live = self.executor.get_working_dir()?;
        if result.working_dir != live {
            self.store.set_dir(self.caller, &result.working_dir)?;
        }
        self.audit.record(self.caller, command)?;
        Ok(result)
    }

    /// List completions for a partial token, from the caller's stored
    /// working directory. Not audited.
    pub fn hint(&self, value: &str, kind: HintKind) -> Result<HintOutcome> {
        let working_dir = self.apply_stored_dir()?;
        let matches = hint::hint(self.executor, value, kind)?;
        let user = self.executor.combined_user_hostname()?;
        Ok(HintOutcome {
            matches,
            user,
            working_dir,
        })
    }

    /// Drop the stored working directory; the next call starts from the
    /// process's live directory again.
    pub fn reset(&self) -> Result<()> {
        self.store.clear_dir(self.caller)
    }

    /// Enter the caller's stored directory, initializing or refreshing the
    /// stored value as needed. Returns the directory actually entered. Only
    /// directories the process really changed into are ever persisted.
    fn apply_stored_dir(&self) -> Result<String> {
        let path = match self.store.get_dir(self.caller)? {
            Some(path) => path,
            None => {
                let live = self.executor.get_working_dir()?;
                self.store.set_dir(self.caller, &live)?;
                live
            }
        };
        if self.executor.cwd(&path) {
            return Ok(path);
        }
        // Stored directory was deleted or moved; fall back to wherever the
        // process currently is and heal the stored value.
        let live = self.executor.get_working_dir()?;
        warn!(
            "[session] stored dir {:?} for {} no longer valid, resetting to {:?}",
            path, self.caller, live
        );
        self.store.set_dir(self.caller, &live)?;
        Ok(live)
    }
}
