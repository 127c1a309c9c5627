//! Shellgate - browser shell gateway
//!
//! Shellgate lets an authenticated operator run operating-system commands
//! from a browser against the host, preserving the feel of a persistent
//! interactive shell (working directory, `user@host` banner) across
//! stateless request/response calls.
//!
//! ## How a call works
//!
//! Each command is wrapped in a subshell that prints the post-execution
//! working directory framed by a sentinel marker as the last output line
//! ([`protocol`]). The [`runner`] picks the first usable process primitive
//! on the host and captures merged stdout/stderr. The [`executor`] strips
//! the probe back off and the [`session`] layer persists the recovered
//! directory per caller, so the next call resumes where this one left off.
//!
//! Command strings are executed verbatim. There is no sandboxing here;
//! access control belongs in front of the [`server`] endpoints.

pub mod config;
pub mod executor;
pub mod hint;
pub mod protocol;
pub mod runner;
pub mod server;
pub mod session;
pub mod store;

pub use executor::{ExecResult, Executor};
pub use hint::HintKind;
pub use runner::RunnerError;
pub use session::{AuditSink, PreferenceStore, Session};
