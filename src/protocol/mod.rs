//! Sentinel probe protocol for recovering shell state from merged output
//!
//! Every command is wrapped in a subshell that prints the post-execution
//! working directory framed by a fixed marker as the final line of output.
//! Decoding pops that line back off and hands the directory to the caller.

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker token framing the directory probe on both sides.
pub const SENTINEL: &str = "<-shellgate->";

static PROBE_RE: Lazy<Regex> = Lazy::new(|| {
    // (?s) so a directory containing a line terminator still matches.
    Regex::new(r"(?s)<-shellgate->(.*?)<-shellgate->").expect("probe regex is valid")
});

/// Host platform, as far as command composition is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    /// Platform the process is running on.
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// Line terminator used when splitting raw command output.
    pub fn line_separator(self) -> &'static str {
        match self {
            Platform::Unix => "\n",
            Platform::Windows => "\r\n",
        }
    }

    /// Trailer appended after the user command to emit the directory probe.
    ///
    /// On Unix the shell expands `${PWD}` inline. cmd.exe has no inline
    /// expansion of a command's output, so the Windows form captures `CD`
    /// into a variable first.
    fn probe_trailer(self) -> &'static str {
        match self {
            Platform::Unix => ";echo \"<-shellgate->${PWD}<-shellgate->\")",
            Platform::Windows => {
                "&& (FOR /F \"tokens=*\" %g IN ('CD') do (SET VAR=%g)) && echo ^<-shellgate-^>%VAR%^<-shellgate-^>)"
            }
        }
    }
}

/// Append the working-directory probe to a user command.
///
/// The whole thing is parenthesized as one subshell so a directory change
/// made by the user command (including sourced scripts) is still in effect
/// when the trailer runs. The runner appends stderr merging afterwards.
pub fn wrap_with_probe(cmd: &str, platform: Platform) -> String {
    format!("( {} {}", cmd, platform.probe_trailer())
}

/// Strip the probe line from raw output and recover the working directory.
///
/// Splits on the platform line terminator, drops trailing empty lines and
/// matches the last remaining line against the sentinel pattern. Returns the
/// cleaned output plus `Some(dir)` on a match. `None` means the probe never
/// ran or was malformed and the caller must query the live directory itself.
/// Note that output whose own final line happens to match the sentinel
/// pattern is indistinguishable from the probe.
pub fn unwrap_probe(raw: &str, platform: Platform) -> (String, Option<String>) {
    let sep = platform.line_separator();
    let mut lines: Vec<&str> = raw.split(sep).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let Some(last) = lines.pop() else {
        return (raw.to_string(), None);
    };
    match PROBE_RE.captures(last) {
        Some(caps) => {
            let dir = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            (lines.join(sep), Some(dir))
        }
        None => (raw.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_produces_single_subshell() {
        let wrapped = wrap_with_probe("echo hi", Platform::Unix);
        assert!(wrapped.starts_with("( echo hi "));
        assert!(wrapped.ends_with(')'));
        assert!(wrapped.contains(SENTINEL));
    }

    #[test]
    fn unwrap_recovers_directory_and_strips_probe() {
        let raw = format!("123456\n{s}/tmp/work{s}\n", s = SENTINEL);
        let (output, dir) = unwrap_probe(&raw, Platform::Unix);
        assert_eq!(output, "123456");
        assert_eq!(dir.as_deref(), Some("/tmp/work"));
    }

    #[test]
    fn unwrap_preserves_interior_empty_lines() {
        let raw = format!("a\n\nb\n{s}/x{s}\n", s = SENTINEL);
        let (output, dir) = unwrap_probe(&raw, Platform::Unix);
        assert_eq!(output, "a\n\nb");
        assert_eq!(dir.as_deref(), Some("/x"));
    }

    #[test]
    fn unwrap_without_probe_returns_none() {
        let (output, dir) = unwrap_probe("plain output\n", Platform::Unix);
        assert_eq!(output, "plain output\n");
        assert!(dir.is_none());
    }

    #[test]
    fn unwrap_malformed_sentinel_returns_none() {
        let raw = "stuff\n<-shellgate->/half/open\n";
        let (output, dir) = unwrap_probe(raw, Platform::Unix);
        assert_eq!(output, raw);
        assert!(dir.is_none());
    }

    #[test]
    fn unwrap_probe_only_output_is_empty() {
        let raw = format!("{s}/just/dir{s}\n", s = SENTINEL);
        let (output, dir) = unwrap_probe(&raw, Platform::Unix);
        assert_eq!(output, "");
        assert_eq!(dir.as_deref(), Some("/just/dir"));
    }

    #[test]
    fn unwrap_empty_output_returns_none() {
        let (output, dir) = unwrap_probe("", Platform::Unix);
        assert_eq!(output, "");
        assert!(dir.is_none());
    }

    #[test]
    fn windows_split_uses_crlf() {
        let raw = format!("out\r\n{s}C:\\Users{s}\r\n", s = SENTINEL);
        let (output, dir) = unwrap_probe(&raw, Platform::Windows);
        assert_eq!(output, "out");
        assert_eq!(dir.as_deref(), Some("C:\\Users"));
    }
}
