//! Autocomplete hinting against $PATH executables or directory entries
//!
//! Reuses the executor's probed run so the listing command behaves exactly
//! like a user command; the recovered directory is discarded here, only the
//! listing text matters.

use std::collections::HashSet;

use anyhow::Result;

use crate::executor::Executor;
use crate::protocol::{self, Platform};

/// What kind of token is being completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintKind {
    /// Executable files reachable on the search path.
    Binary,
    /// Entries of the current directory, non-recursive.
    FileEntry,
}

impl From<&str> for HintKind {
    fn from(value: &str) -> Self {
        if value == "binary" {
            HintKind::Binary
        } else {
            HintKind::FileEntry
        }
    }
}

fn listing_command(kind: HintKind, platform: Platform) -> &'static str {
    match (platform, kind) {
        (Platform::Unix, HintKind::Binary) => {
            "(IFS=:;set -f;find -L $PATH -maxdepth 1 -type f -perm -100 -print;)"
        }
        (Platform::Unix, HintKind::FileEntry) => "find . -maxdepth 1",
        (Platform::Windows, HintKind::Binary) => "where *.exe",
        (Platform::Windows, HintKind::FileEntry) => "dir /b",
    }
}

/// List candidate completions for a partial token.
///
/// Matches are byte-prefix, case-sensitive, deduplicated in first-seen
/// order. An empty prefix matches everything.
pub fn hint(executor: &Executor, prefix: &str, kind: HintKind) -> Result<Vec<String>> {
    let platform = Platform::current();
    let raw = executor.run_probed(listing_command(kind, platform))?;
    let (listing, dir) = protocol::unwrap_probe(&raw, platform);
    if dir.is_none() {
        // Listing command produced nothing usable.
        return Ok(Vec::new());
    }
    Ok(filter_matches(&listing, prefix, kind, platform))
}

fn filter_matches(listing: &str, prefix: &str, kind: HintKind, platform: Platform) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut matches = Vec::new();
    for line in listing.split(platform.line_separator()) {
        if line.is_empty() {
            continue;
        }
        // `find . -maxdepth 1` lists the directory itself.
        if kind == HintKind::FileEntry && line == "." {
            continue;
        }
        let base = base_name(line, platform);
        if base.starts_with(prefix) && seen.insert(base.to_string()) {
            matches.push(base.to_string());
        }
    }
    matches
}

fn base_name(path: &str, platform: Platform) -> &str {
    let sep = match platform {
        Platform::Unix => '/',
        Platform::Windows => '\\',
    };
    let trimmed = path.trim_end_matches(sep);
    trimmed.rsplit(sep).next().unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_from_transport_string() {
        assert_eq!(HintKind::from("binary"), HintKind::Binary);
        assert_eq!(HintKind::from("file"), HintKind::FileEntry);
        assert_eq!(HintKind::from("anything-else"), HintKind::FileEntry);
    }

    #[test]
    fn filter_keeps_prefix_matches_only() {
        let listing = "./alpha.txt\n./alphabet\n./beta\n";
        let matches = filter_matches(listing, "alpha", HintKind::FileEntry, Platform::Unix);
        assert_eq!(matches, vec!["alpha.txt", "alphabet"]);
    }

    #[test]
    fn filter_is_case_sensitive() {
        let listing = "./Alpha\n./alpha\n";
        let matches = filter_matches(listing, "alpha", HintKind::FileEntry, Platform::Unix);
        assert_eq!(matches, vec!["alpha"]);
    }

    #[test]
    fn filter_skips_self_entry_and_empty_lines() {
        let listing = ".\n\n./one\n";
        let matches = filter_matches(listing, "", HintKind::FileEntry, Platform::Unix);
        assert_eq!(matches, vec!["one"]);
    }

    #[test]
    fn filter_dedupes_preserving_first_seen_order() {
        let listing = "/usr/bin/tar\n/bin/tar\n/usr/bin/tac\n";
        let matches = filter_matches(listing, "ta", HintKind::Binary, Platform::Unix);
        assert_eq!(matches, vec!["tar", "tac"]);
    }

    #[test]
    fn empty_prefix_matches_everything() {
        let listing = "./a\n./b\n";
        let matches = filter_matches(listing, "", HintKind::FileEntry, Platform::Unix);
        assert_eq!(matches, vec!["a", "b"]);
    }

    #[test]
    fn base_name_strips_directory_components() {
        assert_eq!(base_name("/usr/bin/whoami", Platform::Unix), "whoami");
        assert_eq!(base_name("./local", Platform::Unix), "local");
        assert_eq!(base_name("plain", Platform::Unix), "plain");
        assert_eq!(base_name("C:\\Tools\\grep.exe", Platform::Windows), "grep.exe");
    }
}
