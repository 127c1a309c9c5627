//! Integration tests for autocomplete hinting

use std::fs;
use std::sync::{Mutex, MutexGuard};

use shellgate::{Executor, HintKind, hint};
use tempfile::TempDir;

static CWD_LOCK: Mutex<()> = Mutex::new(());

fn lock_cwd() -> MutexGuard<'static, ()> {
    CWD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn binary_hint_finds_whoami() {
    let _guard = lock_cwd();
    let executor = Executor::new();
    let matches = hint::hint(&executor, "whoam", HintKind::Binary).expect("hint");
    assert!(
        matches.iter().any(|m| m == "whoami"),
        "expected whoami in {:?}",
        matches
    );
}

#[test]
fn file_hint_matches_prefix_in_current_dir() {
    let _guard = lock_cwd();
    let temp = TempDir::new().expect("temp dir");
    fs::write(temp.path().join("alpha.txt"), "").expect("write");
    fs::write(temp.path().join("alpha.log"), "").expect("write");
    fs::write(temp.path().join("beta.txt"), "").expect("write");
    fs::create_dir(temp.path().join("alphadir")).expect("mkdir");

    let executor = Executor::new();
    assert!(executor.cwd(&temp.path().to_string_lossy()));

    let matches = hint::hint(&executor, "alpha", HintKind::FileEntry).expect("hint");
    assert_eq!(matches.len(), 3, "got {:?}", matches);
    assert!(matches.iter().any(|m| m == "alpha.txt"));
    assert!(matches.iter().any(|m| m == "alpha.log"));
    assert!(matches.iter().any(|m| m == "alphadir"));
}

#[test]
fn file_hint_without_match_is_empty() {
    let _guard = lock_cwd();
    let temp = TempDir::new().expect("temp dir");
    fs::write(temp.path().join("something.txt"), "").expect("write");

    let executor = Executor::new();
    assert!(executor.cwd(&temp.path().to_string_lossy()));

    let matches = hint::hint(&executor, "xyz_never_matches", HintKind::FileEntry).expect("hint");
    assert!(matches.is_empty());
}

#[test]
fn hint_is_idempotent_on_unchanged_filesystem() {
    let _guard = lock_cwd();
    let temp = TempDir::new().expect("temp dir");
    for name in ["one.txt", "two.txt", "three.txt"] {
        fs::write(temp.path().join(name), "").expect("write");
    }

    let executor = Executor::new();
    assert!(executor.cwd(&temp.path().to_string_lossy()));

    let first = hint::hint(&executor, "t", HintKind::FileEntry).expect("hint");
    let second = hint::hint(&executor, "t", HintKind::FileEntry).expect("hint");
    assert_eq!(first, second);
}
