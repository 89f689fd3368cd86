//! Working-checkout operations.
//!
//! The parsing and scoring core never touches git directly; everything that
//! mutates a working tree goes through this module. Operations shell out to
//! git for maximum compatibility. Transient fetch failures are retried under
//! an explicit [`RetryPolicy`]; callers that interleave extraction with patch
//! application must hold the repository's lock (see [`repo_lock`]) for the
//! whole sequence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::warn;

use crate::error::{PatchScopeError, Result};

/// One lock per repository name, so instances of the same repository
/// serialize while different repositories proceed independently
static REPO_LOCKS: Lazy<Mutex<HashMap<String, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Get or create the lock for a specific repository
pub fn repo_lock(repo_name: &str) -> Arc<Mutex<()>> {
    let mut locks = REPO_LOCKS.lock();
    locks
        .entry(repo_name.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Bounded retry with fixed backoff for fallible operations.
///
/// Used at the checkout boundary only; the parsing/scoring core never
/// retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted,
    /// sleeping for the backoff between attempts. The last error wins.
    pub fn run<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut last_error: Option<PatchScopeError> = None;
        for attempt in 1..=self.max_attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("attempt {attempt}/{} failed: {e}", self.max_attempts);
                    last_error = Some(e);
                    if attempt < self.max_attempts {
                        std::thread::sleep(self.backoff);
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| PatchScopeError::GitError {
            message: "retry budget exhausted".to_string(),
        }))
    }
}

/// Run a git command and return stdout as string
fn git_command(args: &[&str], cwd: Option<&Path>) -> Result<String> {
    let mut cmd = Command::new("git");
    cmd.args(args);

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd.output().map_err(|e| PatchScopeError::GitError {
        message: format!("Failed to execute git: {}", e),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PatchScopeError::GitError {
            message: format!("git {} failed: {}", args.join(" "), stderr.trim()),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// A working checkout of one repository.
#[derive(Debug)]
pub struct Checkout {
    root: PathBuf,
    retry: RetryPolicy,
}

impl Checkout {
    /// Wrap an existing working tree
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Clone `owner/name` from GitHub into `dest` and wrap the result.
    /// The clone is retried for transient network failures.
    pub fn clone_into(repo_name: &str, dest: &Path, retry: RetryPolicy) -> Result<Self> {
        let url = format!("https://github.com/{}.git", repo_name);
        let dest_str = dest.display().to_string();
        retry.run(|| git_command(&["clone", &url, &dest_str], None).map(|_| ()))?;
        Ok(Self {
            root: dest.to_path_buf(),
            retry,
        })
    }

    /// Root directory of the working tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reset the working tree to its base state, discarding applied patches.
    /// Fetch occasionally fails transiently, so the whole sequence retries.
    pub fn reset(&self) -> Result<()> {
        self.retry.run(|| {
            git_command(&["fetch", "--all"], Some(&self.root))?;
            git_command(&["reset", "--hard"], Some(&self.root))?;
            git_command(&["clean", "-f", "-d"], Some(&self.root))?;
            Ok(())
        })
    }

    /// Check out a specific commit after resetting the tree
    pub fn checkout_commit(&self, commit: &str) -> Result<()> {
        self.reset()?;
        git_command(&["checkout", commit], Some(&self.root)).map(|_| ())
    }

    /// Apply unified-diff text to the working tree.
    ///
    /// Tries `git apply` first; falls back to the fuzzier `patch` tool when
    /// git rejects the diff.
    pub fn apply_patch(&self, patch: &str) -> Result<()> {
        let patch_file = self.root.join("temp.patch");
        std::fs::write(&patch_file, patch)?;

        let patch_file_str = patch_file.display().to_string();
        let applied = git_command(
            &["apply", "--ignore-whitespace", "--reject", &patch_file_str],
            Some(&self.root),
        );

        let result = match applied {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("git apply failed, retrying with patch: {e}");
                self.apply_with_patch_tool(&patch_file)
            }
        };

        let _ = std::fs::remove_file(&patch_file);
        result
    }

    fn apply_with_patch_tool(&self, patch_file: &Path) -> Result<()> {
        let output = Command::new("patch")
            .args(["--fuzz=5", "-p1", "-f", "-i"])
            .arg(patch_file)
            .current_dir(&self.root)
            .output()
            .map_err(|e| PatchScopeError::PatchApplyFailure {
                message: format!("Failed to execute patch: {}", e),
            })?;

        if !output.status.success() {
            return Err(PatchScopeError::PatchApplyFailure {
                message: format!(
                    "patch exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retry_policy_returns_first_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(0));
        let result = policy.run(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Ok::<_, PatchScopeError>(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_policy_retries_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(0));
        let result = policy.run(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(PatchScopeError::GitError {
                    message: "transient".to_string(),
                })
            } else {
                Ok(n)
            }
        });
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retry_policy_exhausts_budget() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(0));
        let result: Result<()> = policy.run(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(PatchScopeError::GitError {
                message: "always down".to_string(),
            })
        });
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_repo_lock_is_shared_per_name() {
        let a = repo_lock("owner/repo");
        let b = repo_lock("owner/repo");
        let c = repo_lock("owner/other");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
