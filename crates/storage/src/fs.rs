//! Filesystem seam, retries and single-file atomic writes.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;

/// The two mutating operations every write goes through.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Write `contents` to `path`, creating or truncating it.
    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Rename `from` over `to`.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// [`Filesystem`] backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFs;

#[async_trait]
impl Filesystem for TokioFs {
    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to).await
    }
}

/// Bounded retry with exponential backoff for transient I/O failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,

    /// Delay before the second attempt; doubles each time
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying while it fails with a transient error.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> io::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = io::Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts && is_transient(&e) => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                    warn!("{} failed (attempt {}/{}): {}; retrying in {:?}", what, attempt, self.attempts, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Errors worth another attempt.
pub fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Temp sibling used while writing `target`.
pub fn tmp_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Read a file, `None` when it does not exist.
pub async fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Remove a file, ignoring a missing one.
pub async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Create the parent directory of `path` if needed.
pub async fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}

/// Write `contents` to a temp sibling, then rename it over `target`.
pub async fn write_atomic(
    filesystem: &dyn Filesystem,
    retry: &RetryPolicy,
    target: &Path,
    contents: &[u8],
) -> io::Result<()> {
    ensure_parent(target).await?;
    let tmp = tmp_path(target);
    let tmp = tmp.as_path();

    let result = async {
        retry.run("write", move || filesystem.write(tmp, contents)).await?;
        retry.run("rename", move || filesystem.rename(tmp, target)).await
    }
    .await;

    if result.is_err() {
        let _ = remove_if_exists(tmp).await;
    }
    result
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the `n`th write (1-based) or rename with the given error kind.
    pub(crate) struct FlakyFs {
        pub(crate) fail_write: Option<usize>,
        pub(crate) fail_rename: Option<usize>,
        pub(crate) kind: io::ErrorKind,
        pub(crate) writes: AtomicUsize,
        pub(crate) renames: AtomicUsize,
    }

    impl FlakyFs {
        pub(crate) fn failing_write(n: usize, kind: io::ErrorKind) -> Self {
            Self {
                fail_write: Some(n),
                fail_rename: None,
                kind,
                writes: AtomicUsize::new(0),
                renames: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing_rename(n: usize, kind: io::ErrorKind) -> Self {
            Self {
                fail_write: None,
                fail_rename: Some(n),
                kind,
                writes: AtomicUsize::new(0),
                renames: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Filesystem for FlakyFs {
        async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
            let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_write == Some(n) {
                return Err(io::Error::new(self.kind, "injected write failure"));
            }
            TokioFs.write(path, contents).await
        }

        async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            let n = self.renames.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_rename == Some(n) {
                return Err(io::Error::new(self.kind, "injected rename failure"));
            }
            TokioFs.rename(from, to).await
        }
    }
}
