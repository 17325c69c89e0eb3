//! All-or-nothing writes across several files.
//!
//! A commit runs in two phases. Every staged document is first written to
//! its temp sibling; a failure there leaves all targets untouched. Temps are
//! then renamed over their targets one by one; a failure there restores the
//! targets already replaced from the bytes captured before the commit.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::fs::{ensure_parent, read_optional, remove_if_exists, tmp_path, Filesystem, RetryPolicy};
use crate::trait_::{Result, StorageError};

struct Staged {
    target: PathBuf,
    contents: Vec<u8>,
}

/// A set of documents committed together.
pub struct Transaction<'a> {
    filesystem: &'a dyn Filesystem,
    retry: RetryPolicy,
    staged: Vec<Staged>,
}

impl<'a> Transaction<'a> {
    /// Start an empty transaction.
    pub fn new(filesystem: &'a dyn Filesystem, retry: RetryPolicy) -> Self {
        Self {
            filesystem,
            retry,
            staged: Vec::new(),
        }
    }

    /// Stage raw bytes for `target`.
    pub fn stage(&mut self, target: impl Into<PathBuf>, contents: Vec<u8>) {
        self.staged.push(Staged {
            target: target.into(),
            contents,
        });
    }

    /// Stage a value as pretty JSON.
    pub fn stage_json<T: Serialize>(&mut self, target: impl Into<PathBuf>, value: &T) -> Result<()> {
        let contents = serde_json::to_vec_pretty(value)?;
        self.stage(target, contents);
        Ok(())
    }

    /// Number of staged documents.
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// True when nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Write every staged document or none of them.
    pub async fn commit(self) -> Result<()> {
        let mut priors = Vec::with_capacity(self.staged.len());
        for staged in &self.staged {
            ensure_parent(&staged.target).await?;
            priors.push(read_optional(&staged.target).await?);
        }

        for (i, staged) in self.staged.iter().enumerate() {
            let tmp = tmp_path(&staged.target);
            let (fs, tmp_ref, contents) = (self.filesystem, tmp.as_path(), staged.contents.as_slice());
            if let Err(source) = self.retry.run("stage", move || fs.write(tmp_ref, contents)).await {
                warn!("Staging {} failed: {}", staged.target.display(), source);
                self.discard_temps(&self.staged[..=i]).await;
                return Err(StorageError::Transaction {
                    path: staged.target.clone(),
                    source,
                    rolled_back: true,
                });
            }
        }

        for (i, staged) in self.staged.iter().enumerate() {
            let tmp = tmp_path(&staged.target);
            let (fs, tmp_ref, target) = (self.filesystem, tmp.as_path(), staged.target.as_path());
            if let Err(source) = self.retry.run("rename", move || fs.rename(tmp_ref, target)).await {
                warn!("Replacing {} failed: {}; rolling back", staged.target.display(), source);
                self.discard_temps(&self.staged[i..]).await;
                let rolled_back = self.restore(&self.staged[..i], &priors[..i]).await;
                return Err(StorageError::Transaction {
                    path: staged.target.clone(),
                    source,
                    rolled_back,
                });
            }
        }

        debug!("Committed {} documents", self.staged.len());
        Ok(())
    }

    async fn discard_temps(&self, staged: &[Staged]) {
        for s in staged {
            if let Err(e) = remove_if_exists(&tmp_path(&s.target)).await {
                warn!("Could not remove temp file for {}: {}", s.target.display(), e);
            }
        }
    }

    /// Put back the captured content of already-replaced targets.
    async fn restore(&self, staged: &[Staged], priors: &[Option<Vec<u8>>]) -> bool {
        let mut restored = true;
        for (s, prior) in staged.iter().zip(priors).rev() {
            let outcome = match prior {
                Some(bytes) => self.put_back(&s.target, bytes).await,
                None => remove_if_exists(&s.target).await,
            };
            if let Err(e) = outcome {
                warn!("Could not restore {}: {}", s.target.display(), e);
                restored = false;
            }
        }
        restored
    }

    async fn put_back(&self, target: &Path, bytes: &[u8]) -> io::Result<()> {
        let tmp = tmp_path(target);
        let fs = self.filesystem;
        let tmp_ref = tmp.as_path();
        self.retry.run("restore", move || fs.write(tmp_ref, bytes)).await?;
        self.retry.run("restore", move || fs.rename(tmp_ref, target)).await
    }
}
