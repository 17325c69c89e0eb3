//! Persistence for Arkival.
//!
//! Every document is written to a `<name>.tmp` sibling and renamed over its
//! target. The three handoff stores and the checkpoint log are only ever
//! written together, through [`Storage::commit_handoff`].

#![warn(missing_docs)]

pub mod trait_;
pub mod fs;
pub mod transaction;
pub mod schema;
pub mod checkpoint;
pub mod json_storage;

pub use trait_::{Storage, StorageError, Result, HandoffBatch};
pub use fs::{Filesystem, TokioFs, RetryPolicy};
pub use transaction::Transaction;
pub use json_storage::JsonStorage;
