//! Deployment path resolution.
//!
//! Decides whether the tool runs on its own directory or attached to a host
//! project, and produces the [`DeploymentContext`](arkival_core::DeploymentContext)
//! every other component takes its paths from.

#![warn(missing_docs)]

pub mod error;
pub mod config;
pub mod metadata;
pub mod resolver;

pub use error::{DeployError, Result, PathResolutionAmbiguous};
pub use config::load_config;
pub use metadata::extract_host_metadata;
pub use resolver::{Layout, Resolution, Resolver, CANONICAL_NAMES, DEFAULT_MAX_DEPTH};
