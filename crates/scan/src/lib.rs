//! Source scanning for documentation-marker coverage.
//!
//! The [`IgnoreEngine`] decides what is walked, the [`LanguageRegistry`]
//! decides what counts as a function and as a marker, [`scan`] produces one
//! [`FileRecord`](arkival_core::FileRecord) per eligible file, and
//! [`aggregate::build`] folds them into a
//! [`ProjectSummary`](arkival_core::ProjectSummary).

#![warn(missing_docs)]

pub mod error;
pub mod ignore;
pub mod registry;
pub mod scanner;
pub mod aggregate;

pub use error::{ScanError, Result, IgnoreRuleParseError, UnreadableFileError};
pub use ignore::{IgnoreEngine, DEFAULT_IGNORES};
pub use registry::{DetectionRule, LanguageRegistry, LanguageSpec, Language, MarkerWindow, RuleKind, RuleSpec, MARKER, BUILTIN};
pub use scanner::{scan, analyze_source, FileAnalysis, ScanOptions, ScanOutcome};
pub use aggregate::{build, missing_docs_report, GENERATOR};
