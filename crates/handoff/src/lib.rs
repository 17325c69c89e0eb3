//! Session handoff between agents.
//!
//! [`HandoffSynchronizer`] drives a session from the incoming briefing to
//! the outgoing commit. The outgoing step updates the session state, the
//! handoff document, the changelog and the checkpoint log as one unit.

#![warn(missing_docs)]

pub mod error;
pub mod priority;
pub mod synchronizer;

pub use error::{HandoffError, Result};
pub use priority::{extract_priority_items, PRIORITY_KEYWORDS};
pub use synchronizer::{
    DocumentationStatus, HandoffSynchronizer, IncomingBriefing, OutgoingReport, OutgoingRequest,
    Phase,
};
