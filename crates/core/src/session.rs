//! Session state and the derived next-agent handoff document.

use serde::{Deserialize, Serialize};

use crate::deployment::DeploymentMode;
use crate::id::SessionId;
use crate::version::SemVer;
use crate::Time;

/// How a working session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    /// The session finished its work
    Completed,
    /// Work was left open for the next session
    #[default]
    Unresolved,
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionOutcome::Completed => f.write_str("completed"),
            SessionOutcome::Unresolved => f.write_str("unresolved"),
        }
    }
}

impl std::str::FromStr for SessionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" | "complete" => Ok(SessionOutcome::Completed),
            "unresolved" => Ok(SessionOutcome::Unresolved),
            other => Err(format!("unknown outcome '{other}' (expected completed or unresolved)")),
        }
    }
}

/// Persisted state of the most recent working session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Unique session id
    pub session_id: SessionId,

    /// When the session started
    pub started_at: Time,

    /// Set when the session is handed off
    pub completed_at: Option<Time>,

    /// Tasks finished during the session
    #[serde(default)]
    pub completed_tasks: Vec<String>,

    /// What the next session should look at first
    #[serde(default)]
    pub priority_items_for_next: Vec<String>,

    /// Mode the session ran in
    pub deployment_mode: DeploymentMode,

    /// How the session ended
    #[serde(default)]
    pub outcome: SessionOutcome,

    /// Free-text summary given at handoff
    #[serde(default)]
    pub last_summary: Option<String>,

    /// Project summary version at handoff
    #[serde(default)]
    pub project_version: Option<SemVer>,
}

impl SessionState {
    /// Start a new, still-open session.
    pub fn start(deployment_mode: DeploymentMode, started_at: Time) -> Self {
        Self {
            session_id: SessionId::new(),
            started_at,
            completed_at: None,
            completed_tasks: Vec::new(),
            priority_items_for_next: Vec::new(),
            deployment_mode,
            outcome: SessionOutcome::default(),
            last_summary: None,
            project_version: None,
        }
    }

    /// True once the session has been handed off.
    pub fn is_closed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Next-agent document, regenerated wholesale from the session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHandoff {
    /// When this document was produced
    pub generated_at: Time,

    /// Session being handed off
    pub session_id: SessionId,

    /// How that session ended
    pub outcome: SessionOutcome,

    /// Summary text of that session
    pub session_summary: String,

    /// Standing guidance for the incoming session
    pub next_agent_instructions: Vec<String>,

    /// Extracted priority items
    pub priority_actions: Vec<String>,

    /// Tasks finished in that session
    pub completed_tasks: Vec<String>,

    /// Mode the session ran in
    pub deployment_mode: DeploymentMode,

    /// Project summary version at handoff
    pub project_version: Option<SemVer>,

    /// Changelog version after the handoff
    pub changelog_version: SemVer,
}

impl AgentHandoff {
    /// Derive the handoff document from a closed session.
    pub fn from_state(state: &SessionState, changelog_version: SemVer, generated_at: Time) -> Self {
        Self {
            generated_at,
            session_id: state.session_id,
            outcome: state.outcome,
            session_summary: state.last_summary.clone().unwrap_or_default(),
            next_agent_instructions: instructions_for(state.outcome),
            priority_actions: state.priority_items_for_next.clone(),
            completed_tasks: state.completed_tasks.clone(),
            deployment_mode: state.deployment_mode,
            project_version: state.project_version,
            changelog_version,
        }
    }
}

fn instructions_for(outcome: SessionOutcome) -> Vec<String> {
    let lines: &[&str] = match outcome {
        SessionOutcome::Completed => &[
            "Review completed work and verify functionality",
            "Consider next feature priorities from roadmap",
            "Check for any edge cases or improvements needed",
        ],
        SessionOutcome::Unresolved => &[
            "Review the unresolved issue in detail",
            "Try alternative approaches to the problem",
            "Consider breaking down the issue into smaller tasks",
            "Document any new findings or attempted solutions",
        ],
    };
    lines.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_outcome_parse() {
        assert_eq!("completed".parse::<SessionOutcome>().unwrap(), SessionOutcome::Completed);
        assert_eq!("Unresolved".parse::<SessionOutcome>().unwrap(), SessionOutcome::Unresolved);
        assert!("abandoned".parse::<SessionOutcome>().is_err());
    }

    #[test]
    fn test_new_session_is_open() {
        let state = SessionState::start(DeploymentMode::Standalone, Utc::now());
        assert!(!state.is_closed());
        assert!(state.completed_tasks.is_empty());
    }

    #[test]
    fn test_handoff_instructions_follow_outcome() {
        let mut state = SessionState::start(DeploymentMode::Attached, Utc::now());
        state.outcome = SessionOutcome::Unresolved;
        state.last_summary = Some("parser still fails on nested generics".to_string());
        state.priority_items_for_next = vec!["fix nested generics".to_string()];

        let handoff = AgentHandoff::from_state(&state, SemVer::new(1, 2, 0), Utc::now());
        assert_eq!(handoff.next_agent_instructions.len(), 4);
        assert_eq!(handoff.priority_actions, state.priority_items_for_next);
        assert_eq!(handoff.session_summary, "parser still fails on nested generics");
        assert_eq!(handoff.changelog_version, SemVer::new(1, 2, 0));

        state.outcome = SessionOutcome::Completed;
        let handoff = AgentHandoff::from_state(&state, SemVer::new(1, 3, 0), Utc::now());
        assert_eq!(handoff.next_agent_instructions.len(), 3);
    }
}
