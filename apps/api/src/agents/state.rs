// Project phase tracking for the orchestrator

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::errors::{AgentError, AgentResult};

/// Where the orchestrator is in its fixed script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectPhase {
    Idle,
    Planning,
    Designing,
    Building,
    Reviewing,
    Remediating,
    Complete,
    Failed,
}

impl ProjectPhase {
    /// Checks if the phase can move to `next`
    ///
    /// # Example
    /// ```
    /// use agency_api::agents::state::ProjectPhase;
    ///
    /// assert!(ProjectPhase::Reviewing.can_transition_to(ProjectPhase::Complete));
    /// assert!(!ProjectPhase::Idle.can_transition_to(ProjectPhase::Building));
    /// ```
    pub fn can_transition_to(&self, next: ProjectPhase) -> bool {
        use ProjectPhase::*;
        if self.is_active() && next == Failed {
            return true;
        }
        matches!(
            (self, next),
            (Idle, Planning)
                | (Planning, Designing)
                | (Designing, Building)
                | (Building, Reviewing)
                | (Reviewing, Remediating)
                | (Reviewing, Complete)
                | (Remediating, Complete)
                | (Complete, Planning)
                | (Failed, Planning)
        )
    }

    /// True while a project script is running
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            ProjectPhase::Idle | ProjectPhase::Complete | ProjectPhase::Failed
        )
    }
}

impl std::fmt::Display for ProjectPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectPhase::Idle => write!(f, "idle"),
            ProjectPhase::Planning => write!(f, "planning"),
            ProjectPhase::Designing => write!(f, "designing"),
            ProjectPhase::Building => write!(f, "building"),
            ProjectPhase::Reviewing => write!(f, "reviewing"),
            ProjectPhase::Remediating => write!(f, "remediating"),
            ProjectPhase::Complete => write!(f, "complete"),
            ProjectPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Phase plus the project it belongs to
#[derive(Debug, Clone)]
pub struct ProjectState {
    phase: ProjectPhase,
    pub project_id: Option<Uuid>,
    pub project_name: Option<String>,
    pub output_path: Option<PathBuf>,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            phase: ProjectPhase::Idle,
            project_id: None,
            project_name: None,
            output_path: None,
        }
    }
}

impl ProjectState {
    pub fn phase(&self) -> ProjectPhase {
        self.phase
    }

    /// Moves to `next`, or fails with `InvalidStateTransition`
    pub fn transition(&mut self, next: ProjectPhase) -> AgentResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(AgentError::InvalidStateTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        self.phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_script_is_allowed() {
        let mut state = ProjectState::default();
        for next in [
            ProjectPhase::Planning,
            ProjectPhase::Designing,
            ProjectPhase::Building,
            ProjectPhase::Reviewing,
            ProjectPhase::Remediating,
            ProjectPhase::Complete,
            ProjectPhase::Planning,
        ] {
            state.transition(next).unwrap();
        }
        assert_eq!(state.phase(), ProjectPhase::Planning);
    }

    #[test]
    fn remediation_is_optional_and_single() {
        assert!(ProjectPhase::Reviewing.can_transition_to(ProjectPhase::Complete));
        assert!(!ProjectPhase::Remediating.can_transition_to(ProjectPhase::Remediating));
        assert!(!ProjectPhase::Remediating.can_transition_to(ProjectPhase::Reviewing));
    }

    #[test]
    fn any_active_phase_can_fail() {
        for phase in [
            ProjectPhase::Planning,
            ProjectPhase::Designing,
            ProjectPhase::Building,
            ProjectPhase::Reviewing,
            ProjectPhase::Remediating,
        ] {
            assert!(phase.is_active());
            assert!(phase.can_transition_to(ProjectPhase::Failed));
        }
        assert!(!ProjectPhase::Idle.can_transition_to(ProjectPhase::Failed));
        assert!(!ProjectPhase::Complete.can_transition_to(ProjectPhase::Failed));
    }

    #[test]
    fn invalid_transition_reports_both_phases() {
        let mut state = ProjectState::default();
        let err = state.transition(ProjectPhase::Reviewing).unwrap_err();

        match err {
            AgentError::InvalidStateTransition { from, to } => {
                assert_eq!(from, "idle");
                assert_eq!(to, "reviewing");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(state.phase(), ProjectPhase::Idle);
    }

    #[test]
    fn phase_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProjectPhase::Remediating).unwrap(),
            "\"remediating\""
        );
    }
}
