//! Wizard steps and the navigation state machine.
//!
//! Step order is fixed. A step is reachable ("unlocked") once the step it
//! depends on is complete and itself reachable, so unlocking always forms a
//! prefix-closed set over the step order.

use serde::{Deserialize, Serialize};

use crate::completion::StepCompletion;
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// The six steps of the module authoring wizard, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStepId {
    Credential,
    Slts,
    Assignment,
    Lessons,
    Introduction,
    Review,
}

/// Total number of steps in the wizard.
pub const TOTAL_STEPS: u8 = 6;

impl WizardStepId {
    pub const ALL: [WizardStepId; TOTAL_STEPS as usize] = [
        Self::Credential,
        Self::Slts,
        Self::Assignment,
        Self::Lessons,
        Self::Introduction,
        Self::Review,
    ];

    /// Convert a 1-based step number.
    pub fn from_number(n: u8) -> Result<Self, CoreError> {
        n.checked_sub(1)
            .and_then(|pos| Self::ALL.get(pos as usize).copied())
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid step number {n}. Must be between 1 and {TOTAL_STEPS}"
                ))
            })
    }

    /// 1-based position in the wizard.
    pub fn to_number(self) -> u8 {
        self as u8 + 1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Slts => "slts",
            Self::Assignment => "assignment",
            Self::Lessons => "lessons",
            Self::Introduction => "introduction",
            Self::Review => "review",
        }
    }

    /// Human-readable label for the step.
    pub fn label(self) -> &'static str {
        match self {
            Self::Credential => "Credential",
            Self::Slts => "Learning Targets",
            Self::Assignment => "Assignment",
            Self::Lessons => "Lessons",
            Self::Introduction => "Introduction",
            Self::Review => "Review",
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self as usize + 1).copied()
    }

    pub fn previous(self) -> Option<Self> {
        (self as usize)
            .checked_sub(1)
            .and_then(|pos| Self::ALL.get(pos).copied())
    }

    /// The step whose completion gates this one. `None` for the first step.
    pub fn prerequisite(self) -> Option<Self> {
        match self {
            Self::Credential => None,
            Self::Slts => Some(Self::Credential),
            Self::Assignment | Self::Lessons => Some(Self::Slts),
            Self::Introduction => Some(Self::Assignment),
            Self::Review => Some(Self::Introduction),
        }
    }
}

/// How a step should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Current,
    Completed,
    Available,
    Locked,
}

/// Direction of the last transition. Presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// Tracks the active step. Completion is passed in on every call so the
/// engine never holds stale derived state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEngine {
    current: WizardStepId,
    direction: Option<Direction>,
}

impl Default for NavigationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationEngine {
    pub fn new() -> Self {
        Self {
            current: WizardStepId::Credential,
            direction: None,
        }
    }

    pub fn current(&self) -> WizardStepId {
        self.current
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Whether the user may navigate to `step`.
    pub fn unlocked(step: WizardStepId, completion: &StepCompletion) -> bool {
        match step.prerequisite() {
            None => true,
            Some(prerequisite) => {
                completion.is_complete(prerequisite) && Self::unlocked(prerequisite, completion)
            }
        }
    }

    pub fn unlocked_steps(completion: &StepCompletion) -> Vec<WizardStepId> {
        WizardStepId::ALL
            .into_iter()
            .filter(|step| Self::unlocked(*step, completion))
            .collect()
    }

    pub fn status(&self, step: WizardStepId, completion: &StepCompletion) -> StepStatus {
        if step == self.current {
            StepStatus::Current
        } else if completion.is_complete(step) {
            StepStatus::Completed
        } else if Self::unlocked(step, completion) {
            StepStatus::Available
        } else {
            StepStatus::Locked
        }
    }

    /// Move to `target` if it is unlocked. Returns whether the move happened.
    pub fn go_to_step(&mut self, target: WizardStepId, completion: &StepCompletion) -> bool {
        if !Self::unlocked(target, completion) {
            return false;
        }
        self.direction = match target.cmp(&self.current) {
            std::cmp::Ordering::Greater => Some(Direction::Forward),
            std::cmp::Ordering::Less => Some(Direction::Backward),
            std::cmp::Ordering::Equal => self.direction,
        };
        self.current = target;
        true
    }

    pub fn go_next(&mut self, completion: &StepCompletion) -> bool {
        match self.current.next() {
            Some(next) => self.go_to_step(next, completion),
            None => false,
        }
    }

    pub fn go_previous(&mut self, completion: &StepCompletion) -> bool {
        match self.current.previous() {
            Some(previous) => self.go_to_step(previous, completion),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
