//! Coverage lifecycle
//!
//! ```text
//! Undiscovered ──passive──▶ Observed ──synthesized──▶ Tested
//!       └──────────────synthesized──────────────────────▲
//! ```
//!
//! States only move forward. Recording a hit that would not advance the
//! state leaves it unchanged.

use crate::error::{CoverageError, CoverageResult};
use serde::{Deserialize, Serialize};
use specops_model::RequestOrigin;
use std::fmt;

/// Coverage state of one declared operation
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CoverageState {
    /// Never seen
    #[default]
    Undiscovered,
    /// Seen in passive traffic
    Observed,
    /// Exercised by a synthesized request
    Tested,
}

impl CoverageState {
    /// All states in lifecycle order
    pub const ALL: [CoverageState; 3] = [Self::Undiscovered, Self::Observed, Self::Tested];

    /// Lowercase name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Undiscovered => "undiscovered",
            Self::Observed => "observed",
            Self::Tested => "tested",
        }
    }

    /// States reachable in one step
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [CoverageState] {
        match self {
            Self::Undiscovered => &[Self::Observed, Self::Tested],
            Self::Observed => &[Self::Tested],
            Self::Tested => &[],
        }
    }

    /// Whether `to` is reachable in one step
    #[must_use]
    pub fn can_transition_to(self, to: CoverageState) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// State after a matched hit of the given origin
    #[must_use]
    pub fn advance(self, origin: RequestOrigin) -> CoverageState {
        let target = match origin {
            RequestOrigin::Passive => Self::Observed,
            RequestOrigin::Synthesized(_) => Self::Tested,
        };
        self.max(target)
    }

    /// Counts toward covered operations
    #[inline]
    #[must_use]
    pub fn is_covered(self) -> bool {
        self != Self::Undiscovered
    }
}

impl fmt::Display for CoverageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check a state change
///
/// Staying in place is always allowed.
///
/// # Errors
///
/// `IllegalTransition` for any backward or unknown step.
pub fn validate_transition(from: CoverageState, to: CoverageState) -> CoverageResult<()> {
    if from == to || from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoverageError::illegal(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specops_model::SynthesisStrategy;

    #[test]
    fn forward_transitions() {
        use CoverageState::*;
        assert!(validate_transition(Undiscovered, Observed).is_ok());
        assert!(validate_transition(Undiscovered, Tested).is_ok());
        assert!(validate_transition(Observed, Tested).is_ok());
        assert!(validate_transition(Tested, Tested).is_ok());
    }

    #[test]
    fn backward_transitions_rejected() {
        use CoverageState::*;
        assert_eq!(
            validate_transition(Tested, Observed),
            Err(CoverageError::illegal(Tested, Observed))
        );
        assert!(validate_transition(Observed, Undiscovered).is_err());
        assert!(Tested.allowed_transitions().is_empty());
    }

    #[test]
    fn advance_never_regresses() {
        let synthesized = RequestOrigin::Synthesized(SynthesisStrategy::Malformed);
        assert_eq!(CoverageState::Undiscovered.advance(RequestOrigin::Passive), CoverageState::Observed);
        assert_eq!(CoverageState::Undiscovered.advance(synthesized), CoverageState::Tested);
        assert_eq!(CoverageState::Tested.advance(RequestOrigin::Passive), CoverageState::Tested);
    }

    #[test]
    fn display_and_serde_agree() {
        for state in CoverageState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }
}
