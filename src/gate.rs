//! Dependency gating.
//!
//! A pure check over already-recorded phase results: it never triggers
//! execution of a missing dependency and never reorders phases.

use crate::phase::Phase;
use crate::task::PhaseResult;

/// Validates that a phase's declared prerequisites succeeded.
pub struct DependencyGate;

impl DependencyGate {
    /// Dependencies of `phase` that are absent from `prior` or did not
    /// succeed, in declaration order.
    pub fn unmet(phase: &Phase, prior: &[PhaseResult]) -> Vec<String> {
        phase
            .depends_on
            .iter()
            .filter(|dep| {
                !prior
                    .iter()
                    .any(|r| &r.phase_id == *dep && r.is_success())
            })
            .cloned()
            .collect()
    }

    /// True when the phase may run. A phase with no `depends_on` is always
    /// admitted.
    pub fn check(phase: &Phase, prior: &[PhaseResult]) -> bool {
        Self::unmet(phase, prior).is_empty()
    }
}
