//! Lazy request sequences

use crate::request::{RequestDraft, RequestRenderer, SynthesizedRequest};
use crate::strategy::CasePlan;
use specops_model::SynthesisStrategy;
use std::iter::FusedIterator;

/// Ordered, finite stream of requests for one operation and strategy
///
/// Each request is rendered only when pulled. The sequence cannot be
/// rewound; ask the synthesizer again for a fresh one.
#[derive(Debug, Clone)]
pub struct SynthesisSequence {
    renderer: RequestRenderer,
    baseline: RequestDraft,
    plans: std::vec::IntoIter<CasePlan>,
}

impl SynthesisSequence {
    pub(crate) fn new(renderer: RequestRenderer, baseline: RequestDraft, plans: Vec<CasePlan>) -> Self {
        Self {
            renderer,
            baseline,
            plans: plans.into_iter(),
        }
    }

    /// Strategy tag of every request in this sequence
    #[inline]
    #[must_use]
    pub fn strategy(&self) -> SynthesisStrategy {
        self.renderer.strategy
    }

    /// `operationId` of the target operation
    #[inline]
    #[must_use]
    pub fn operation_id(&self) -> &str {
        &self.renderer.operation_id
    }

    /// Plans not yet rendered
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.plans.len()
    }
}

impl Iterator for SynthesisSequence {
    type Item = SynthesizedRequest;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let plan = self.plans.next()?;
            let mut draft = self.baseline.clone();
            if draft.apply(&plan.mutation, &plan.target) {
                return Some(self.renderer.render(&draft, plan.label, plan.target));
            }
            tracing::debug!(
                "Skipping '{}' for {}: {} absent from baseline",
                plan.label,
                self.renderer.operation_id,
                plan.target
            );
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.plans.len()))
    }
}

impl FusedIterator for SynthesisSequence {}
