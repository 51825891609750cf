//! # Workshop Sequence
//!
//! The ordered list of stages a cohort moves through.
//!
//! The sequence is configuration: assessments run the five-stage default or
//! the extended six-stage catalog. It is never empty and never repeats a
//! stage, so positional lookups are total over its members.

use crate::WorkshopType;
use crate::primitives::DEFAULT_SEQUENCE_LEN;
use serde::Serialize;

/// A non-empty, duplicate-free ordered list of workshop stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkshopSequence(Vec<WorkshopType>);

impl WorkshopSequence {
    /// The first `len` catalog stages, clamped to `1..=6`.
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        let len = len.clamp(1, WorkshopType::ALL.len());
        Self(WorkshopType::ALL[..len].to_vec())
    }

    /// The six-stage catalog.
    #[must_use]
    pub fn extended() -> Self {
        Self::with_len(WorkshopType::ALL.len())
    }

    /// Build from explicit stages. Duplicates are dropped (first wins);
    /// an empty input yields the default sequence.
    #[must_use]
    pub fn from_stages(stages: impl IntoIterator<Item = WorkshopType>) -> Self {
        let mut unique: Vec<WorkshopType> = Vec::new();
        for stage in stages {
            if !unique.contains(&stage) {
                unique.push(stage);
            }
        }
        if unique.is_empty() {
            Self::default()
        } else {
            Self(unique)
        }
    }

    /// Zero-based position of a stage, `None` when not part of the sequence.
    #[must_use]
    pub fn position(&self, workshop: WorkshopType) -> Option<usize> {
        self.0.iter().position(|w| *w == workshop)
    }

    /// Whether the stage belongs to this sequence.
    #[must_use]
    pub fn contains(&self, workshop: WorkshopType) -> bool {
        self.0.contains(&workshop)
    }

    /// The opening stage.
    #[must_use]
    pub fn first(&self) -> WorkshopType {
        self.0[0]
    }

    /// The closing stage.
    #[must_use]
    pub fn last(&self) -> WorkshopType {
        self.0[self.0.len() - 1]
    }

    /// The stage after `workshop`, if any.
    #[must_use]
    pub fn next_after(&self, workshop: WorkshopType) -> Option<WorkshopType> {
        let index = self.position(workshop)?;
        self.0.get(index + 1).copied()
    }

    /// The stage before `workshop`, if any.
    #[must_use]
    pub fn previous_of(&self, workshop: WorkshopType) -> Option<WorkshopType> {
        let index = self.position(workshop)?;
        index.checked_sub(1).map(|i| self.0[i])
    }

    /// Stages up to and including `workshop`.
    ///
    /// Unknown stages fall back to the first stage alone.
    #[must_use]
    pub fn prefix_through(&self, workshop: Option<WorkshopType>) -> Vec<WorkshopType> {
        let end = workshop.and_then(|w| self.position(w)).unwrap_or(0);
        self.0[..=end].to_vec()
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate stages in order.
    pub fn iter(&self) -> impl Iterator<Item = WorkshopType> + '_ {
        self.0.iter().copied()
    }

    /// The stages as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[WorkshopType] {
        &self.0
    }
}

impl Default for WorkshopSequence {
    fn default() -> Self {
        Self::with_len(DEFAULT_SEQUENCE_LEN)
    }
}
