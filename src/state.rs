//! # Completion States
//!
//! How far the emission of an entity has progressed, and the edges and
//! steps expressed in terms of it.

use crate::model::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Completion state of an entity.
///
/// `DeclaredAndValid` includes both other states. `Declared` and `Valid` are
/// not ordered against each other: an entity can be declared without being
/// valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    /// Forward-visible, safe to reference by pointer or handle
    Declared,
    /// Fully defined, safe to use by value or inspect members
    Valid,
    /// Both at once
    DeclaredAndValid,
}

impl CompletionState {
    pub fn includes_declared(self) -> bool {
        matches!(self, Self::Declared | Self::DeclaredAndValid)
    }

    pub fn includes_valid(self) -> bool {
        matches!(self, Self::Valid | Self::DeclaredAndValid)
    }

    /// Whether reaching `self` also reaches `required`.
    pub fn satisfies(self, required: CompletionState) -> bool {
        (!required.includes_declared() || self.includes_declared())
            && (!required.includes_valid() || self.includes_valid())
    }

    /// Relax a requirement by one level after its state condition evaluated
    /// to false.
    ///
    /// The table is not monotonic: `Declared` moves to `Valid` while `Valid`
    /// moves to `Declared`. Generated output relies on this exact mapping.
    pub fn demoted(self) -> CompletionState {
        match self {
            Self::DeclaredAndValid => Self::Valid,
            Self::Declared => Self::Valid,
            Self::Valid => Self::Declared,
        }
    }
}

impl fmt::Display for CompletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared => write!(f, "declared"),
            Self::Valid => write!(f, "valid"),
            Self::DeclaredAndValid => write!(f, "declared|valid"),
        }
    }
}

/// One of the two callbacks an entity receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Declare,
    Define,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Declare => write!(f, "declare"),
            Phase::Define => write!(f, "define"),
        }
    }
}

/// One element of the ordered output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    pub entity: EntityId,
    pub phase: Phase,
}

impl Step {
    pub fn declare(entity: EntityId) -> Self {
        Self { entity, phase: Phase::Declare }
    }

    pub fn define(entity: EntityId) -> Self {
        Self { entity, phase: Phase::Define }
    }
}

/// `subject` cannot reach `subject_state` until `object` has reached
/// `object_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub subject: EntityId,
    pub subject_state: CompletionState,
    pub object: EntityId,
    pub object_state: CompletionState,
}

impl DependencyEdge {
    pub fn new(
        subject: EntityId,
        subject_state: CompletionState,
        object: EntityId,
        object_state: CompletionState,
    ) -> Self {
        Self { subject, subject_state, object, object_state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demotion_table_is_preserved() {
        assert_eq!(CompletionState::DeclaredAndValid.demoted(), CompletionState::Valid);
        assert_eq!(CompletionState::Declared.demoted(), CompletionState::Valid);
        assert_eq!(CompletionState::Valid.demoted(), CompletionState::Declared);
    }

    #[test]
    fn declared_and_valid_satisfies_both() {
        let both = CompletionState::DeclaredAndValid;
        assert!(both.satisfies(CompletionState::Declared));
        assert!(both.satisfies(CompletionState::Valid));
        assert!(both.satisfies(both));
    }

    #[test]
    fn declared_and_valid_are_incomparable() {
        assert!(!CompletionState::Declared.satisfies(CompletionState::Valid));
        assert!(!CompletionState::Valid.satisfies(CompletionState::Declared));
        assert!(!CompletionState::Valid.satisfies(CompletionState::DeclaredAndValid));
    }

    #[test]
    fn states_serialize_snake_case() {
        let json = serde_json::to_string(&CompletionState::DeclaredAndValid).unwrap();
        assert_eq!(json, "\"declared_and_valid\"");
    }
}
