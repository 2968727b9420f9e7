//! # Errors
//!
//! Every error is fatal to the current generation pass. Messages carry the
//! full path of the failing entity so the model element can be found.

use crate::state::Phase;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DepWalkError>;

#[derive(Debug, Error)]
pub enum DepWalkError {
    #[error(transparent)]
    Predicate(#[from] PredicateError),

    #[error("traversal of '{entity}' failed: {reason}")]
    Traversal { entity: String, reason: String },

    #[error("dependency cycle between {}", format_cycle(.cycle))]
    Scheduling { cycle: Vec<(String, Phase)> },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl DepWalkError {
    pub fn traversal(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        DepWalkError::Traversal {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

/// Failure to evaluate the state condition attached to a member
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredicateError {
    #[error("invalid state condition '{expr}' for member '{member}': {reason}")]
    InvalidExpression {
        expr: String,
        member: String,
        reason: String,
    },

    #[error("state condition '{expr}' of member '{member}' is not castable to a boolean (found {found})")]
    NotCastable {
        expr: String,
        member: String,
        found: &'static str,
    },
}

/// A model document that cannot be loaded
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("malformed model document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("entity #{entity} refers to unknown entity #{target} ({role})")]
    UnknownReference {
        entity: usize,
        target: usize,
        role: &'static str,
    },

    #[error("model has no namespace root")]
    MissingRoot,
}

fn format_cycle(cycle: &[(String, Phase)]) -> String {
    cycle
        .iter()
        .map(|(entity, phase)| format!("{} {}", phase, entity))
        .collect::<Vec<_>>()
        .join(", ")
}
