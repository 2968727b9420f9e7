//! # Conditional State Evaluation
//!
//! Members may carry a state condition: a member path evaluated against a
//! live value. When it evaluates to false, the completion state the member
//! requires of its target is relaxed by one level.

use crate::error::PredicateError;
use crate::model::Value;
use crate::state::CompletionState;

/// Evaluate `condition` against `owner` and relax `required` if it is false.
///
/// `member` is the full path of the member carrying the condition and is
/// only used in error messages.
pub fn evaluate(
    condition: Option<&str>,
    owner: &Value,
    required: CompletionState,
    member: &str,
) -> Result<CompletionState, PredicateError> {
    let Some(expr) = condition else {
        return Ok(required);
    };

    let result = owner
        .lookup(expr)
        .map_err(|reason| PredicateError::InvalidExpression {
            expr: expr.to_string(),
            member: member.to_string(),
            reason,
        })?;

    let holds = result.to_bool().ok_or_else(|| PredicateError::NotCastable {
        expr: expr.to_string(),
        member: member.to_string(),
        found: result.kind_name(),
    })?;

    if holds {
        Ok(required)
    } else {
        let relaxed = required.demoted();
        tracing::trace!(
            "[DEPWALK] State condition '{}' of {} is false: {} -> {}",
            expr,
            member,
            required,
            relaxed
        );
        Ok(relaxed)
    }
}
