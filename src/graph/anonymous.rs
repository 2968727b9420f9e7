//! # Anonymous Entity Groups
//!
//! Anonymous entities have no identity of their own: two of them with the
//! same type and value are the same entity as far as the generated code is
//! concerned. Each group of equal anonymous entities is represented by the
//! first one seen, which is the only one that enters the dependency graph.

use crate::model::{EntityId, Reflection, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
struct Representative {
    entity: EntityId,
    built: bool,
}

/// Representatives of the anonymous entities seen during one pass.
#[derive(Debug, Default)]
pub struct AnonymousGroups {
    representatives: Vec<Representative>,
}

impl AnonymousGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `candidate` to the representative of its group.
    ///
    /// Named entities represent themselves. An anonymous entity that is not
    /// structurally equal to any representative seen so far becomes a new
    /// representative.
    pub fn canonicalize<M: Reflection + ?Sized>(&mut self, model: &M, candidate: EntityId) -> EntityId {
        if model.is_named(candidate) {
            return candidate;
        }

        if let Some(existing) = self
            .representatives
            .iter()
            .find(|r| r.entity == candidate || structurally_equal(model, candidate, r.entity))
        {
            return existing.entity;
        }

        tracing::trace!("[DEPWALK] New anonymous representative {}", model.path(candidate));
        self.representatives.push(Representative {
            entity: candidate,
            built: false,
        });
        candidate
    }

    /// Claim the edges of `representative` for building. Returns true only
    /// the first time it is called for a representative.
    pub fn claim(&mut self, representative: EntityId) -> bool {
        match self.representatives.iter_mut().find(|r| r.entity == representative) {
            Some(r) if !r.built => {
                r.built = true;
                true
            }
            _ => false,
        }
    }

    pub fn representatives(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.representatives.iter().map(|r| r.entity)
    }

    pub fn len(&self) -> usize {
        self.representatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.representatives.is_empty()
    }
}

/// Deep equality of two entities by kind, type and value.
///
/// Named entities are only equal to themselves. References to anonymous
/// entities are compared structurally; cycles between anonymous entities
/// are assumed equal.
pub fn structurally_equal<M: Reflection + ?Sized>(model: &M, a: EntityId, b: EntityId) -> bool {
    let mut assumed = HashSet::new();
    entities_equal(model, a, b, &mut assumed)
}

fn entities_equal<M: Reflection + ?Sized>(
    model: &M,
    a: EntityId,
    b: EntityId,
    assumed: &mut HashSet<(EntityId, EntityId)>,
) -> bool {
    if a == b {
        return true;
    }
    if model.is_named(a) || model.is_named(b) {
        return false;
    }
    if !assumed.insert((a, b)) {
        return true;
    }

    if model.kind(a) != model.kind(b) {
        return false;
    }

    let same_type = match (model.type_of(a), model.type_of(b)) {
        (Some(s), Some(t)) => entities_equal(model, s, t, assumed),
        (None, None) => true,
        _ => false,
    };
    if !same_type {
        return false;
    }

    match (model.value(a), model.value(b)) {
        (Some(x), Some(y)) => values_equal(model, x, y, assumed),
        (None, None) => true,
        _ => false,
    }
}

fn values_equal<M: Reflection + ?Sized>(
    model: &M,
    x: &Value,
    y: &Value,
    assumed: &mut HashSet<(EntityId, EntityId)>,
) -> bool {
    match (x, y) {
        (Value::Reference(Some(p)), Value::Reference(Some(q))) => entities_equal(model, *p, *q, assumed),
        (Value::Composite(f), Value::Composite(g)) => {
            f.len() == g.len()
                && f.iter()
                    .zip(g)
                    .all(|(l, r)| l.name == r.name && values_equal(model, &l.value, &r.value, assumed))
        }
        (Value::Collection(f), Value::Collection(g)) => {
            f.len() == g.len() && f.iter().zip(g).all(|(l, r)| values_equal(model, l, r, assumed))
        }
        _ => x == y,
    }
}
