//! # Generation Set
//!
//! Which entities the current run is responsible for emitting.

use crate::error::Result;
use crate::model::{EntityId, Reflection};
use std::collections::HashSet;

/// Membership and traversal of the entities a generator emits.
pub trait GenerationSet {
    /// Whether `entity` produces dependency edges. Entities outside the set
    /// are assumed to be available already.
    fn must_parse(&self, entity: EntityId) -> bool;

    /// Visit every entity of the set, nested scopes included. Stops at the
    /// first error returned by `visit`.
    fn walk_recursive(&self, visit: &mut dyn FnMut(EntityId) -> Result<()>) -> Result<()>;
}

/// An object the generator was instructed to generate for
#[derive(Debug, Clone, Copy)]
struct ScopeEntry {
    entity: EntityId,
    /// Generate for the object itself
    parse_self: bool,
    /// Generate for everything in the object's scope
    parse_scope: bool,
}

/// Generation set made of explicitly listed objects and their scopes.
pub struct GenerationScope<'a, M: Reflection> {
    model: &'a M,
    entries: Vec<ScopeEntry>,
}

impl<'a, M: Reflection> GenerationScope<'a, M> {
    pub fn new(model: &'a M) -> Self {
        Self {
            model,
            entries: Vec::new(),
        }
    }

    /// Instruct the generator to generate for an object.
    pub fn parse(&mut self, entity: EntityId, parse_self: bool, parse_scope: bool) -> &mut Self {
        self.entries.push(ScopeEntry {
            entity,
            parse_self,
            parse_scope,
        });
        self
    }

    fn walk_scope(
        &self,
        entity: EntityId,
        seen: &mut HashSet<EntityId>,
        visit: &mut dyn FnMut(EntityId) -> Result<()>,
    ) -> Result<()> {
        for &child in self.model.scope(entity) {
            if seen.insert(child) {
                visit(child)?;
            }
            self.walk_scope(child, seen, visit)?;
        }
        Ok(())
    }
}

impl<M: Reflection> GenerationSet for GenerationScope<'_, M> {
    fn must_parse(&self, entity: EntityId) -> bool {
        // Anonymous entities are emitted by whoever references them
        if !self.model.is_named(entity) {
            return true;
        }

        if self.entries.iter().any(|e| e.parse_self && e.entity == entity) {
            return true;
        }

        let mut ancestor = self.model.parent(entity);
        while let Some(a) = ancestor {
            if self.entries.iter().any(|e| e.parse_scope && e.entity == a) {
                return true;
            }
            if a == self.model.root() {
                break;
            }
            ancestor = self.model.parent(a);
        }
        false
    }

    fn walk_recursive(&self, visit: &mut dyn FnMut(EntityId) -> Result<()>) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.parse_self && seen.insert(entry.entity) {
                visit(entry.entity)?;
            }
            if entry.parse_scope {
                self.walk_scope(entry.entity, &mut seen, visit)?;
            }
        }
        Ok(())
    }
}
