//! # Dependency Graph Builder
//!
//! Derives the edges that must hold before an entity can be declared or
//! defined, and hands them to the scheduler.

use super::anonymous::AnonymousGroups;
use super::condition;
use crate::error::{DepWalkError, Result};
use crate::model::{EntityId, EntityKind, ReferenceSite, Reflection};
use crate::scheduler::Scheduler;
use crate::scope::GenerationSet;
use crate::state::{CompletionState, DependencyEdge};

/// Builds the dependency administration of one generation pass
pub struct GraphBuilder<'a, M: ?Sized, G: ?Sized, S: ?Sized> {
    model: &'a M,
    set: &'a G,
    scheduler: &'a mut S,
    groups: &'a mut AnonymousGroups,
    edges: usize,
}

impl<'a, M, G, S> GraphBuilder<'a, M, G, S>
where
    M: Reflection + ?Sized,
    G: GenerationSet + ?Sized,
    S: Scheduler + ?Sized,
{
    pub fn new(model: &'a M, set: &'a G, scheduler: &'a mut S, groups: &'a mut AnonymousGroups) -> Self {
        Self {
            model,
            set,
            scheduler,
            groups,
            edges: 0,
        }
    }

    /// Number of edges submitted so far
    pub fn edge_count(&self) -> usize {
        self.edges
    }

    /// Submit all edges of `entity` and register it with the scheduler, then
    /// follow the references in its value.
    pub fn build(&mut self, entity: EntityId) -> Result<()> {
        let model = self.model;
        tracing::debug!("[DEPWALK] Building dependencies of {}", model.path(entity));

        // Declared only after the type is defined
        if let Some(ty) = model.type_of(entity) {
            if self.set.must_parse(ty) {
                let ty = self.representative(ty)?;
                self.depend(entity, CompletionState::Declared, ty, CompletionState::Valid);
            }
        }

        match model.kind(entity) {
            EntityKind::Procedure => self.procedure_edges(entity)?,
            EntityKind::Type => self.type_edges(entity)?,
            EntityKind::Member => self.member_edges(entity)?,
            EntityKind::Instance | EntityKind::Other => {}
        }

        self.parent_edges(entity);

        // Isolated entities still need their declare and define steps
        self.scheduler.insert(entity);

        model.walk_references(entity, &mut |site| self.reference_edge(entity, site))
    }

    /// Map `entity` to the representative of its anonymous group, building
    /// the representative the first time it is seen.
    fn representative(&mut self, entity: EntityId) -> Result<EntityId> {
        let representative = self.groups.canonicalize(self.model, entity);
        if self.groups.claim(representative) {
            self.build(representative)?;
        }
        Ok(representative)
    }

    fn procedure_edges(&mut self, procedure: EntityId) -> Result<()> {
        let model = self.model;

        // Methods are declared only after the base of their class is defined
        let is_method = model
            .type_of(procedure)
            .map(|ty| !model.is_generic_function_type(ty))
            .unwrap_or(false);
        if is_method {
            let base = model
                .parent(procedure)
                .filter(|p| model.is_class(*p))
                .and_then(|class| model.base(class));
            if let Some(base) = base.filter(|b| self.set.must_parse(*b)) {
                self.depend(procedure, CompletionState::Declared, base, CompletionState::Valid);
            }
        }

        // Parameter types must be complete when the procedure is declared
        for param in model.parameter_types(procedure) {
            if self.set.must_parse(param) {
                let param = self.representative(param)?;
                self.depend(
                    procedure,
                    CompletionState::Declared,
                    param,
                    CompletionState::DeclaredAndValid,
                );
            }
        }
        Ok(())
    }

    /// A type is only complete once its base and element types are
    fn type_edges(&mut self, ty: EntityId) -> Result<()> {
        let model = self.model;
        if let Some(base) = model.base(ty) {
            self.descriptor_edge(ty, base, CompletionState::Valid)?;
        }
        if let Some(element) = model.element_type(ty) {
            self.descriptor_edge(ty, element, self.held_state(element))?;
        }
        Ok(())
    }

    fn member_edges(&mut self, member: EntityId) -> Result<()> {
        match self.model.member_type(member) {
            Some(member_type) => self.descriptor_edge(member, member_type, self.held_state(member_type)),
            None => Ok(()),
        }
    }

    /// Values held by handle only need their type declared
    fn held_state(&self, ty: EntityId) -> CompletionState {
        if self.model.is_reference_type(ty) {
            CompletionState::Declared
        } else {
            CompletionState::Valid
        }
    }

    fn descriptor_edge(&mut self, subject: EntityId, object: EntityId, required: CompletionState) -> Result<()> {
        if self.set.must_parse(object) {
            let object = self.representative(object)?;
            self.depend(subject, CompletionState::Valid, object, required);
        }
        Ok(())
    }

    fn parent_edges(&mut self, entity: EntityId) {
        let model = self.model;
        if !model.is_named(entity) {
            return;
        }
        let Some(parent) = model.parent(entity) else {
            return;
        };
        // The root is always available
        if parent == model.root() || !self.set.must_parse(parent) {
            return;
        }

        let required = model
            .type_of(entity)
            .map(|ty| model.parent_state(ty))
            .unwrap_or(CompletionState::Declared);

        self.depend(entity, CompletionState::Declared, parent, required);
        if required == CompletionState::Declared {
            // A scope is only valid once its children are
            self.depend(parent, CompletionState::Valid, entity, CompletionState::Valid);
        }
    }

    fn reference_edge(&mut self, owner: EntityId, site: ReferenceSite<'_>) -> Result<()> {
        let model = self.model;
        if !self.set.must_parse(site.target) {
            return Ok(());
        }

        let target = self.representative(site.target)?;

        let required = match site.member.filter(|m| m.reference_type) {
            Some(member) if member.condition.is_some() => {
                let value = model
                    .value(owner)
                    .ok_or_else(|| DepWalkError::traversal(model.path(owner), "entity has no value"))?;
                condition::evaluate(
                    member.condition,
                    value,
                    CompletionState::DeclaredAndValid,
                    &model.path(member.id),
                )?
            }
            _ => CompletionState::Valid,
        };

        self.depend(owner, CompletionState::Valid, target, required);
        Ok(())
    }

    fn depend(
        &mut self,
        subject: EntityId,
        subject_state: CompletionState,
        object: EntityId,
        object_state: CompletionState,
    ) {
        tracing::trace!(
            "[DEPWALK]   {} ({}) after {} ({})",
            self.model.path(subject),
            subject_state,
            self.model.path(object),
            object_state
        );
        self.scheduler
            .depend(DependencyEdge::new(subject, subject_state, object, object_state));
        self.edges += 1;
    }
}
