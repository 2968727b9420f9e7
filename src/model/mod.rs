//! # Model Reflection
//!
//! Read-only view of the model entities a generator emits code for.
//!
//! The dependency walk only ever reads the model through [`Reflection`].
//! [`ModelStore`] is the in-memory implementation used by hosts that load
//! their model from JSON or build it programmatically.

mod store;
mod value;

pub use store::{Entity, EntityBody, MemberDescriptor, ModelStore, Parameter, TypeDescriptor, TypeShape};
pub use value::{Field, Value};

use crate::error::Result;
use crate::state::CompletionState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a model entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub usize);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Closed set of entity kinds the dependency rules dispatch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Instance,
    Type,
    Procedure,
    Member,
    Other,
}

/// A member through which a reference was reached
#[derive(Debug, Clone, Copy)]
pub struct MemberSite<'a> {
    pub id: EntityId,
    /// State condition expression attached to the member
    pub condition: Option<&'a str>,
    /// Whether the member's declared type is reference-like
    pub reference_type: bool,
}

/// A non-null reference found in an entity's value
#[derive(Debug, Clone, Copy)]
pub struct ReferenceSite<'a> {
    pub target: EntityId,
    /// Set when the reference is held directly by a member of a composite
    pub member: Option<MemberSite<'a>>,
}

/// Introspection facility over the model.
pub trait Reflection {
    /// The namespace root. Always available, never emitted.
    fn root(&self) -> EntityId;

    fn kind(&self, entity: EntityId) -> EntityKind;

    /// Named and reachable by name from the namespace root
    fn is_named(&self, entity: EntityId) -> bool;

    fn name(&self, entity: EntityId) -> Option<&str>;

    /// Parent of a named entity. Anonymous entities have none.
    fn parent(&self, entity: EntityId) -> Option<EntityId>;

    /// Named children, in insertion order
    fn scope(&self, entity: EntityId) -> &[EntityId];

    fn type_of(&self, entity: EntityId) -> Option<EntityId>;

    /// Base class of a class-like type
    fn base(&self, ty: EntityId) -> Option<EntityId>;

    fn is_class(&self, entity: EntityId) -> bool;

    /// Element type of a collection type
    fn element_type(&self, ty: EntityId) -> Option<EntityId>;

    /// Declared type of a member
    fn member_type(&self, member: EntityId) -> Option<EntityId>;

    /// Instances of `ty` are referred to by handle
    fn is_reference_type(&self, ty: EntityId) -> bool;

    /// Whether `ty` is the generic function type (as opposed to a method type)
    fn is_generic_function_type(&self, ty: EntityId) -> bool;

    /// Declared types of a procedure's parameters, in order
    fn parameter_types(&self, procedure: EntityId) -> Vec<EntityId>;

    /// Completeness a child of type `ty` requires of its parent
    fn parent_state(&self, ty: EntityId) -> CompletionState;

    /// False for value-less types without reference semantics
    fn defines_value(&self, ty: EntityId) -> bool;

    fn value(&self, entity: EntityId) -> Option<&Value>;

    /// Full path, for diagnostics
    fn path(&self, entity: EntityId) -> String;

    /// Call `visit` once per non-null reference in the value of `entity`.
    fn walk_references(
        &self,
        entity: EntityId,
        visit: &mut dyn FnMut(ReferenceSite<'_>) -> Result<()>,
    ) -> Result<()>;
}
