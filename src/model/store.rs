//! In-memory model store.

use super::{EntityId, EntityKind, MemberSite, ReferenceSite, Reflection, Value};
use crate::error::{DepWalkError, ModelError, Result};
use crate::state::CompletionState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entity {
    /// `None` for anonymous entities
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent: Option<EntityId>,
    #[serde(default, rename = "type")]
    pub type_of: Option<EntityId>,
    #[serde(default)]
    pub body: EntityBody,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EntityBody {
    Instance,
    Type(TypeDescriptor),
    Procedure {
        #[serde(default)]
        parameters: Vec<Parameter>,
    },
    Member(MemberDescriptor),
    #[default]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub shape: TypeShape,
    /// Instances are referred to by handle
    #[serde(default)]
    pub reference: bool,
    /// Completeness required of the parent of an instance of this type
    #[serde(default = "default_parent_state")]
    pub parent_state: CompletionState,
}

fn default_parent_state() -> CompletionState {
    CompletionState::Declared
}

impl TypeDescriptor {
    pub fn new(shape: TypeShape) -> Self {
        Self {
            shape,
            reference: false,
            parent_state: default_parent_state(),
        }
    }

    pub fn reference(mut self) -> Self {
        self.reference = true;
        self
    }

    pub fn with_parent_state(mut self, state: CompletionState) -> Self {
        self.parent_state = state;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeShape {
    Void,
    Primitive,
    /// Members are the `Member` children of the type, base members first
    Composite {
        #[serde(default)]
        class: bool,
        #[serde(default)]
        base: Option<EntityId>,
    },
    Collection {
        #[serde(default)]
        element: Option<EntityId>,
    },
    Procedure {
        /// The generic function type, as opposed to method types
        #[serde(default)]
        generic: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDescriptor {
    #[serde(rename = "type")]
    pub member_type: EntityId,
    /// Member path evaluated against the owning value; when false the
    /// member's completion requirement is relaxed
    #[serde(default)]
    pub state_condition: Option<String>,
    /// Local members are never serialized and create no dependencies
    #[serde(default)]
    pub local: bool,
}

impl MemberDescriptor {
    pub fn new(member_type: EntityId) -> Self {
        Self {
            member_type,
            state_condition: None,
            local: false,
        }
    }

    pub fn with_condition(mut self, expr: impl Into<String>) -> Self {
        self.state_condition = Some(expr.into());
        self
    }

    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: EntityId,
}

#[derive(Deserialize)]
struct Document {
    entities: Vec<Entity>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    entities: &'a [Entity],
}

/// Model entities held in memory. Entity `#0` is the namespace root.
#[derive(Debug, Clone)]
pub struct ModelStore {
    entities: Vec<Entity>,
    children: Vec<Vec<EntityId>>,
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelStore {
    pub fn new() -> Self {
        let root = Entity {
            name: Some(String::new()),
            ..Entity::default()
        };
        Self {
            entities: vec![root],
            children: vec![Vec::new()],
        }
    }

    /// Load a model from a JSON document of the form `{"entities": [...]}`.
    pub fn from_json(json: &str) -> std::result::Result<Self, ModelError> {
        let document: Document = serde_json::from_str(json)?;
        if document.entities.is_empty() {
            return Err(ModelError::MissingRoot);
        }

        let count = document.entities.len();
        for (index, entity) in document.entities.iter().enumerate() {
            for (target, role) in entity_references(entity) {
                if target.0 >= count {
                    return Err(ModelError::UnknownReference {
                        entity: index,
                        target: target.0,
                        role,
                    });
                }
            }
        }

        // Parents may appear after their children in the document
        let mut children = vec![Vec::new(); count];
        for (index, entity) in document.entities.iter().enumerate() {
            if let (Some(_), Some(parent)) = (&entity.name, entity.parent) {
                children[parent.0].push(EntityId(index));
            }
        }
        let store = Self {
            entities: document.entities,
            children,
        };
        tracing::debug!("[DEPWALK] Loaded model with {} entities", store.len());
        Ok(store)
    }

    pub fn to_json(&self) -> std::result::Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(&DocumentRef { entities: &self.entities })?)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    /// Add an entity. Named entities with a parent join the parent's scope.
    pub fn add(&mut self, entity: Entity) -> EntityId {
        self.push(entity)
    }

    pub fn add_type(&mut self, parent: EntityId, name: &str, descriptor: TypeDescriptor) -> EntityId {
        self.push(Entity {
            name: Some(name.to_string()),
            parent: Some(parent),
            body: EntityBody::Type(descriptor),
            ..Entity::default()
        })
    }

    pub fn add_instance(&mut self, parent: EntityId, name: &str, ty: EntityId, value: Value) -> EntityId {
        self.push(Entity {
            name: Some(name.to_string()),
            parent: Some(parent),
            type_of: Some(ty),
            body: EntityBody::Instance,
            value,
        })
    }

    pub fn add_procedure(
        &mut self,
        parent: EntityId,
        name: &str,
        ty: EntityId,
        parameters: Vec<Parameter>,
    ) -> EntityId {
        self.push(Entity {
            name: Some(name.to_string()),
            parent: Some(parent),
            type_of: Some(ty),
            body: EntityBody::Procedure { parameters },
            ..Entity::default()
        })
    }

    pub fn add_member(&mut self, owner: EntityId, name: &str, descriptor: MemberDescriptor) -> EntityId {
        self.push(Entity {
            name: Some(name.to_string()),
            parent: Some(owner),
            body: EntityBody::Member(descriptor),
            ..Entity::default()
        })
    }

    pub fn add_anonymous(&mut self, ty: EntityId, value: Value) -> EntityId {
        self.push(Entity {
            type_of: Some(ty),
            body: EntityBody::Instance,
            value,
            ..Entity::default()
        })
    }

    pub fn set_value(&mut self, entity: EntityId, value: Value) {
        if let Some(e) = self.entities.get_mut(entity.0) {
            e.value = value;
        }
    }

    /// Members of a composite type, base members first.
    pub fn members(&self, ty: EntityId) -> Vec<EntityId> {
        let mut chain = Vec::new();
        let mut current = Some(ty);
        while let Some(t) = current {
            if chain.contains(&t) || chain.len() > self.entities.len() {
                break;
            }
            chain.push(t);
            current = self.base(t);
        }

        chain
            .iter()
            .rev()
            .flat_map(|t| self.scope(*t).iter().copied())
            .filter(|m| matches!(self.body(*m), Some(EntityBody::Member(_))))
            .collect()
    }

    fn push(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len());
        if let (Some(_), Some(parent)) = (&entity.name, entity.parent) {
            if let Some(scope) = self.children.get_mut(parent.0) {
                scope.push(id);
            }
        }
        self.entities.push(entity);
        self.children.push(Vec::new());
        id
    }

    fn body(&self, id: EntityId) -> Option<&EntityBody> {
        self.entity(id).map(|e| &e.body)
    }

    fn type_descriptor(&self, id: EntityId) -> Option<&TypeDescriptor> {
        match self.body(id) {
            Some(EntityBody::Type(descriptor)) => Some(descriptor),
            _ => None,
        }
    }

    fn member_descriptor(&self, id: EntityId) -> Option<&MemberDescriptor> {
        match self.body(id) {
            Some(EntityBody::Member(descriptor)) => Some(descriptor),
            _ => None,
        }
    }

    fn walk_value(
        &self,
        owner: EntityId,
        value: &Value,
        ty: Option<EntityId>,
        member: Option<EntityId>,
        visit: &mut dyn FnMut(ReferenceSite<'_>) -> Result<()>,
    ) -> Result<()> {
        match value {
            Value::Reference(Some(target)) => {
                if self.entity(*target).is_none() {
                    return Err(DepWalkError::traversal(
                        self.path(owner),
                        format!("dangling reference to {}", target),
                    ));
                }
                let member = member.and_then(|m| {
                    self.member_descriptor(m).map(|d| MemberSite {
                        id: m,
                        condition: d.state_condition.as_deref(),
                        reference_type: self.is_reference_type(d.member_type),
                    })
                });
                visit(ReferenceSite { target: *target, member })
            }
            Value::Composite(fields) => {
                let ty = ty.ok_or_else(|| {
                    DepWalkError::traversal(self.path(owner), "composite value without a type")
                })?;
                let members = self.members(ty);
                for field in fields {
                    let m = members
                        .iter()
                        .copied()
                        .find(|m| self.name(*m) == Some(field.name.as_str()))
                        .ok_or_else(|| {
                            DepWalkError::traversal(
                                self.path(owner),
                                format!("type '{}' has no member '{}'", self.path(ty), field.name),
                            )
                        })?;
                    let Some(descriptor) = self.member_descriptor(m) else {
                        continue;
                    };
                    if descriptor.local {
                        continue;
                    }
                    self.walk_value(owner, &field.value, Some(descriptor.member_type), Some(m), visit)?;
                }
                Ok(())
            }
            Value::Collection(items) => {
                let element = ty.and_then(|t| self.element_type(t));
                for item in items {
                    self.walk_value(owner, item, element, None, visit)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Entity ids an entity refers to, value included.
fn entity_references(entity: &Entity) -> Vec<(EntityId, &'static str)> {
    let mut refs = Vec::new();
    if let Some(parent) = entity.parent {
        refs.push((parent, "parent"));
    }
    if let Some(ty) = entity.type_of {
        refs.push((ty, "type"));
    }
    match &entity.body {
        EntityBody::Type(descriptor) => match &descriptor.shape {
            TypeShape::Composite { base: Some(base), .. } => refs.push((*base, "base")),
            TypeShape::Collection { element: Some(element) } => refs.push((*element, "element")),
            _ => {}
        },
        EntityBody::Procedure { parameters } => {
            refs.extend(parameters.iter().map(|p| (p.param_type, "parameter")));
        }
        EntityBody::Member(descriptor) => refs.push((descriptor.member_type, "member type")),
        EntityBody::Instance | EntityBody::Other => {}
    }
    value_references(&entity.value, &mut refs);
    refs
}

fn value_references(value: &Value, refs: &mut Vec<(EntityId, &'static str)>) {
    match value {
        Value::Reference(Some(target)) => refs.push((*target, "value")),
        Value::Composite(fields) => {
            for field in fields {
                value_references(&field.value, refs);
            }
        }
        Value::Collection(items) => {
            for item in items {
                value_references(item, refs);
            }
        }
        _ => {}
    }
}

impl Reflection for ModelStore {
    fn root(&self) -> EntityId {
        EntityId(0)
    }

    fn kind(&self, entity: EntityId) -> EntityKind {
        match self.body(entity) {
            Some(EntityBody::Instance) => EntityKind::Instance,
            Some(EntityBody::Type(_)) => EntityKind::Type,
            Some(EntityBody::Procedure { .. }) => EntityKind::Procedure,
            Some(EntityBody::Member(_)) => EntityKind::Member,
            Some(EntityBody::Other) | None => EntityKind::Other,
        }
    }

    fn is_named(&self, entity: EntityId) -> bool {
        let root = self.root();
        let mut current = entity;
        for _ in 0..=self.entities.len() {
            if current == root {
                return true;
            }
            match self.entity(current) {
                Some(Entity { name: Some(_), parent: Some(parent), .. }) => current = *parent,
                _ => return false,
            }
        }
        false
    }

    fn name(&self, entity: EntityId) -> Option<&str> {
        self.entity(entity).and_then(|e| e.name.as_deref())
    }

    fn parent(&self, entity: EntityId) -> Option<EntityId> {
        self.entity(entity)
            .filter(|e| e.name.is_some())
            .and_then(|e| e.parent)
    }

    fn scope(&self, entity: EntityId) -> &[EntityId] {
        self.children.get(entity.0).map(Vec::as_slice).unwrap_or(&[])
    }

    fn type_of(&self, entity: EntityId) -> Option<EntityId> {
        self.entity(entity).and_then(|e| e.type_of)
    }

    fn base(&self, ty: EntityId) -> Option<EntityId> {
        match self.type_descriptor(ty).map(|d| &d.shape) {
            Some(TypeShape::Composite { base, .. }) => *base,
            _ => None,
        }
    }

    fn is_class(&self, entity: EntityId) -> bool {
        matches!(
            self.type_descriptor(entity).map(|d| &d.shape),
            Some(TypeShape::Composite { class: true, .. })
        )
    }

    fn element_type(&self, ty: EntityId) -> Option<EntityId> {
        match self.type_descriptor(ty).map(|d| &d.shape) {
            Some(TypeShape::Collection { element }) => *element,
            _ => None,
        }
    }

    fn member_type(&self, member: EntityId) -> Option<EntityId> {
        self.member_descriptor(member).map(|d| d.member_type)
    }

    fn is_reference_type(&self, ty: EntityId) -> bool {
        self.type_descriptor(ty).map(|t| t.reference).unwrap_or(false)
    }

    fn is_generic_function_type(&self, ty: EntityId) -> bool {
        matches!(
            self.type_descriptor(ty).map(|d| &d.shape),
            Some(TypeShape::Procedure { generic: true })
        )
    }

    fn parameter_types(&self, procedure: EntityId) -> Vec<EntityId> {
        match self.body(procedure) {
            Some(EntityBody::Procedure { parameters }) => parameters.iter().map(|p| p.param_type).collect(),
            _ => Vec::new(),
        }
    }

    fn parent_state(&self, ty: EntityId) -> CompletionState {
        self.type_descriptor(ty)
            .map(|d| d.parent_state)
            .unwrap_or_else(default_parent_state)
    }

    fn defines_value(&self, ty: EntityId) -> bool {
        match self.type_descriptor(ty) {
            Some(descriptor) => descriptor.shape != TypeShape::Void || descriptor.reference,
            None => true,
        }
    }

    fn value(&self, entity: EntityId) -> Option<&Value> {
        self.entity(entity).map(|e| &e.value)
    }

    fn path(&self, entity: EntityId) -> String {
        if entity == self.root() {
            return "/".to_string();
        }
        if !self.is_named(entity) {
            // Anonymous types may form cycles, so only named types are expanded
            return match self.type_of(entity) {
                Some(ty) if self.is_named(ty) => format!("<anonymous {} of {}>", entity, self.path(ty)),
                Some(ty) => format!("<anonymous {} of {}>", entity, ty),
                None => format!("<anonymous {}>", entity),
            };
        }

        let mut segments = Vec::new();
        let mut current = Some(entity);
        while let Some(e) = current.filter(|e| *e != self.root()) {
            segments.push(self.name(e).unwrap_or_default());
            current = self.parent(e);
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    fn walk_references(
        &self,
        entity: EntityId,
        visit: &mut dyn FnMut(ReferenceSite<'_>) -> Result<()>,
    ) -> Result<()> {
        let e = self
            .entity(entity)
            .ok_or_else(|| DepWalkError::traversal(entity.to_string(), "unknown entity"))?;
        self.walk_value(entity, &e.value, e.type_of, None, visit)
    }
}
