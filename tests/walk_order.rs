use depwalk::model::{Entity, EntityBody, MemberDescriptor, Parameter, TypeDescriptor, TypeShape};
use depwalk::{
    order_entities, walk_dependencies_with_scheduler, CompletionState, DependencyEdge, DepWalkError,
    EntityId, GenerationScope, GenerationSet, ModelStore, Phase, Reflection, Scheduler, SchedulingError,
    Step, Value, WalkConfig,
};
use std::cell::Cell;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn package(store: &mut ModelStore, name: &str) -> EntityId {
    let root = store.root();
    store.add(Entity {
        name: Some(name.to_string()),
        parent: Some(root),
        ..Entity::default()
    })
}

fn class(store: &mut ModelStore, parent: EntityId, name: &str, base: Option<EntityId>) -> EntityId {
    store.add_type(
        parent,
        name,
        TypeDescriptor::new(TypeShape::Composite { class: true, base }),
    )
}

fn position(steps: &[Step], step: Step) -> usize {
    steps
        .iter()
        .position(|s| *s == step)
        .unwrap_or_else(|| panic!("{:?} not in output", step))
}

fn count(steps: &[Step], step: Step) -> usize {
    steps.iter().filter(|s| **s == step).count()
}

fn walk(store: &ModelStore, scope: EntityId) -> Result<Vec<Step>, DepWalkError> {
    let mut set = GenerationScope::new(store);
    set.parse(scope, false, true);
    order_entities(store, &set, &WalkConfig::default())
}

#[test]
fn member_reference_orders_definitions() {
    init_tracing();
    let mut store = ModelStore::new();
    let app = package(&mut store, "app");
    let a = class(&mut store, app, "A", None);
    let b = class(&mut store, app, "B", None);
    store.add_member(b, "a", MemberDescriptor::new(a));

    let steps = walk(&store, app).unwrap();
    assert!(position(&steps, Step::declare(a)) < position(&steps, Step::define(a)));
    assert!(position(&steps, Step::define(a)) < position(&steps, Step::define(b)));
}

#[test]
fn value_reference_orders_definitions() {
    init_tracing();
    let mut store = ModelStore::new();
    let app = package(&mut store, "app");
    let node = store.add_type(
        app,
        "Node",
        TypeDescriptor::new(TypeShape::Composite { class: true, base: None }).reference(),
    );
    let next = store.add_member(node, "next", MemberDescriptor::new(node));
    let b = store.add_instance(app, "b", node, Value::Null);
    let a = store.add_instance(app, "a", node, Value::composite([("next", Value::reference(b))]));

    let steps = walk(&store, app).unwrap();
    assert!(position(&steps, Step::define(b)) < position(&steps, Step::define(a)));
    // A member holding its own type by handle only needs the type declared
    assert!(position(&steps, Step::declare(node)) < position(&steps, Step::define(next)));
    assert!(position(&steps, Step::define(next)) < position(&steps, Step::define(node)));
}

#[test]
fn instances_are_declared_after_their_type_is_defined() {
    init_tracing();
    let mut store = ModelStore::new();
    let app = package(&mut store, "app");
    let point = class(&mut store, app, "Point", None);
    let origin = store.add_instance(app, "origin", point, Value::Null);

    let steps = walk(&store, app).unwrap();
    assert!(position(&steps, Step::define(point)) < position(&steps, Step::declare(origin)));
}

#[test]
fn procedures_are_declared_after_parameter_types_are_complete() {
    init_tracing();
    let mut store = ModelStore::new();
    let lang = package(&mut store, "lang");
    let function = store.add_type(lang, "function", TypeDescriptor::new(TypeShape::Procedure { generic: true }));
    let app = package(&mut store, "app");
    let shape = class(&mut store, app, "Shape", None);
    let area = store.add_procedure(
        app,
        "area",
        function,
        vec![Parameter { name: "shape".to_string(), param_type: shape }],
    );

    let steps = walk(&store, app).unwrap();
    let declare = position(&steps, Step::declare(area));
    assert!(position(&steps, Step::declare(shape)) < declare);
    assert!(position(&steps, Step::define(shape)) < declare);
}

#[test]
fn methods_are_declared_after_the_base_is_defined() {
    init_tracing();
    let mut store = ModelStore::new();
    let lang = package(&mut store, "lang");
    let method = store.add_type(lang, "method", TypeDescriptor::new(TypeShape::Procedure { generic: false }));
    let app = package(&mut store, "app");
    let shape = class(&mut store, app, "Shape", None);
    let circle = class(&mut store, app, "Circle", Some(shape));
    let scale = store.add_procedure(circle, "scale", method, vec![]);

    let steps = walk(&store, app).unwrap();
    assert!(position(&steps, Step::define(shape)) < position(&steps, Step::declare(scale)));
}

#[test]
fn children_and_scopes_constrain_each_other() {
    init_tracing();
    let mut store = ModelStore::new();
    let app = package(&mut store, "app");
    let module = class(&mut store, app, "Module", None);
    let item_type = class(&mut store, app, "Item", None);
    let ns = store.add_instance(app, "ns", module, Value::Null);
    let item = store.add_instance(ns, "item", item_type, Value::Null);

    let steps = walk(&store, app).unwrap();
    assert!(position(&steps, Step::declare(ns)) < position(&steps, Step::declare(item)));
    assert!(position(&steps, Step::define(item)) < position(&steps, Step::define(ns)));
}

#[test]
fn equal_anonymous_entities_are_emitted_once() {
    init_tracing();
    let mut store = ModelStore::new();
    let app = package(&mut store, "app");
    let int = store.add_type(app, "int", TypeDescriptor::new(TypeShape::Primitive));
    let list = store.add_type(app, "IntList", TypeDescriptor::new(TypeShape::Collection { element: Some(int) }));
    let refs = store.add_type(app, "Refs", TypeDescriptor::new(TypeShape::Collection { element: None }));
    let first = store.add_anonymous(list, Value::Collection(vec![Value::Int(1), Value::Int(2)]));
    let second = store.add_anonymous(list, Value::Collection(vec![Value::Int(1), Value::Int(2)]));
    let x = store.add_instance(app, "x", refs, Value::Collection(vec![Value::reference(first)]));
    let y = store.add_instance(app, "y", refs, Value::Collection(vec![Value::reference(second)]));

    let steps = walk(&store, app).unwrap();
    assert_eq!(count(&steps, Step::declare(first)), 1);
    assert_eq!(count(&steps, Step::define(first)), 1);
    assert_eq!(count(&steps, Step::declare(second)), 0);
    assert_eq!(count(&steps, Step::define(second)), 0);
    assert!(position(&steps, Step::define(first)) < position(&steps, Step::define(x)));
    assert!(position(&steps, Step::define(first)) < position(&steps, Step::define(y)));
}

#[test]
fn anonymous_member_types_wait_for_their_element_type() {
    init_tracing();
    let mut store = ModelStore::new();
    let app = package(&mut store, "app");
    let holder = class(&mut store, app, "Holder", None);
    let point = class(&mut store, app, "Point", None);
    let list = store.add(Entity {
        body: EntityBody::Type(TypeDescriptor::new(TypeShape::Collection { element: Some(point) })),
        ..Entity::default()
    });
    let pts = store.add_member(holder, "pts", MemberDescriptor::new(list));
    let x = store.add_instance(app, "x", list, Value::Collection(vec![]));

    let steps = walk(&store, app).unwrap();
    assert_eq!(count(&steps, Step::define(list)), 1);
    assert!(position(&steps, Step::define(point)) < position(&steps, Step::define(list)));
    assert!(position(&steps, Step::define(list)) < position(&steps, Step::define(pts)));
    assert!(position(&steps, Step::define(pts)) < position(&steps, Step::define(holder)));
    assert!(position(&steps, Step::define(list)) < position(&steps, Step::declare(x)));
}

#[test]
fn every_entity_is_declared_and_defined_exactly_once() {
    init_tracing();
    let mut store = ModelStore::new();
    let app = package(&mut store, "app");
    let a = class(&mut store, app, "A", None);
    let b = class(&mut store, app, "B", Some(a));
    let lone = store.add_instance(app, "lone", a, Value::Null);

    let steps = walk(&store, app).unwrap();
    for e in [a, b, lone] {
        assert_eq!(count(&steps, Step::declare(e)), 1);
        assert_eq!(count(&steps, Step::define(e)), 1);
        assert!(position(&steps, Step::declare(e)) < position(&steps, Step::define(e)));
    }
    assert_eq!(steps.len(), 6);
}

#[test]
fn void_entities_are_not_defined() {
    init_tracing();
    let mut store = ModelStore::new();
    let app = package(&mut store, "app");
    let void = store.add_type(app, "void", TypeDescriptor::new(TypeShape::Void));
    let handle = store.add_type(app, "handle", TypeDescriptor::new(TypeShape::Void).reference());
    let nothing = store.add_instance(app, "nothing", void, Value::Null);
    let object = store.add_instance(app, "object", handle, Value::Null);

    let steps = walk(&store, app).unwrap();
    assert_eq!(count(&steps, Step::declare(nothing)), 1);
    assert_eq!(count(&steps, Step::define(nothing)), 0);
    assert_eq!(count(&steps, Step::define(object)), 1);
}

fn cyclic_model() -> (ModelStore, EntityId, [EntityId; 3]) {
    let mut store = ModelStore::new();
    let app = package(&mut store, "app");
    let node = store.add_type(app, "Node", TypeDescriptor::new(TypeShape::Collection { element: None }));
    let a = store.add_instance(app, "a", node, Value::Null);
    let b = store.add_instance(app, "b", node, Value::Null);
    let c = store.add_instance(app, "c", node, Value::Null);
    store.set_value(a, Value::Collection(vec![Value::reference(b)]));
    store.set_value(b, Value::Collection(vec![Value::reference(c)]));
    store.set_value(c, Value::Collection(vec![Value::reference(a)]));
    (store, app, [a, b, c])
}

#[test]
fn reference_cycle_is_a_scheduling_error() {
    init_tracing();
    let (store, app, _) = cyclic_model();

    let err = walk(&store, app).unwrap_err();
    match err {
        DepWalkError::Scheduling { cycle } => {
            let paths: Vec<_> = cycle.iter().map(|(path, _)| path.as_str()).collect();
            assert_eq!(paths, vec!["/app/a", "/app/b", "/app/c"]);
            assert!(cycle.iter().all(|(_, phase)| *phase == Phase::Define));
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Scheduler that must never be used
struct Untouchable;

impl Scheduler for Untouchable {
    fn insert(&mut self, _entity: EntityId) {
        panic!("scheduler used in bootstrap mode");
    }

    fn depend(&mut self, _edge: DependencyEdge) {
        panic!("scheduler used in bootstrap mode");
    }

    fn solve(&mut self) -> Result<Vec<Step>, SchedulingError> {
        panic!("scheduler used in bootstrap mode");
    }
}

#[test]
fn bootstrap_mode_emits_in_walk_order() {
    init_tracing();
    let (store, _, [a, b, c]) = cyclic_model();
    let mut set = GenerationScope::new(&store);
    set.parse(a, true, false).parse(b, true, false).parse(c, true, false);

    let mut steps = Vec::new();
    walk_dependencies_with_scheduler(&store, &set, &WalkConfig::bootstrap(), &mut Untouchable, &mut steps)
        .unwrap();

    assert_eq!(
        steps,
        vec![
            Step::declare(a),
            Step::declare(b),
            Step::declare(c),
            Step::define(a),
            Step::define(b),
            Step::define(c),
        ]
    );
}

/// Generation set whose second walk fails
struct FailsOnSecondWalk {
    entities: Vec<EntityId>,
    walks: Cell<usize>,
}

impl GenerationSet for FailsOnSecondWalk {
    fn must_parse(&self, _entity: EntityId) -> bool {
        true
    }

    fn walk_recursive(&self, visit: &mut dyn FnMut(EntityId) -> depwalk::Result<()>) -> depwalk::Result<()> {
        let walk = self.walks.get();
        self.walks.set(walk + 1);
        if walk > 0 {
            return Err(DepWalkError::traversal("/app", "scope changed during walk"));
        }
        for entity in &self.entities {
            visit(*entity)?;
        }
        Ok(())
    }
}

#[test]
fn bootstrap_failure_emits_nothing() {
    init_tracing();
    let (store, _, [a, b, c]) = cyclic_model();
    let set = FailsOnSecondWalk {
        entities: vec![a, b, c],
        walks: Cell::new(0),
    };

    let mut steps = Vec::new();
    let result =
        walk_dependencies_with_scheduler(&store, &set, &WalkConfig::bootstrap(), &mut Untouchable, &mut steps);

    assert!(matches!(result, Err(DepWalkError::Traversal { .. })));
    assert!(steps.is_empty());
}

#[test]
fn conditional_member_relaxes_requirement() {
    init_tracing();
    let mut store = ModelStore::new();
    let app = package(&mut store, "app");
    let flag = store.add_type(app, "bool", TypeDescriptor::new(TypeShape::Primitive));
    let node = store.add_type(
        app,
        "Node",
        TypeDescriptor::new(TypeShape::Composite { class: true, base: None }).reference(),
    );
    store.add_member(node, "owned", MemberDescriptor::new(flag));
    store.add_member(node, "peer", MemberDescriptor::new(node).with_condition("owned"));
    let a = store.add_instance(app, "a", node, Value::Null);
    let b = store.add_instance(app, "b", node, Value::Null);
    store.set_value(
        a,
        Value::composite([("owned", Value::Bool(false)), ("peer", Value::reference(b))]),
    );
    store.set_value(
        b,
        Value::composite([("owned", Value::Bool(false)), ("peer", Value::reference(a))]),
    );

    // Relaxed to Valid, so the mutual references form a cycle
    assert!(matches!(walk(&store, app), Err(DepWalkError::Scheduling { .. })));

    // A one-sided reference orders cleanly
    store.set_value(b, Value::composite([("owned", Value::Bool(true))]));
    let steps = walk(&store, app).unwrap();
    assert!(position(&steps, Step::define(b)) < position(&steps, Step::define(a)));
    assert!(position(&steps, Step::declare(b)) < position(&steps, Step::define(a)));
}

#[test]
fn invalid_condition_aborts_without_output() {
    init_tracing();
    let mut store = ModelStore::new();
    let app = package(&mut store, "app");
    let node = store.add_type(
        app,
        "Node",
        TypeDescriptor::new(TypeShape::Composite { class: true, base: None }).reference(),
    );
    store.add_member(node, "peer", MemberDescriptor::new(node).with_condition("peer.missing"));
    let a = store.add_instance(app, "a", node, Value::Null);
    store.add_instance(app, "b", node, Value::composite([("peer", Value::reference(a))]));

    let mut set = GenerationScope::new(&store);
    set.parse(app, false, true);
    let mut steps = Vec::new();
    let err = depwalk::walk_dependencies(&store, &set, &WalkConfig::default(), &mut steps).unwrap_err();

    assert!(matches!(err, DepWalkError::Predicate(_)));
    assert!(err.to_string().contains("/app/Node/peer"));
    assert!(steps.is_empty());
}

#[test]
fn model_loaded_from_json() {
    init_tracing();
    let doc = serde_json::json!({
        "entities": [
            { "name": "" },
            { "name": "app", "parent": 0 },
            { "name": "Point", "parent": 1,
              "body": { "kind": "type", "shape": { "composite": { "class": false } } } },
            { "name": "x", "parent": 2,
              "body": { "kind": "member", "type": 5 } },
            { "name": "origin", "parent": 1, "type": 2,
              "body": { "kind": "instance" },
              "value": { "composite": [ { "name": "x", "value": { "int": 0 } } ] } },
            { "name": "int", "parent": 1,
              "body": { "kind": "type", "shape": "primitive", "parent_state": "valid" } }
        ]
    });
    let store = ModelStore::from_json(&doc.to_string()).unwrap();
    let (app, point, origin, int) = (EntityId(1), EntityId(2), EntityId(4), EntityId(5));
    assert_eq!(store.path(origin), "/app/origin");
    assert_eq!(store.parent_state(int), CompletionState::Valid);

    let steps = walk(&store, app).unwrap();
    assert!(position(&steps, Step::define(point)) < position(&steps, Step::declare(origin)));
    assert_eq!(steps.len(), 8);
}

#[test]
fn self_typed_anonymous_entity_is_reported_as_a_cycle() {
    init_tracing();
    let doc = serde_json::json!({
        "entities": [
            { "name": "" },
            { "name": "app", "parent": 0 },
            { "type": 2, "body": { "kind": "instance" } },
            { "name": "x", "parent": 1, "type": 2, "body": { "kind": "instance" } }
        ]
    });
    let store = ModelStore::from_json(&doc.to_string()).unwrap();

    match walk(&store, EntityId(1)).unwrap_err() {
        DepWalkError::Scheduling { cycle } => {
            assert!(!cycle.is_empty());
            assert!(cycle.iter().all(|(path, _)| path == "<anonymous #2 of #2>"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
