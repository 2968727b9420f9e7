//! # Generator Dependency Walker (depwalk)
//!
//! Orders the model entities a code generator emits so that every reference
//! in the generated code points at something that is already declared or
//! defined, whichever the reference needs.
//!
//! Each entity receives two callbacks: `Declare` (forward-visible, safe to
//! reference by handle) and `Define` (complete, safe to use by value). The
//! walker derives the dependencies between these steps from the model:
//! - an entity is declared only after its type is defined
//! - methods are declared only after the base of their class is defined
//! - procedures are declared only after their parameter types are complete
//! - children and their scopes constrain each other per type
//! - values are defined only after the entities they reference
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use depwalk::{order_entities, GenerationScope, ModelStore, Reflection, WalkConfig};
//!
//! let model = ModelStore::from_json(&std::fs::read_to_string("model.json")?)?;
//! let mut set = GenerationScope::new(&model);
//! // Generate for everything under the namespace root
//! set.parse(model.root(), false, true);
//!
//! match order_entities(&model, &set, &WalkConfig::default()) {
//!     Ok(steps) => {
//!         for step in steps {
//!             println!("{} {}", step.phase, step.entity);
//!         }
//!     }
//!     Err(e) => eprintln!("Dependency walk failed: {}", e),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! A walk is a construct-then-solve pipeline:
//!
//! 1. **Graph Construction** - Walk the generation set and submit the edges of
//!    every entity to the scheduler, collapsing equal anonymous entities
//! 2. **Ordering** - Solve the whole graph at once; cycles are errors
//! 3. **Emission** - Deliver the ordered callbacks
//!
//! Bootstrap mode skips the first two phases and emits in raw walk order.

pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod scheduler;
pub mod scope;
pub mod state;
pub mod walker;

// Re-export the main walk API
pub use walker::{
    order_entities,
    walk_dependencies,
    walk_dependencies_with_scheduler,
    EmitHandler,
};

pub use config::WalkConfig;
pub use error::{DepWalkError, ModelError, PredicateError, Result};
pub use graph::{structurally_equal, AnonymousGroups, GraphBuilder};
pub use model::{EntityId, EntityKind, ModelStore, Reflection, Value};
pub use scheduler::{DepResolver, Scheduler, SchedulingError};
pub use scope::{GenerationScope, GenerationSet};
pub use state::{CompletionState, DependencyEdge, Phase, Step};
