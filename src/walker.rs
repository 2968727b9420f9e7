//! # Dependency Walk
//!
//! Main entry points for walking a generation set in dependency order.

use crate::config::WalkConfig;
use crate::error::{DepWalkError, Result};
use crate::graph::{AnonymousGroups, GraphBuilder};
use crate::model::{EntityId, Reflection};
use crate::scheduler::{DepResolver, Scheduler, SchedulingError};
use crate::scope::GenerationSet;
use crate::state::{Phase, Step};

/// Receives the ordered Declare/Define callbacks
pub trait EmitHandler {
    fn on_declare(&mut self, entity: EntityId);
    fn on_define(&mut self, entity: EntityId);
}

impl EmitHandler for Vec<Step> {
    fn on_declare(&mut self, entity: EntityId) {
        self.push(Step::declare(entity));
    }

    fn on_define(&mut self, entity: EntityId) {
        self.push(Step::define(entity));
    }
}

/// Walk the generation set in dependency order
///
/// Every entity of `set` is declared once and defined once, and each step
/// runs only after the steps it depends on. Uses the default [`DepResolver`].
///
/// # Arguments
///
/// * `model` - Reflection over the model entities
/// * `set` - The entities to emit
/// * `config` - Walk options
/// * `handler` - Receives the Declare/Define callbacks
///
/// # Returns
///
/// * `Ok(())` - All callbacks were delivered
/// * `Err(DepWalkError)` - Nothing was delivered
pub fn walk_dependencies<M, G, H>(model: &M, set: &G, config: &WalkConfig, handler: &mut H) -> Result<()>
where
    M: Reflection + ?Sized,
    G: GenerationSet + ?Sized,
    H: EmitHandler + ?Sized,
{
    let mut resolver = DepResolver::new();
    walk_dependencies_with_scheduler(model, set, config, &mut resolver, handler)
}

/// Walk the generation set with a host-supplied scheduler
///
/// In bootstrap mode the scheduler is never used: all entities are declared
/// in raw walk order, then all are defined in the same order.
pub fn walk_dependencies_with_scheduler<M, G, S, H>(
    model: &M,
    set: &G,
    config: &WalkConfig,
    scheduler: &mut S,
    handler: &mut H,
) -> Result<()>
where
    M: Reflection + ?Sized,
    G: GenerationSet + ?Sized,
    S: Scheduler + ?Sized,
    H: EmitHandler + ?Sized,
{
    tracing::info!("[DEPWALK] Starting dependency walk");

    if config.bootstrap {
        tracing::info!("[DEPWALK] Bootstrap mode: dependencies are disregarded");
        let steps = bootstrap_walk(set)?;
        emit(model, handler, steps);
        return Ok(());
    }

    // Phase 1: Build dependency administration
    tracing::info!("[DEPWALK] Phase 1: Building dependency graph...");
    let mut groups = AnonymousGroups::new();
    let edges = {
        let mut builder = GraphBuilder::new(model, set, &mut *scheduler, &mut groups);
        if let Err(err) = set.walk_recursive(&mut |entity| builder.build(entity)) {
            tracing::debug!("[DEPWALK] Dependency builder failed: {}", err);
            return Err(err);
        }
        builder.edge_count()
    };
    tracing::info!(
        "[DEPWALK]   - {} edges, {} anonymous representatives",
        edges,
        groups.len()
    );
    drop(groups);

    // Phase 2: Order
    tracing::info!("[DEPWALK] Phase 2: Ordering...");
    let steps = scheduler.solve().map_err(|err| scheduling_error(model, err))?;

    // Phase 3: Emit
    tracing::info!("[DEPWALK] Phase 3: Emitting {} steps", steps.len());
    emit(model, handler, steps);

    tracing::info!("[DEPWALK] Dependency walk complete");
    Ok(())
}

/// Walk the generation set and collect the ordered steps
pub fn order_entities<M, G>(model: &M, set: &G, config: &WalkConfig) -> Result<Vec<Step>>
where
    M: Reflection + ?Sized,
    G: GenerationSet + ?Sized,
{
    let mut steps = Vec::new();
    walk_dependencies(model, set, config, &mut steps)?;
    Ok(steps)
}

/// All declares in walk order, then all defines in the same order
fn bootstrap_walk<G: GenerationSet + ?Sized>(set: &G) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    set.walk_recursive(&mut |entity| {
        steps.push(Step::declare(entity));
        Ok(())
    })?;
    set.walk_recursive(&mut |entity| {
        steps.push(Step::define(entity));
        Ok(())
    })?;
    Ok(steps)
}

fn emit<M, H>(model: &M, handler: &mut H, steps: Vec<Step>)
where
    M: Reflection + ?Sized,
    H: EmitHandler + ?Sized,
{
    for step in steps {
        match step.phase {
            Phase::Declare => handler.on_declare(step.entity),
            Phase::Define => define(model, handler, step.entity),
        }
    }
}

/// Define steps are meaningless for value-less types without reference
/// semantics
fn define<M, H>(model: &M, handler: &mut H, entity: EntityId)
where
    M: Reflection + ?Sized,
    H: EmitHandler + ?Sized,
{
    let defines_value = model
        .type_of(entity)
        .map(|ty| model.defines_value(ty))
        .unwrap_or(true);
    if defines_value {
        handler.on_define(entity);
    } else {
        tracing::debug!("[DEPWALK] Skipping define of {}", model.path(entity));
    }
}

fn scheduling_error<M: Reflection + ?Sized>(model: &M, err: SchedulingError) -> DepWalkError {
    match err {
        SchedulingError::Cycle { steps } => DepWalkError::Scheduling {
            cycle: steps
                .into_iter()
                .map(|step| (model.path(step.entity), step.phase))
                .collect(),
        },
    }
}
