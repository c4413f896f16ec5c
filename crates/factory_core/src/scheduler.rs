//! Scheduler core: recipe expansion, the admission gate sequence, task
//! completion, and blocked-task retry.
//!
//! Priority-greedy, not optimal: the ready queue is a min-heap keyed
//! `(priority, task_id)`, ties broken by insertion order, and there is no
//! global feasibility analysis. Deadlock is detected structurally (empty
//! queue, empty active set, non-empty blocked set) by the factory shell.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ahash::{AHashMap, AHashSet};
use rand::Rng;
use smallvec::SmallVec;

use crate::catalog::FactoryContent;
use crate::error::{ExpansionError, SimError};
use crate::factory::FactoryState;
use crate::perf::{Requirements, RequirementsCache};
use crate::ring_log::LogLevel;
use crate::tasks::{
    production_parameters, BlockReason, CompletedTaskRecord, TaskState, TaskStatus,
};
use crate::thermal;
use crate::types::{
    ModuleId, ResourceId, TaskId, EXPANSION_DEFICIT_BUFFER, MAINTENANCE_DURATION_HOURS,
    MAX_TASK_STARTS_PER_STEP,
};

/// Tolerance for float comparisons on quantities (tons).
const QTY_EPSILON: f32 = 1e-4;

// ---------------------------------------------------------------------------
// Scheduler state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    /// Slab of task bodies keyed by `TaskId` (insertion index).
    pub tasks: Vec<TaskState>,
    /// Min-heap of `(priority, task_id)`; bodies never move on rebalance.
    ready: BinaryHeap<Reverse<(i32, u64)>>,
    pub blocked: AHashMap<TaskId, BlockReason>,
    pub active: Vec<TaskId>,
    pub completed_ids: AHashSet<TaskId>,
    pub completed_log: Vec<CompletedTaskRecord>,
    requirements_cache: RequirementsCache,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self {
            requirements_cache: RequirementsCache::default(),
            ..Self::default()
        }
    }

    pub fn task(&self, id: TaskId) -> &TaskState {
        &self.tasks[id.0 as usize]
    }

    pub fn task_mut(&mut self, id: TaskId) -> &mut TaskState {
        &mut self.tasks[id.0 as usize]
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn ready_is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    pub fn push_ready(&mut self, priority: i32, id: TaskId) {
        self.ready.push(Reverse((priority, id.0)));
    }

    fn pop_ready(&mut self) -> Option<TaskId> {
        self.ready.pop().map(|Reverse((_, id))| TaskId(id))
    }

    /// Blocked-task census keyed by reason, in a fixed reason order.
    pub fn blocked_counts(&self) -> Vec<(&'static str, usize)> {
        BlockReason::ALL
            .iter()
            .map(|reason| {
                let count = self.blocked.values().filter(|r| **r == *reason).count();
                (reason.as_str(), count)
            })
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Recipe expansion
// ---------------------------------------------------------------------------

/// Expands a production goal into a dependency tree of queued tasks.
///
/// On any failure the queue and task slab are restored to their pre-call
/// state; a failed expansion inserts nothing.
pub fn expand_production_task(
    state: &mut FactoryState,
    content: &FactoryContent,
    kind: ResourceId,
    quantity: f32,
    priority: i32,
) -> Result<TaskId, ExpansionError> {
    let checkpoint = state.sched.tasks.len() as u64;
    let mut visited: SmallVec<[ResourceId; 8]> = SmallVec::new();
    let result = expand_inner(state, content, kind, quantity, priority, &mut visited);
    if result.is_err() {
        rollback_expansion(state, checkpoint);
    }
    result
}

fn expand_inner(
    state: &mut FactoryState,
    content: &FactoryContent,
    kind: ResourceId,
    quantity: f32,
    priority: i32,
    visited: &mut SmallVec<[ResourceId; 8]>,
) -> Result<TaskId, ExpansionError> {
    let catalog = &content.catalog;

    if visited.contains(&kind) {
        let mut path: Vec<String> = visited
            .iter()
            .map(|id| catalog.resource_name(*id).to_string())
            .collect();
        path.push(catalog.resource_name(kind).to_string());
        return Err(ExpansionError::Cycle { path });
    }

    let Some(recipe) = catalog.recipe_for(kind) else {
        return Err(ExpansionError::NoRecipe {
            kind_name: catalog.resource_name(kind).to_string(),
        });
    };

    // Software lives in the library, never in physical storage.
    if !catalog.is_software(kind) {
        state
            .storage
            .can_store(catalog, kind, quantity)
            .map_err(|rejection| ExpansionError::Storage {
                kind_name: catalog.resource_name(kind).to_string(),
                quantity,
                rejection,
            })?;
    }

    // Allocate the parent before its children so ids follow creation order.
    let id = TaskId(state.sched.tasks.len() as u64);
    state
        .sched
        .tasks
        .push(TaskState::new(id, kind, quantity, priority, SmallVec::new()));

    visited.push(kind);
    let children = expand_children(state, content, recipe.clone(), quantity, priority, visited);
    // Scope exit doubles as the `finally` removal: sibling branches of the
    // caller never observe this subtree.
    visited.pop();
    let dependencies = children?;

    let task = state.sched.task_mut(id);
    task.dependencies = dependencies;
    state.sched.push_ready(priority, id);
    Ok(id)
}

fn expand_children(
    state: &mut FactoryState,
    content: &FactoryContent,
    recipe: crate::catalog::RecipeDef,
    quantity: f32,
    priority: i32,
    visited: &mut SmallVec<[ResourceId; 8]>,
) -> Result<SmallVec<[TaskId; 4]>, ExpansionError> {
    let catalog = &content.catalog;
    let config = &content.config;
    let mut dependencies: SmallVec<[TaskId; 4]> = SmallVec::new();

    let requirements =
        requirements_for(&mut state.sched.requirements_cache, &recipe, quantity);

    for (input, required) in requirements {
        let mut available = state.storage.quantity(input);
        if config.enable_waste_recycling {
            available += state.waste.recoverable(catalog, input);
        }
        if available + QTY_EPSILON < required {
            let deficit = (required - available) * EXPANSION_DEFICIT_BUFFER;
            let dep = expand_inner(state, content, input, deficit, priority + 1, visited)?;
            dependencies.push(dep);
        }
    }

    if config.enable_software_production {
        if let Some(software) = recipe.software_required {
            if !state.software.has(software) {
                let dep = expand_inner(state, content, software, 1.0, priority + 2, visited)?;
                dependencies.push(dep);
            }
        }
    }

    Ok(dependencies)
}

/// Per-execution input totals for `quantity` of the recipe's output, served
/// from the bounded LRU cache.
fn requirements_for(
    cache: &mut RequirementsCache,
    recipe: &crate::catalog::RecipeDef,
    quantity: f32,
) -> Requirements {
    if let Some(hit) = cache.get(recipe.output, quantity) {
        return hit;
    }
    let executions = quantity / recipe.output_qty;
    let requirements: Requirements = recipe
        .inputs
        .iter()
        .map(|&(input, qty_per_exec)| (input, qty_per_exec * executions))
        .collect();
    cache.insert(recipe.output, quantity, requirements.clone());
    requirements
}

fn rollback_expansion(state: &mut FactoryState, checkpoint: u64) {
    state.sched.tasks.truncate(checkpoint as usize);
    let kept: Vec<Reverse<(i32, u64)>> = state
        .sched
        .ready
        .drain()
        .filter(|Reverse((_, id))| *id < checkpoint)
        .collect();
    state.sched.ready = kept.into_iter().collect();
}

// ---------------------------------------------------------------------------
// Admission: the gate sequence
// ---------------------------------------------------------------------------

/// Pops up to the per-tick admission budget and runs each task through the
/// gates. Gate failures park the task in the blocked map.
pub(crate) fn admit_tasks(
    state: &mut FactoryState,
    content: &FactoryContent,
    rng: &mut impl Rng,
) -> Result<(), SimError> {
    let budget = MAX_TASK_STARTS_PER_STEP.min(content.config.parallel_processing_limit);
    for _ in 0..budget {
        let Some(task_id) = state.sched.pop_ready() else {
            break;
        };
        process_task(state, content, task_id, rng)?;
    }
    Ok(())
}

fn block_task(
    state: &mut FactoryState,
    content: &FactoryContent,
    task_id: TaskId,
    reason: BlockReason,
) {
    state.sched.task_mut(task_id).status = TaskStatus::Blocked(reason);
    state.sched.blocked.insert(task_id, reason);
    let output = state.sched.task(task_id).output;
    let message = format!(
        "task {task_id} ({}) {}",
        content.catalog.resource_name(output),
        reason.as_str()
    );
    state.push_log(LogLevel::Info, message);
}

/// Runs one queued task through the full gate sequence and starts it if every
/// gate passes. Returns `Err` only on internal invariant breaches.
#[allow(clippy::too_many_lines)]
pub(crate) fn process_task(
    state: &mut FactoryState,
    content: &FactoryContent,
    task_id: TaskId,
    rng: &mut impl Rng,
) -> Result<(), SimError> {
    let catalog = &content.catalog;
    let config = &content.config;

    let (output, quantity, priority) = {
        let task = state.sched.task(task_id);
        (task.output, task.quantity, task.priority)
    };
    let recipe = catalog
        .recipe_for(output)
        .ok_or_else(|| SimError::State {
            detail: format!("queued task {task_id} has no recipe for its output"),
        })?
        .clone();

    // Gate: dependencies.
    let deps_satisfied = {
        let task = state.sched.task(task_id);
        task.dependencies
            .iter()
            .all(|dep| state.sched.completed_ids.contains(dep))
    };
    if !deps_satisfied {
        block_task(state, content, task_id, BlockReason::Dependencies);
        return Ok(());
    }

    // Gate: module availability (right kind, free, runnable at temperature).
    let available: Vec<ModuleId> = state
        .modules
        .iter()
        .filter(|m| {
            m.kind == recipe.required_module
                && m.is_available()
                && m.effective_throughput(catalog.module_kind(m.kind)) > 0.0
        })
        .map(|m| m.id)
        .collect();
    if available.is_empty() {
        block_task(state, content, task_id, BlockReason::Module);
        return Ok(());
    }

    // Gates: tolerance and cleanroom capability.
    let qualified: Vec<ModuleId> = available
        .into_iter()
        .filter(|&id| {
            let module = state.modules.get(id);
            let def = catalog.module_kind(module.kind);
            if let Some(required_um) = recipe.tolerance_um {
                match def.tolerance_capability_um {
                    Some(capability) if capability <= required_um => {}
                    _ => return false,
                }
            }
            if let Some(required_class) = recipe.cleanroom_class {
                match &module.cleanroom {
                    Some(room) if room.class <= required_class => {}
                    _ => return false,
                }
            }
            true
        })
        .collect();
    let Some(&chosen) = qualified.first() else {
        block_task(state, content, task_id, BlockReason::Constraints);
        return Ok(());
    };

    // Gate: thermal. Projected module heat including this assignment.
    if config.enable_thermal_management {
        let def = catalog.module_kind(state.modules.get(chosen).kind);
        let current_heat: f32 = state
            .modules
            .iter()
            .map(|m| thermal::module_heat_kw(m.power_draw_kw(catalog.module_kind(m.kind))))
            .sum();
        let added = thermal::module_heat_kw(def.active_power_kw - def.idle_power_kw).max(0.0);
        if !thermal::is_feasible(current_heat + added, config) {
            block_task(state, content, task_id, BlockReason::Thermal);
            return Ok(());
        }
    }

    // Derived parameters are fixed at admission.
    let software_reliability = if config.enable_software_production {
        state.software.reliability(recipe.software_required)
    } else {
        1.0
    };
    let contamination_yield = if config.enable_contamination {
        match (recipe.cleanroom_class, &state.modules.get(chosen).cleanroom) {
            (Some(class), Some(room)) => room.contamination_yield(class),
            _ => 1.0,
        }
    } else {
        1.0
    };
    let def = catalog.module_kind(state.modules.get(chosen).kind).clone();
    let Some(params) = production_parameters(
        &recipe,
        quantity,
        state.modules.get(chosen),
        &def,
        catalog,
        config,
        software_reliability,
        contamination_yield,
        rng,
    ) else {
        block_task(state, content, task_id, BlockReason::Module);
        return Ok(());
    };

    // Gate: energy. Battery plus forecast solar over the task must cover it.
    let duration_h = params.setup_time_h + params.process_time_h;
    let forecast_kwh = state.energy.estimate_generation_kwh(
        config,
        state.meta.hour_of_day(),
        state.meta.day_of_year(),
        duration_h,
    );
    if state.energy.battery_charge_kwh + forecast_kwh < params.energy_required_kwh {
        block_task(state, content, task_id, BlockReason::Energy);
        return Ok(());
    }

    // Gate: resources. Every input on hand (counting recoverable waste).
    let requirements =
        requirements_for(&mut state.sched.requirements_cache, &recipe, quantity);
    let resources_ok = requirements.iter().all(|&(input, required)| {
        let mut available = state.storage.quantity(input);
        if config.enable_waste_recycling {
            available += state.waste.recoverable(catalog, input);
        }
        available + QTY_EPSILON >= required
    });
    if !resources_ok {
        block_task(state, content, task_id, BlockReason::Resources);
        return Ok(());
    }

    // All gates passed: consume inputs, reclaiming recyclable shortfalls.
    for &(input, required) in &requirements {
        let on_hand = state.storage.quantity(input);
        if on_hand + QTY_EPSILON < required && config.enable_waste_recycling {
            let reclaimed = state
                .waste
                .reclaim(catalog, input, required - on_hand);
            state.storage.seed(input, reclaimed);
        }
        let to_consume = required.min(state.storage.quantity(input));
        state.storage.consume(input, to_consume)?;
    }

    // Schedule input deliveries; the slowest leg extends the completion time.
    let transport_time_h = if config.enable_transport_time {
        let mut slowest: f32 = 0.0;
        for &(input, required) in &requirements {
            if required <= QTY_EPSILON {
                continue;
            }
            let (_, estimate) = state.transport.schedule_delivery(
                config,
                chosen,
                input,
                required,
                priority,
            );
            slowest = slowest.max(estimate);
        }
        slowest
    } else {
        0.0
    };

    state.energy.debit(params.energy_required_kwh);

    let module = state.modules.get_mut(chosen);
    module.current_task = Some(task_id);
    module.last_product = Some(output);

    let now = state.meta.tick;
    let dt = state.meta.dt_hours;
    let total_h = params.setup_time_h + params.process_time_h + transport_time_h;
    let ticks = (total_h / dt).ceil().max(1.0) as u64;

    let task = state.sched.task_mut(task_id);
    task.status = TaskStatus::Active;
    task.assigned_module = Some(chosen);
    task.setup_time_h = params.setup_time_h;
    task.process_time_h = params.process_time_h;
    task.transport_time_h = transport_time_h;
    task.start_tick = Some(now);
    task.completion_tick = Some(now + ticks);
    task.actual_output = params.actual_output;
    task.quality_rate = params.quality_rate;
    task.waste_generated_t = params.waste_total_t;
    task.waste_alloc = params.waste_alloc;
    task.energy_consumed_kwh = params.energy_required_kwh;
    task.software_reliability = software_reliability;
    task.contamination_yield = contamination_yield;

    state.sched.active.push(task_id);
    let message = format!(
        "task {task_id} ({}) started on module {chosen}, eta {total_h:.1} h",
        catalog.resource_name(output)
    );
    state.push_log(LogLevel::Info, message);
    Ok(())
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Completes every active task whose completion tick has arrived, in task-id
/// order. Completion effects land before this tick's new admissions.
pub(crate) fn advance_active(
    state: &mut FactoryState,
    content: &FactoryContent,
    rng: &mut impl Rng,
) -> Result<(), SimError> {
    let now = state.meta.tick;
    let mut due: Vec<TaskId> = state
        .sched
        .active
        .iter()
        .copied()
        .filter(|id| {
            state
                .sched
                .task(*id)
                .completion_tick
                .is_some_and(|t| t <= now)
        })
        .collect();
    due.sort_unstable();

    for task_id in due {
        complete_task(state, content, task_id, rng)?;
    }
    Ok(())
}

#[allow(clippy::too_many_lines)]
fn complete_task(
    state: &mut FactoryState,
    content: &FactoryContent,
    task_id: TaskId,
    rng: &mut impl Rng,
) -> Result<(), SimError> {
    let catalog = &content.catalog;
    let config = &content.config;
    let now = state.meta.tick;
    let dt = state.meta.dt_hours;

    let (output, quantity, actual_output, waste_alloc, waste_total, energy, process_h, setup_h) = {
        let task = state.sched.task(task_id);
        (
            task.output,
            task.quantity,
            task.actual_output,
            task.waste_alloc.clone(),
            task.waste_generated_t,
            task.energy_consumed_kwh,
            task.process_time_h,
            task.setup_time_h,
        )
    };

    // Release the module and book the wear.
    let assigned = state.sched.task(task_id).assigned_module;
    if let Some(module_id) = assigned {
        let def = catalog.module_kind(state.modules.get(module_id).kind).clone();
        let module = state.modules.get_mut(module_id);
        module.current_task = None;
        let failed_now =
            module.record_operation(setup_h + process_h, &def, config.enable_degradation, rng);
        if config.enable_contamination {
            if let Some(room) = &mut module.cleanroom {
                room.record_activity(process_h, 1.0);
            }
        }
        let needs_maintenance =
            config.enable_maintenance && !module.failed && module.needs_maintenance(&def);
        if needs_maintenance {
            let ticks = (MAINTENANCE_DURATION_HOURS / dt).ceil() as u64;
            module.begin_maintenance(now + ticks);
        }
        if failed_now {
            let message = format!("module {module_id} failed during task {task_id}");
            state.push_log(LogLevel::Warning, message);
        } else if needs_maintenance {
            let message = format!("module {module_id} entered scheduled maintenance");
            state.push_log(LogLevel::Info, message);
        }
    }

    // Waste first, then the output deposit.
    for &(kind, amount) in &waste_alloc {
        state.waste.add(kind, amount);
    }

    if catalog.is_software(output) {
        if config.enable_software_production {
            let package = state.software.develop(catalog, output, process_h);
            let message = format!(
                "software {} v{} released (bug rate {:.5})",
                catalog.resource_name(output),
                package.version,
                package.bug_rate
            );
            state.push_log(LogLevel::Info, message);
        }
    } else if let Err(rejection) = state.storage.store(catalog, output, actual_output) {
        let message = format!(
            "output of task {task_id} ({:.1} t {}) lost: {rejection}",
            actual_output,
            catalog.resource_name(output)
        );
        state.push_log(LogLevel::Warning, message);
    }

    // A completed module-kind product becomes a new instance immediately.
    if let Some(kind) = catalog.module_product(output) {
        let def = catalog.module_kind(kind);
        let new_id = state
            .modules
            .add(kind, def, config.ambient_temperature_c);
        let message = format!("module {new_id} ({}) commissioned", def.name);
        state.push_log(LogLevel::Info, message);
    }

    state.sched.active.retain(|id| *id != task_id);
    state.sched.task_mut(task_id).status = TaskStatus::Completed;
    state.sched.completed_ids.insert(task_id);

    let quality_yield = state.sched.task(task_id).quality_rate;
    state.sched.completed_log.push(CompletedTaskRecord {
        task_id: task_id.0,
        output: catalog.resource_name(output).to_string(),
        quantity,
        actual_output,
        energy_consumed: energy,
        completion_time: now as f32 * dt,
        quality_yield,
        waste_generated: waste_total,
    });

    let message = format!(
        "task {task_id} completed: {:.1} t {}",
        actual_output,
        catalog.resource_name(output)
    );
    state.push_log(LogLevel::Info, message);
    Ok(())
}

// ---------------------------------------------------------------------------
// Blocked-task retry
// ---------------------------------------------------------------------------

/// Re-evaluates the blocked map. Dependency-blocked tasks requeue only once
/// every ancestor is completed; every other reason requeues unconditionally
/// and lets the gates re-run.
pub(crate) fn retry_blocked(state: &mut FactoryState) {
    let mut entries: Vec<(TaskId, BlockReason)> =
        state.sched.blocked.iter().map(|(id, r)| (*id, *r)).collect();
    entries.sort_unstable_by_key(|(id, _)| *id);

    for (task_id, reason) in entries {
        if reason == BlockReason::Dependencies {
            let satisfied = state
                .sched
                .task(task_id)
                .dependencies
                .iter()
                .all(|dep| state.sched.completed_ids.contains(dep));
            if !satisfied {
                continue;
            }
        }
        state.sched.blocked.remove(&task_id);
        let priority = {
            let task = state.sched.task_mut(task_id);
            task.status = TaskStatus::Queued;
            task.priority
        };
        state.sched.push_ready(priority, task_id);
    }
}
