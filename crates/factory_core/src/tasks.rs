//! Task model and derived production parameters.
//!
//! A task is a scheduled intent to execute one recipe for a requested output
//! quantity. The recipe reference is frozen implicitly: one recipe per output
//! kind, and the catalog never changes mid-run.

use rand::Rng;
use serde::Serialize;
use smallvec::SmallVec;

use crate::catalog::{Catalog, ModuleKindDef, RecipeDef};
use crate::modules::ModuleInstance;
use crate::noise::gaussian_noise;
use crate::types::{ModuleId, ResourceId, SimConfig, TaskId, QUALITY_FLOOR};

/// Fraction of yield-loss waste returned to the output's own kind when it is
/// recyclable.
const RECYCLABLE_WASTE_RETURN: f32 = 0.8;

/// Fraction of yield-loss waste routed to the generic waste kind otherwise.
const GENERIC_WASTE_FACTOR: f32 = 0.2;

/// Standard deviation of the per-task quality jitter.
const QUALITY_JITTER_STD: f32 = 0.02;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Which admission gate most recently refused the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BlockReason {
    Dependencies,
    Module,
    Constraints,
    Thermal,
    Energy,
    Resources,
}

impl BlockReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dependencies => "blocked_dependencies",
            Self::Module => "blocked_module",
            Self::Constraints => "blocked_constraints",
            Self::Thermal => "blocked_thermal",
            Self::Energy => "blocked_energy",
            Self::Resources => "blocked_resources",
        }
    }

    pub const ALL: [Self; 6] = [
        Self::Dependencies,
        Self::Module,
        Self::Constraints,
        Self::Thermal,
        Self::Energy,
        Self::Resources,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Queued,
    Active,
    Blocked(BlockReason),
    Completed,
}

// ---------------------------------------------------------------------------
// Task state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TaskState {
    pub id: TaskId,
    /// Lower = more urgent. Dependency tasks inherit parent priority + 1.
    pub priority: i32,
    pub output: ResourceId,
    pub quantity: f32,
    pub dependencies: SmallVec<[TaskId; 4]>,
    pub status: TaskStatus,
    pub assigned_module: Option<ModuleId>,
    pub setup_time_h: f32,
    pub process_time_h: f32,
    pub transport_time_h: f32,
    pub start_tick: Option<u64>,
    pub completion_tick: Option<u64>,
    /// Output after yield, fixed at admission.
    pub actual_output: f32,
    /// Yield fraction fixed at admission.
    pub quality_rate: f32,
    pub waste_generated_t: f32,
    /// Waste allocation deposited on completion.
    pub waste_alloc: SmallVec<[(ResourceId, f32); 2]>,
    pub energy_consumed_kwh: f32,
    pub software_reliability: f32,
    pub contamination_yield: f32,
}

impl TaskState {
    pub fn new(
        id: TaskId,
        output: ResourceId,
        quantity: f32,
        priority: i32,
        dependencies: SmallVec<[TaskId; 4]>,
    ) -> Self {
        Self {
            id,
            priority,
            output,
            quantity,
            dependencies,
            status: TaskStatus::Queued,
            assigned_module: None,
            setup_time_h: 0.0,
            process_time_h: 0.0,
            transport_time_h: 0.0,
            start_tick: None,
            completion_tick: None,
            actual_output: 0.0,
            quality_rate: 1.0,
            waste_generated_t: 0.0,
            waste_alloc: SmallVec::new(),
            energy_consumed_kwh: 0.0,
            software_reliability: 1.0,
            contamination_yield: 1.0,
        }
    }

    pub fn total_duration_h(&self) -> f32 {
        self.setup_time_h + self.process_time_h + self.transport_time_h
    }
}

/// Completed-task record embedded in the run log.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedTaskRecord {
    pub task_id: u64,
    pub output: String,
    pub quantity: f32,
    pub actual_output: f32,
    pub energy_consumed: f32,
    pub completion_time: f32,
    pub quality_yield: f32,
    pub waste_generated: f32,
}

// ---------------------------------------------------------------------------
// Derived production parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ProductionParameters {
    pub batch_size: f32,
    pub setup_time_h: f32,
    pub process_time_h: f32,
    pub quality_rate: f32,
    pub actual_output: f32,
    pub energy_required_kwh: f32,
    pub waste_alloc: SmallVec<[(ResourceId, f32); 2]>,
    pub waste_total_t: f32,
}

/// Computes everything the scheduler fixes at admission time.
///
/// Returns `None` when the module's temperature-derated throughput is not
/// positive; such a module cannot be assigned at all.
#[allow(clippy::too_many_arguments)]
pub fn production_parameters(
    recipe: &RecipeDef,
    quantity: f32,
    module: &ModuleInstance,
    def: &ModuleKindDef,
    catalog: &Catalog,
    config: &SimConfig,
    software_reliability: f32,
    contamination_yield: f32,
    rng: &mut impl Rng,
) -> Option<ProductionParameters> {
    let batch_size = if config.enable_batch_processing {
        quantity.clamp(def.min_batch, def.max_batch)
    } else {
        quantity
    };

    let setup_time_h = if module.last_product == Some(recipe.output) {
        0.0
    } else {
        def.setup_time_h
    };

    let throughput = module.effective_throughput(def);
    if throughput <= 0.0 {
        return None;
    }
    let process_time_h = batch_size / throughput;

    let quality_rate = if config.enable_quality_control {
        let jitter = 1.0 + gaussian_noise(rng, QUALITY_JITTER_STD);
        (def.base_quality * module.efficiency * contamination_yield * software_reliability * jitter)
            .clamp(QUALITY_FLOOR, 1.0)
    } else {
        1.0
    };

    let actual_output = batch_size * quality_rate;
    let yield_loss_t = batch_size * (1.0 - quality_rate);

    let mut waste_alloc: SmallVec<[(ResourceId, f32); 2]> = SmallVec::new();
    let mut waste_total_t = 0.0;
    if yield_loss_t > 0.0 {
        let output_def = catalog.resource(recipe.output);
        let (kind, amount) = if output_def.recyclable {
            (recipe.output, yield_loss_t * RECYCLABLE_WASTE_RETURN)
        } else {
            (
                catalog.default_waste_kind().unwrap_or(recipe.output),
                yield_loss_t * GENERIC_WASTE_FACTOR,
            )
        };
        waste_alloc.push((kind, amount));
        waste_total_t += amount;
    }
    // Fixed per-execution emissions scale with executions of the recipe.
    let executions = batch_size / recipe.output_qty;
    for &(kind, qty_per_exec) in &recipe.waste_products {
        let amount = qty_per_exec * executions;
        waste_alloc.push((kind, amount));
        waste_total_t += amount;
    }

    let energy_required_kwh =
        def.idle_power_kw * setup_time_h + def.active_power_kw * process_time_h;

    Some(ProductionParameters {
        batch_size,
        setup_time_h,
        process_time_h,
        quality_rate,
        actual_output,
        energy_required_kwh,
        waste_alloc,
        waste_total_t,
    })
}
