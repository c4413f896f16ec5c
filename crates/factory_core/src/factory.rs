//! Factory shell: owns every state container, runs the fixed-step loop,
//! seeds the replication goals, and decides termination.
//!
//! Order of operations per tick:
//! 1. Energy balance (generation, module/cooling/transport draw, battery).
//! 2. Transport advancement.
//! 3. Active-task completion.
//! 4. Maintenance resolution.
//! 5. Weekly cleanroom cleaning and idle particle drift.
//! 6. New-task admission through the gate sequence.
//! 7. Deadlock census (the structural condition, sampled before retry).
//! 8. Blocked-task retry (every 10 ticks).
//! 9. Metric sample (every simulated hour).
//! 10. Clock advance and panel aging.

use rand::Rng;

use crate::catalog::FactoryContent;
use crate::energy::EnergyState;
use crate::error::{ExpansionError, SimError};
use crate::metrics::{self, MetricsSeries, RunLog};
use crate::modules::ModuleRegistry;
use crate::ring_log::{LogEntry, LogLevel, RingLog};
use crate::scheduler::{self, SchedulerState};
use crate::software::SoftwareLibrary;
use crate::storage::Storage;
use crate::thermal::{self, ThermalLoad};
use crate::transport::TransportSystem;
use crate::types::{
    MetaState, TaskId, BLOCKED_RETRY_INTERVAL_TICKS, CLEANROOM_CLEAN_INTERVAL_HOURS,
    MAINTENANCE_DURATION_HOURS, METRIC_COLLECTION_INTERVAL_HOURS,
};
use crate::waste::WasteStream;

/// Operating temperature offset for a module with a running task.
const ACTIVE_MODULE_TEMP_RISE_C: f32 = 10.0;

/// Consecutive deadlock-census hits before the run is declared dead. Two
/// full retry cycles: a dependency-blocked task waiting out one retry
/// interval after its ancestor completed can hold the condition for at most
/// one interval, so it never reaches this.
const DEADLOCK_CONFIRM_TICKS: u64 = 2 * BLOCKED_RETRY_INTERVAL_TICKS;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FactoryState {
    pub meta: MetaState,
    pub storage: Storage,
    pub energy: EnergyState,
    pub modules: ModuleRegistry,
    pub transport: TransportSystem,
    pub waste: WasteStream,
    pub software: SoftwareLibrary,
    pub sched: SchedulerState,
    pub metrics: MetricsSeries,
    pub log: RingLog,
    /// Most recent thermal summary, refreshed by the energy step.
    pub thermal: ThermalLoad,
    /// Top-level tasks seeded from the replication goals.
    pub goal_tasks: Vec<TaskId>,
    /// Consecutive ticks the deadlock census found the structural condition.
    deadlock_streak_ticks: u64,
}

impl FactoryState {
    pub fn new(content: &FactoryContent, seed: u64) -> Self {
        let config = &content.config;
        Self {
            meta: MetaState::new(seed, config.dt_hours),
            storage: Storage::new(
                config.max_storage_volume_m3,
                config.max_storage_weight_tons,
                config.temperature_controlled_storage,
                config.enable_storage_limits,
                content.catalog.resource_count(),
            ),
            energy: EnergyState::new(config),
            modules: ModuleRegistry::new(),
            transport: TransportSystem::new(config),
            waste: WasteStream::new(content.catalog.resource_count()),
            software: SoftwareLibrary::new(),
            sched: SchedulerState::new(),
            metrics: MetricsSeries::default(),
            log: RingLog::new(),
            thermal: ThermalLoad::default(),
            goal_tasks: Vec::new(),
            deadlock_streak_ticks: 0,
        }
    }

    pub fn time_hours(&self) -> f32 {
        self.meta.time_hours()
    }

    /// Appends a ring-log entry stamped with the current thermal and waste
    /// context.
    pub fn push_log(&mut self, level: LogLevel, message: String) {
        self.log.push(LogEntry {
            timestamp: self.meta.time_hours(),
            level,
            message,
            thermal_load: self.thermal.module_heat_kw,
            waste_total: self.waste.generated_total_t(),
        });
    }

    /// All seeded goals are in the completed set.
    pub fn goals_achieved(&self) -> bool {
        !self.goal_tasks.is_empty()
            && self
                .goal_tasks
                .iter()
                .all(|id| self.sched.completed_ids.contains(id))
    }

    /// Structural deadlock condition: nothing queued, nothing running,
    /// something blocked.
    pub fn is_deadlocked(&self) -> bool {
        self.sched.ready_is_empty()
            && self.sched.active.is_empty()
            && !self.sched.blocked.is_empty()
    }

    /// [`FactoryState::is_deadlocked`] holds now and the per-tick census has
    /// seen it hold for two full retry cycles. The census samples between
    /// admission and retry, so a blocked task cycling queue -> gates ->
    /// blocked keeps its streak while one merely waiting out a retry
    /// interval breaks it the moment it starts.
    pub fn deadlock_confirmed(&self) -> bool {
        self.is_deadlocked() && self.deadlock_streak_ticks >= DEADLOCK_CONFIRM_TICKS
    }
}

/// Expands one production task per replication target and records the goal
/// task ids. Fatal if any target has no producing recipe or the expansion
/// hits a cycle.
pub fn seed_goals(
    state: &mut FactoryState,
    content: &FactoryContent,
) -> Result<(), ExpansionError> {
    for (index, &kind) in content.target_modules.iter().enumerate() {
        let def = content.catalog.module_kind(kind);
        let Some(product) = content.catalog.product_for_module_kind(kind) else {
            return Err(ExpansionError::NoRecipe {
                kind_name: def.name.clone(),
            });
        };
        let task = scheduler::expand_production_task(state, content, product, 1.0, index as i32)?;
        state.goal_tasks.push(task);
        let message = format!("goal seeded: build {} (task {task})", def.name);
        state.push_log(LogLevel::Info, message);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// Advances the simulation by one fixed step.
pub fn tick(
    state: &mut FactoryState,
    content: &FactoryContent,
    rng: &mut impl Rng,
) -> Result<(), SimError> {
    let config = &content.config;
    let dt = state.meta.dt_hours;

    // 1. Energy balance.
    let module_draw_kw: f32 = state
        .modules
        .iter()
        .map(|m| m.power_draw_kw(content.catalog.module_kind(m.kind)))
        .sum();
    let module_heat_kw = thermal::module_heat_kw(module_draw_kw);
    state.thermal = thermal::load_summary(module_heat_kw, config);
    let transport_draw_kw = state.transport.power_draw_kw();

    let generation_kw = state.energy.solar_generation_kw(
        config,
        state.meta.hour_of_day(),
        state.meta.day_of_year(),
        rng,
    );
    let consumption_kw = module_draw_kw + state.thermal.cooling_power_kw + transport_draw_kw;
    state
        .energy
        .apply_net(generation_kw - consumption_kw, dt, config.battery_efficiency);
    state.energy.last_generation_kw = generation_kw;
    state.energy.generated_total_kwh += generation_kw * dt;

    for module in state.modules.iter_mut() {
        module.temperature_c = if module.current_task.is_some() {
            config.ambient_temperature_c + ACTIVE_MODULE_TEMP_RISE_C
        } else {
            config.ambient_temperature_c
        };
    }

    // 2. Transport.
    state.transport.tick(config, state.meta.tick, dt);

    // 3. Active-task completion (strictly before new admissions).
    scheduler::advance_active(state, content, rng)?;

    // 4. Maintenance resolution.
    resolve_maintenance(state, content);

    // 5. Cleanrooms: weekly cleaning, idle drift.
    tick_cleanrooms(state, content, dt);

    // 6. New-task admission.
    scheduler::admit_tasks(state, content, rng)?;

    // 7. Deadlock census. Sampled before retry so the requeue churn of
    // tasks that immediately re-block cannot mask a stall.
    if state.is_deadlocked() {
        state.deadlock_streak_ticks += 1;
    } else {
        state.deadlock_streak_ticks = 0;
    }

    // 8. Blocked retry. Requeued tasks face the gates at the next admission.
    if state.meta.tick > 0 && state.meta.tick % BLOCKED_RETRY_INTERVAL_TICKS == 0 {
        scheduler::retry_blocked(state);
    }

    // 9. Metrics.
    let metric_interval_ticks = (METRIC_COLLECTION_INTERVAL_HOURS / dt).round().max(1.0) as u64;
    if state.meta.tick % metric_interval_ticks == 0 {
        metrics::sample(state, content);
    }

    // 10. Clock and aging.
    state.meta.tick += 1;
    state.energy.age(dt);
    Ok(())
}

fn resolve_maintenance(state: &mut FactoryState, content: &FactoryContent) {
    let config = &content.config;
    if !config.enable_maintenance {
        return;
    }
    let now = state.meta.tick;
    let dt = state.meta.dt_hours;
    let mut finished: Vec<String> = Vec::new();

    for module in state.modules.iter_mut() {
        if module.in_maintenance {
            if module.maintenance_end_tick.is_some_and(|end| now >= end) {
                module.finish_maintenance();
                finished.push(format!(
                    "module {} maintenance complete (efficiency {:.2})",
                    module.id, module.efficiency
                ));
            }
        } else if module.current_task.is_none()
            && !module.failed
            && module.needs_maintenance(content.catalog.module_kind(module.kind))
        {
            let ticks = (MAINTENANCE_DURATION_HOURS / dt).ceil() as u64;
            module.begin_maintenance(now + ticks);
        }
    }
    for message in finished {
        state.push_log(LogLevel::Info, message);
    }
}

fn tick_cleanrooms(state: &mut FactoryState, content: &FactoryContent, dt: f32) {
    if !content.config.enable_contamination {
        return;
    }
    let mut cleaned: Vec<String> = Vec::new();
    for module in state.modules.iter_mut() {
        let idle = module.current_task.is_none();
        if let Some(room) = &mut module.cleanroom {
            if idle {
                room.idle_drift(dt);
            }
            if room.time_since_cleaning_h >= CLEANROOM_CLEAN_INTERVAL_HOURS {
                room.clean();
                cleaned.push(format!("cleanroom on module {} cleaned", module.id));
            }
        }
    }
    for message in cleaned {
        state.push_log(LogLevel::Info, message);
    }
}

// ---------------------------------------------------------------------------
// Run driver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    GoalsAchieved,
    DeadlockDetected,
    TimeExhausted,
}

#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub max_hours: f32,
    pub max_wall_seconds: f32,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_hours: 10_000.0,
            max_wall_seconds: 3_600.0,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub run_log: RunLog,
}

/// Runs ticks until the goals complete, the scheduler deadlocks, simulated
/// time runs out, or the wall-clock budget is exhausted. A wall-clock timeout
/// is fatal and produces no report.
pub fn run_simulation(
    state: &mut FactoryState,
    content: &FactoryContent,
    rng: &mut impl Rng,
    limits: RunLimits,
) -> Result<RunReport, SimError> {
    let started = std::time::Instant::now();
    let max_ticks = (limits.max_hours / state.meta.dt_hours).ceil() as u64;

    let outcome = loop {
        if state.goals_achieved() {
            state.push_log(
                LogLevel::Info,
                "all replication goals achieved".to_string(),
            );
            break RunOutcome::GoalsAchieved;
        }
        if state.deadlock_confirmed() {
            let census = state
                .sched
                .blocked_counts()
                .iter()
                .map(|(reason, count)| format!("{reason}: {count}"))
                .collect::<Vec<_>>()
                .join(", ");
            state.push_log(LogLevel::Error, format!("deadlock detected ({census})"));
            break RunOutcome::DeadlockDetected;
        }
        if state.meta.tick >= max_ticks {
            state.push_log(LogLevel::Info, "simulated-time horizon reached".to_string());
            break RunOutcome::TimeExhausted;
        }
        let wall = started.elapsed().as_secs_f32();
        if wall > limits.max_wall_seconds {
            return Err(SimError::Timeout {
                sim_hours: state.meta.time_hours(),
                wall_seconds: wall,
            });
        }
        tick(state, content, rng)?;
    };

    Ok(RunReport {
        outcome,
        run_log: metrics::build_run_log(state, content),
    })
}
