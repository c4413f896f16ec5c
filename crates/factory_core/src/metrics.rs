//! Time-series metrics and the run log.
//!
//! `sample` appends one reading of the current state to the parallel vectors
//! once per simulated hour. No IO; serialization is the caller's problem.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::FactoryContent;
use crate::factory::FactoryState;
use crate::ring_log::LogEntry;
use crate::tasks::CompletedTaskRecord;
use crate::types::SimConfig;

/// Completed-task records embedded in the run log.
const RUN_LOG_COMPLETED_TASKS: usize = 100;

/// Log entries embedded in the run log.
const RUN_LOG_ENTRIES: usize = 1_000;

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSeries {
    pub time: Vec<f32>,
    pub energy_generated: Vec<f32>,
    pub battery_charge: Vec<f32>,
    pub storage_utilization: Vec<f32>,
    pub waste_generated: Vec<f32>,
    pub transport_jobs: Vec<u64>,
    pub software_bugs: Vec<f32>,
    pub thermal_load: Vec<f32>,
    pub contamination: Vec<f32>,
    pub module_efficiency: Vec<f32>,
    pub tasks_completed: Vec<usize>,
    pub active_tasks: Vec<usize>,
    pub blocked_tasks: Vec<usize>,
    pub modules: Vec<usize>,
}

impl MetricsSeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Appends one sample of the current state to the series.
pub fn sample(state: &mut FactoryState, content: &FactoryContent) {
    let mean_contamination = {
        let rooms: Vec<f32> = state
            .modules
            .iter()
            .filter_map(|m| m.cleanroom.as_ref())
            .map(|room| room.particle_count)
            .collect();
        if rooms.is_empty() {
            0.0
        } else {
            rooms.iter().sum::<f32>() / rooms.len() as f32
        }
    };

    let series = &mut state.metrics;
    series.time.push(state.meta.time_hours());
    series.energy_generated.push(state.energy.generated_total_kwh);
    series.battery_charge.push(state.energy.battery_charge_kwh);
    series
        .storage_utilization
        .push(state.storage.utilization(&content.catalog));
    series.waste_generated.push(state.waste.generated_total_t());
    series.transport_jobs.push(state.transport.completed_total());
    series.software_bugs.push(state.software.open_bug_rate());
    series.thermal_load.push(state.thermal.module_heat_kw);
    series.contamination.push(mean_contamination);
    series.module_efficiency.push(state.modules.mean_efficiency());
    series.tasks_completed.push(state.sched.completed_ids.len());
    series.active_tasks.push(state.sched.active.len());
    series.blocked_tasks.push(state.sched.blocked.len());
    series.modules.push(state.modules.len());
}

// ---------------------------------------------------------------------------
// Final report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct FinalStatus {
    pub time: f32,
    pub completed_tasks: usize,
    pub active_tasks: usize,
    pub blocked_tasks: usize,
    /// Instance counts per module kind name. BTreeMap keeps key order stable
    /// across runs so serialized reports are byte-comparable.
    pub modules: BTreeMap<String, usize>,
    pub waste_total: f32,
    pub transport_completed: u64,
    pub software_packages: usize,
}

pub fn final_status(state: &FactoryState, content: &FactoryContent) -> FinalStatus {
    let mut modules: BTreeMap<String, usize> = BTreeMap::new();
    for module in state.modules.iter() {
        let name = content.catalog.module_kind(module.kind).name.clone();
        *modules.entry(name).or_insert(0) += 1;
    }
    FinalStatus {
        time: state.meta.time_hours(),
        completed_tasks: state.sched.completed_ids.len(),
        active_tasks: state.sched.active.len(),
        blocked_tasks: state.sched.blocked.len(),
        modules,
        waste_total: state.waste.generated_total_t(),
        transport_completed: state.transport.completed_total(),
        software_packages: state.software.package_count(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunLog {
    pub config: SimConfig,
    pub final_status: FinalStatus,
    pub metrics: MetricsSeries,
    pub completed_tasks: Vec<CompletedTaskRecord>,
    pub log_entries: Vec<LogEntry>,
}

pub fn build_run_log(state: &FactoryState, content: &FactoryContent) -> RunLog {
    let completed = &state.sched.completed_log;
    let skip = completed.len().saturating_sub(RUN_LOG_COMPLETED_TASKS);
    RunLog {
        config: content.config.clone(),
        final_status: final_status(state, content),
        metrics: state.metrics.clone(),
        completed_tasks: completed[skip..].to_vec(),
        log_entries: state.log.tail(RUN_LOG_ENTRIES),
    }
}
