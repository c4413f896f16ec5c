//! Intra-factory transport: conveyor plus an AGV fleet.
//!
//! Modules sit on a 50 m grid; the storage hub is the origin cell and
//! distances are Manhattan. Small jobs ride the conveyor while it has
//! headroom; everything else waits for an idle, charged AGV. All travel
//! times are in hours.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::Serialize;

use crate::types::{
    JobId, ModuleId, ResourceId, SimConfig, CONVEYOR_MAX_JOB_TONS, CONVEYOR_UTILIZATION_LIMIT,
    GRID_SPACING_M, MAX_CONCURRENT_TRANSPORTS, MAX_TRANSPORT_STARTS_PER_STEP,
    TRANSPORT_POWER_KW_PER_ACTIVE,
};

/// Modules per grid row.
const GRID_COLS: u32 = 10;

/// AGV charge drained per metre travelled (fraction of a full battery).
const AGV_CHARGE_PER_M: f32 = 0.00005;

/// AGVs below this state of charge cannot take a job.
const AGV_MIN_DISPATCH_CHARGE: f32 = 0.2;

/// Idle AGVs below this head for the charger.
const AGV_RECHARGE_THRESHOLD: f32 = 0.3;

/// Charging stops at this state of charge.
const AGV_CHARGE_TARGET: f32 = 0.95;

/// Charge gained per hour on the charger.
const AGV_CHARGE_RATE_PER_H: f32 = 0.10;

/// Cumulative transport hours before forced maintenance.
const AGV_MAINTENANCE_AFTER_H: f32 = 100.0;

/// Forced AGV maintenance duration.
const AGV_MAINTENANCE_HOURS: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransportMode {
    Conveyor,
    Agv { index: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct TransportJob {
    pub id: JobId,
    pub to_module: ModuleId,
    pub resource: ResourceId,
    pub quantity_t: f32,
    pub priority: i32,
    pub distance_m: f32,
    pub mode: Option<TransportMode>,
    pub start_tick: Option<u64>,
    pub completion_tick: Option<u64>,
    pub energy_consumed_kwh: f32,
    /// Conveyor utilization this job holds while in flight.
    conveyor_share: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AgvState {
    Idle,
    Transporting,
    Charging,
    Maintenance { until_tick: u64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct Agv {
    pub charge: f32,
    pub capacity_t: f32,
    pub hours_transporting: f32,
    pub state: AgvState,
}

#[derive(Debug, Clone)]
pub struct TransportSystem {
    jobs: Vec<TransportJob>,
    pending: BinaryHeap<Reverse<(i32, u64)>>,
    active: Vec<JobId>,
    agvs: Vec<Agv>,
    conveyor_utilization: f32,
    completed_total: u64,
    energy_total_kwh: f32,
}

impl TransportSystem {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            jobs: Vec::new(),
            pending: BinaryHeap::new(),
            active: Vec::new(),
            agvs: (0..config.agv_fleet_size)
                .map(|_| Agv {
                    charge: 1.0,
                    capacity_t: config.agv_capacity_tons,
                    hours_transporting: 0.0,
                    state: AgvState::Idle,
                })
                .collect(),
            conveyor_utilization: 0.0,
            completed_total: 0,
            energy_total_kwh: 0.0,
        }
    }

    /// Grid cell of a module; the storage hub occupies the origin.
    fn module_cell(module: ModuleId) -> (u32, u32) {
        let slot = module.0 + 1;
        (slot % GRID_COLS, slot / GRID_COLS)
    }

    /// Manhattan distance from the storage hub to a module.
    pub fn distance_from_hub_m(module: ModuleId) -> f32 {
        let (col, row) = Self::module_cell(module);
        (col + row) as f32 * GRID_SPACING_M
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn completed_total(&self) -> u64 {
        self.completed_total
    }

    pub fn conveyor_utilization(&self) -> f32 {
        self.conveyor_utilization
    }

    pub fn energy_total_kwh(&self) -> f32 {
        self.energy_total_kwh
    }

    /// Power drawn by in-flight jobs this tick.
    pub fn power_draw_kw(&self) -> f32 {
        TRANSPORT_POWER_KW_PER_ACTIVE * self.active.len() as f32
    }

    pub fn job(&self, id: JobId) -> &TransportJob {
        &self.jobs[id.0 as usize]
    }

    fn conveyor_eligible(&self, quantity_t: f32) -> bool {
        quantity_t < CONVEYOR_MAX_JOB_TONS
            && self.conveyor_utilization < CONVEYOR_UTILIZATION_LIMIT
    }

    /// Travel-time forecast used for task completion estimates, matching the
    /// routing the dispatcher would pick right now.
    pub fn estimate_travel_hours(
        &self,
        config: &SimConfig,
        quantity_t: f32,
        distance_m: f32,
    ) -> f32 {
        if self.conveyor_eligible(quantity_t) {
            distance_m / config.conveyor_speed_m_per_h
        } else {
            2.0 * config.agv_load_time_h + distance_m / config.agv_speed_m_per_h
        }
    }

    /// Queues a delivery from the storage hub to `to_module`. Returns the job
    /// id and the current travel-time estimate.
    pub fn schedule_delivery(
        &mut self,
        config: &SimConfig,
        to_module: ModuleId,
        resource: ResourceId,
        quantity_t: f32,
        priority: i32,
    ) -> (JobId, f32) {
        let distance_m = Self::distance_from_hub_m(to_module);
        let estimate_h = self.estimate_travel_hours(config, quantity_t, distance_m);
        let id = JobId(self.jobs.len() as u64);
        self.jobs.push(TransportJob {
            id,
            to_module,
            resource,
            quantity_t,
            priority,
            distance_m,
            mode: None,
            start_tick: None,
            completion_tick: None,
            energy_consumed_kwh: 0.0,
            conveyor_share: 0.0,
        });
        self.pending.push(Reverse((priority, id.0)));
        (id, estimate_h)
    }

    /// One transport tick: finish arrivals, dispatch from the queue, and run
    /// AGV charging/maintenance.
    pub fn tick(&mut self, config: &SimConfig, now_tick: u64, dt_hours: f32) {
        self.complete_arrivals(now_tick);
        self.dispatch(config, now_tick, dt_hours);
        self.agv_upkeep(now_tick, dt_hours);
    }

    fn complete_arrivals(&mut self, now_tick: u64) {
        let mut still_active = Vec::with_capacity(self.active.len());
        for &job_id in &self.active {
            let job = &self.jobs[job_id.0 as usize];
            if job.completion_tick.is_some_and(|t| t <= now_tick) {
                self.completed_total += 1;
                let share = job.conveyor_share;
                let mode = job.mode;
                if share > 0.0 {
                    self.conveyor_utilization = (self.conveyor_utilization - share).max(0.0);
                }
                if let Some(TransportMode::Agv { index }) = mode {
                    self.agvs[index].state = AgvState::Idle;
                }
            } else {
                still_active.push(job_id);
            }
        }
        self.active = still_active;
    }

    fn dispatch(&mut self, config: &SimConfig, now_tick: u64, dt_hours: f32) {
        let mut deferred = Vec::new();
        let mut starts = 0;

        while starts < MAX_TRANSPORT_STARTS_PER_STEP
            && self.active.len() < MAX_CONCURRENT_TRANSPORTS
        {
            let Some(Reverse((priority, raw_id))) = self.pending.pop() else {
                break;
            };
            let job_id = JobId(raw_id);
            let (quantity_t, distance_m) = {
                let job = &self.jobs[raw_id as usize];
                (job.quantity_t, job.distance_m)
            };

            if self.conveyor_eligible(quantity_t) {
                let travel_h = distance_m / config.conveyor_speed_m_per_h;
                let share = quantity_t / config.conveyor_capacity_tons;
                self.conveyor_utilization += share;
                self.start_job(
                    job_id,
                    TransportMode::Conveyor,
                    share,
                    travel_h,
                    now_tick,
                    dt_hours,
                );
                starts += 1;
                continue;
            }

            let agv_index = self.agvs.iter().position(|agv| {
                agv.state == AgvState::Idle
                    && agv.charge > AGV_MIN_DISPATCH_CHARGE
                    && agv.capacity_t >= quantity_t
            });
            if let Some(index) = agv_index {
                let travel_h = 2.0 * config.agv_load_time_h + distance_m / config.agv_speed_m_per_h;
                let agv = &mut self.agvs[index];
                agv.state = AgvState::Transporting;
                agv.charge = (agv.charge - distance_m * AGV_CHARGE_PER_M).max(0.0);
                agv.hours_transporting += travel_h;
                self.start_job(
                    job_id,
                    TransportMode::Agv { index },
                    0.0,
                    travel_h,
                    now_tick,
                    dt_hours,
                );
                starts += 1;
            } else {
                // No transport available; the job keeps its queue slot.
                deferred.push(Reverse((priority, raw_id)));
            }
        }

        for entry in deferred {
            self.pending.push(entry);
        }
    }

    fn start_job(
        &mut self,
        job_id: JobId,
        mode: TransportMode,
        conveyor_share: f32,
        travel_h: f32,
        now_tick: u64,
        dt_hours: f32,
    ) {
        let ticks = (travel_h / dt_hours).ceil().max(1.0) as u64;
        let job = &mut self.jobs[job_id.0 as usize];
        job.mode = Some(mode);
        job.conveyor_share = conveyor_share;
        job.start_tick = Some(now_tick);
        job.completion_tick = Some(now_tick + ticks);
        job.energy_consumed_kwh = TRANSPORT_POWER_KW_PER_ACTIVE * travel_h;
        self.energy_total_kwh += job.energy_consumed_kwh;
        self.active.push(job_id);
    }

    fn agv_upkeep(&mut self, now_tick: u64, dt_hours: f32) {
        for agv in &mut self.agvs {
            match agv.state {
                AgvState::Idle => {
                    if agv.hours_transporting >= AGV_MAINTENANCE_AFTER_H {
                        let ticks = (AGV_MAINTENANCE_HOURS / dt_hours).ceil() as u64;
                        agv.state = AgvState::Maintenance {
                            until_tick: now_tick + ticks,
                        };
                    } else if agv.charge < AGV_RECHARGE_THRESHOLD {
                        agv.state = AgvState::Charging;
                    }
                }
                AgvState::Charging => {
                    agv.charge = (agv.charge + AGV_CHARGE_RATE_PER_H * dt_hours).min(1.0);
                    if agv.charge >= AGV_CHARGE_TARGET {
                        agv.state = AgvState::Idle;
                    }
                }
                AgvState::Maintenance { until_tick } => {
                    if now_tick >= until_tick {
                        agv.hours_transporting = 0.0;
                        agv.state = AgvState::Idle;
                    }
                }
                AgvState::Transporting => {}
            }
        }
    }
}
