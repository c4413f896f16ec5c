//! Shared identifiers, the resolved runtime configuration, and simulation
//! constants.
//!
//! Resource and module kinds are dense integer handles into the catalog
//! vectors; names live in the catalog only. Tasks and transport jobs use
//! insertion-ordered ids so heap tie-breaking is deterministic.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Handle newtypes
// ---------------------------------------------------------------------------

macro_rules! handle_id {
    ($name:ident, $inner:ty) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub $inner);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

handle_id!(ResourceId, u16);
handle_id!(ModuleKindId, u16);
handle_id!(ModuleId, u32);
handle_id!(TaskId, u64);
handle_id!(JobId, u64);

impl ResourceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ModuleKindId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

/// Upper bound on new-task admissions per tick.
pub const MAX_TASK_STARTS_PER_STEP: usize = 5;

/// Power draw contributed by each in-flight transport job.
pub const TRANSPORT_POWER_KW_PER_ACTIVE: f32 = 2.0;

/// Simulated-hours interval between metric samples.
pub const METRIC_COLLECTION_INTERVAL_HOURS: f32 = 1.0;

/// Ticks between blocked-task re-evaluation passes.
pub const BLOCKED_RETRY_INTERVAL_TICKS: u64 = 10;

/// Simulated hours between scheduled cleanroom cleanings.
pub const CLEANROOM_CLEAN_INTERVAL_HOURS: f32 = 168.0;

/// Fixed duration of a module maintenance visit.
pub const MAINTENANCE_DURATION_HOURS: f32 = 8.0;

/// Module efficiency never degrades below this.
pub const EFFICIENCY_FLOOR: f32 = 0.3;

/// Quality rate is clamped into `[QUALITY_FLOOR, 1.0]`.
pub const QUALITY_FLOOR: f32 = 0.5;

/// Input deficits are over-ordered by this factor during expansion.
pub const EXPANSION_DEFICIT_BUFFER: f32 = 1.1;

/// Grid spacing between adjacent module cells.
pub const GRID_SPACING_M: f32 = 50.0;

/// Hard cap on in-flight transport jobs.
pub const MAX_CONCURRENT_TRANSPORTS: usize = 20;

/// Transport dispatches per tick.
pub const MAX_TRANSPORT_STARTS_PER_STEP: usize = 5;

/// Conveyor routing is preferred below this quantity.
pub const CONVEYOR_MAX_JOB_TONS: f32 = 100.0;

/// Conveyor routing is refused at or above this utilization.
pub const CONVEYOR_UTILIZATION_LIMIT: f32 = 0.8;

/// Battery state of charge bounds, as fractions of capacity.
pub const BATTERY_MIN_SOC: f32 = 0.2;
pub const BATTERY_MAX_SOC: f32 = 0.95;

/// Battery charge/discharge rate cap, as a fraction of capacity per hour.
pub const BATTERY_RATE_C: f32 = 0.5;

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Flat resolved configuration for one run.
///
/// Built from spec `constraints` (plus an optional profile overlay) or from
/// defaults. Immutable once the factory is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed step size of the simulation loop.
    pub dt_hours: f32,

    // Energy
    pub initial_solar_capacity_kw: f32,
    pub solar_panel_efficiency: f32,
    pub battery_capacity_kwh: f32,
    pub battery_efficiency: f32,
    #[serde(rename = "latitude")]
    pub latitude_deg: f32,
    pub average_cloud_cover: f32,
    #[serde(rename = "ambient_temperature")]
    pub ambient_temperature_c: f32,

    // Thermal
    pub factory_area_m2: f32,
    pub cooling_capacity_kw: f32,

    // Storage
    pub max_storage_volume_m3: f32,
    pub max_storage_weight_tons: f32,
    pub temperature_controlled_storage: bool,

    // Transport. All speeds are per-hour; travel times come out in hours.
    pub agv_fleet_size: usize,
    pub agv_capacity_tons: f32,
    pub agv_speed_m_per_h: f32,
    pub agv_load_time_h: f32,
    pub conveyor_speed_m_per_h: f32,
    pub conveyor_capacity_tons: f32,

    // Quality / cleanroom
    pub cleanroom_class: u32,

    // Scheduling
    pub parallel_processing_limit: usize,

    // Subsystem toggles
    pub enable_capacity_limits: bool,
    pub enable_degradation: bool,
    pub enable_quality_control: bool,
    pub enable_weather: bool,
    pub enable_maintenance: bool,
    pub enable_storage_limits: bool,
    pub enable_batch_processing: bool,
    pub enable_transport_time: bool,
    pub enable_contamination: bool,
    pub enable_thermal_management: bool,
    pub enable_software_production: bool,
    pub enable_waste_recycling: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt_hours: 0.1,
            initial_solar_capacity_kw: 100.0,
            solar_panel_efficiency: 0.22,
            battery_capacity_kwh: 500.0,
            battery_efficiency: 0.95,
            latitude_deg: 35.0,
            average_cloud_cover: 0.3,
            ambient_temperature_c: 25.0,
            factory_area_m2: 20_000.0,
            cooling_capacity_kw: 10_000.0,
            max_storage_volume_m3: 15_000.0,
            max_storage_weight_tons: 10_000.0,
            temperature_controlled_storage: false,
            agv_fleet_size: 10,
            agv_capacity_tons: 250.0,
            agv_speed_m_per_h: 7_200.0,
            agv_load_time_h: 0.05,
            conveyor_speed_m_per_h: 1_800.0,
            conveyor_capacity_tons: 500.0,
            cleanroom_class: 1_000,
            parallel_processing_limit: 10,
            enable_capacity_limits: true,
            enable_degradation: true,
            enable_quality_control: true,
            enable_weather: true,
            enable_maintenance: true,
            enable_storage_limits: true,
            enable_batch_processing: true,
            enable_transport_time: true,
            enable_contamination: true,
            enable_thermal_management: true,
            enable_software_production: true,
            enable_waste_recycling: true,
        }
    }
}

impl SimConfig {
    /// Range-checks the configuration. Fatal before any simulation starts.
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError;

        fn positive(key: &'static str, value: f32) -> Result<(), ConfigError> {
            if value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange {
                    key,
                    value: f64::from(value),
                    reason: "must be positive",
                })
            }
        }

        positive("dt_hours", self.dt_hours)?;
        positive("initial_solar_capacity_kw", self.initial_solar_capacity_kw)?;
        positive("battery_capacity_kwh", self.battery_capacity_kwh)?;
        positive("max_storage_volume_m3", self.max_storage_volume_m3)?;
        positive("max_storage_weight_tons", self.max_storage_weight_tons)?;
        positive("agv_speed_m_per_h", self.agv_speed_m_per_h)?;
        positive("conveyor_speed_m_per_h", self.conveyor_speed_m_per_h)?;
        positive("conveyor_capacity_tons", self.conveyor_capacity_tons)?;
        positive("factory_area_m2", self.factory_area_m2)?;

        if !(0.0..=1.0).contains(&self.battery_efficiency) || self.battery_efficiency == 0.0 {
            return Err(ConfigError::OutOfRange {
                key: "battery_efficiency",
                value: f64::from(self.battery_efficiency),
                reason: "must be in (0, 1]",
            });
        }
        if !(0.0..=1.0).contains(&self.average_cloud_cover) {
            return Err(ConfigError::OutOfRange {
                key: "average_cloud_cover",
                value: f64::from(self.average_cloud_cover),
                reason: "must be in [0, 1]",
            });
        }
        if !(-90.0..=90.0).contains(&self.latitude_deg) {
            return Err(ConfigError::OutOfRange {
                key: "latitude",
                value: f64::from(self.latitude_deg),
                reason: "must be in [-90, 90]",
            });
        }
        if self.parallel_processing_limit == 0 {
            return Err(ConfigError::OutOfRange {
                key: "parallel_processing_limit",
                value: 0.0,
                reason: "must be at least 1",
            });
        }
        if self.cleanroom_class == 0 {
            return Err(ConfigError::OutOfRange {
                key: "cleanroom_class",
                value: 0.0,
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Clock helpers
// ---------------------------------------------------------------------------

/// Simulation clock. The tick counter is authoritative; hours are derived so
/// repeated float addition cannot drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub tick: u64,
    pub seed: u64,
    pub dt_hours: f32,
}

impl MetaState {
    pub fn new(seed: u64, dt_hours: f32) -> Self {
        Self {
            tick: 0,
            seed,
            dt_hours,
        }
    }

    pub fn time_hours(&self) -> f32 {
        self.tick as f32 * self.dt_hours
    }

    /// Hour of day in `[0, 24)`.
    pub fn hour_of_day(&self) -> f32 {
        self.time_hours() % 24.0
    }

    /// Day of year in `[1, 365]`, wrapping across simulated years.
    pub fn day_of_year(&self) -> u32 {
        ((self.time_hours() / 24.0) as u32) % 365 + 1
    }
}
