//! `factory_core`: deterministic self-replicating-factory simulation.
//!
//! No IO, no network. All randomness flows through the Rng handed to
//! [`tick`], so a fixed seed plus identical content reproduces a run
//! exactly.

mod catalog;
mod cleanroom;
mod energy;
mod error;
mod factory;
mod metrics;
mod modules;
mod noise;
mod perf;
mod ring_log;
mod scheduler;
mod software;
mod storage;
mod tasks;
mod thermal;
mod transport;
mod types;
mod waste;

pub use catalog::{
    Catalog, FactoryContent, ModuleKindDef, RecipeDef, ResourceDef, SoftwareKindDef,
};
pub use cleanroom::{base_particle_count, CleanroomState};
pub use energy::EnergyState;
pub use error::{ConfigError, ExpansionError, SimError, StorageRejection};
pub use factory::{
    run_simulation, seed_goals, tick, FactoryState, RunLimits, RunOutcome, RunReport,
};
pub use metrics::{build_run_log, final_status, FinalStatus, MetricsSeries, RunLog};
pub use modules::{ModuleInstance, ModuleRegistry};
pub use ring_log::{LogEntry, LogLevel, RingLog};
pub use scheduler::{expand_production_task, SchedulerState};
pub use software::{SoftwareLibrary, SoftwarePackage};
pub use storage::Storage;
pub use tasks::{BlockReason, CompletedTaskRecord, TaskState, TaskStatus};
pub use thermal::ThermalLoad;
pub use transport::{Agv, AgvState, TransportJob, TransportMode, TransportSystem};
pub use types::*;
pub use waste::{default_recovery_fraction, WasteStream};

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

#[cfg(test)]
mod tests;
