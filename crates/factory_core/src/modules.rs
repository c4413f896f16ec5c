//! Production module instances: wear, stochastic failure, maintenance.
//!
//! Kinds are static (`ModuleKindDef` in the catalog); everything here is the
//! mutable per-instance operational state. Failures are sticky; there is no
//! repair pathway at this layer.

use rand::Rng;

use crate::catalog::ModuleKindDef;
use crate::cleanroom::CleanroomState;
use crate::types::{ModuleId, ModuleKindId, ResourceId, TaskId, EFFICIENCY_FLOOR};

#[derive(Debug, Clone)]
pub struct ModuleInstance {
    pub id: ModuleId,
    pub kind: ModuleKindId,
    pub operating_hours: f32,
    pub cycles_completed: u64,
    pub time_since_maintenance_h: f32,
    /// In `[EFFICIENCY_FLOOR, 1.0]`.
    pub efficiency: f32,
    pub failed: bool,
    pub in_maintenance: bool,
    pub maintenance_end_tick: Option<u64>,
    pub current_task: Option<TaskId>,
    /// For changeover detection: setup time applies when the product changes.
    pub last_product: Option<ResourceId>,
    pub temperature_c: f32,
    pub software_version: Option<u32>,
    pub cleanroom: Option<CleanroomState>,
}

impl ModuleInstance {
    /// Eligible to take a task right now.
    pub fn is_available(&self) -> bool {
        !self.failed && !self.in_maintenance && self.current_task.is_none()
    }

    /// Throughput derate from operating temperature. Zero or negative means
    /// the module cannot run at all at this temperature.
    pub fn temperature_derate(&self) -> f32 {
        1.0 - 0.01 * ((self.temperature_c - 22.0).abs() - 5.0).max(0.0)
    }

    /// Units per hour this instance can actually sustain.
    pub fn effective_throughput(&self, def: &ModuleKindDef) -> f32 {
        def.max_throughput * self.efficiency * self.temperature_derate()
    }

    /// Electrical draw right now. Failed modules are dark; a module in
    /// maintenance idles.
    pub fn power_draw_kw(&self, def: &ModuleKindDef) -> f32 {
        if self.failed {
            0.0
        } else if self.current_task.is_some() {
            def.active_power_kw
        } else {
            def.idle_power_kw
        }
    }

    /// Books `hours` of operation onto the instance after a task: wear,
    /// degradation, and a Bernoulli failure roll with `p = hours / mtbf`.
    /// Returns true if the module just failed.
    pub fn record_operation(
        &mut self,
        hours: f32,
        def: &ModuleKindDef,
        degradation_enabled: bool,
        rng: &mut impl Rng,
    ) -> bool {
        self.operating_hours += hours;
        self.cycles_completed += 1;
        self.time_since_maintenance_h += hours;

        if degradation_enabled {
            self.efficiency =
                (self.efficiency * (1.0 - def.degradation_rate * hours / 1000.0))
                    .max(EFFICIENCY_FLOOR);
        }

        let failure_p = (hours / def.mtbf_hours).clamp(0.0, 1.0);
        if rng.gen::<f32>() < failure_p {
            self.failed = true;
        }
        self.failed
    }

    pub fn needs_maintenance(&self, def: &ModuleKindDef) -> bool {
        self.time_since_maintenance_h >= def.maintenance_interval_h
    }

    pub fn begin_maintenance(&mut self, end_tick: u64) {
        self.in_maintenance = true;
        self.maintenance_end_tick = Some(end_tick);
    }

    /// Maintenance restores up to 10% efficiency, capped at 1.0.
    pub fn finish_maintenance(&mut self) {
        self.in_maintenance = false;
        self.maintenance_end_tick = None;
        self.time_since_maintenance_h = 0.0;
        self.efficiency = (self.efficiency * 1.10).min(1.0);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    instances: Vec<ModuleInstance>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates a module of `kind`, creating cleanroom state when the
    /// kind has a cleanroom capability.
    pub fn add(
        &mut self,
        kind: ModuleKindId,
        def: &ModuleKindDef,
        ambient_temperature_c: f32,
    ) -> ModuleId {
        let id = ModuleId(u32::try_from(self.instances.len()).expect("module table overflow"));
        self.instances.push(ModuleInstance {
            id,
            kind,
            operating_hours: 0.0,
            cycles_completed: 0,
            time_since_maintenance_h: 0.0,
            efficiency: 1.0,
            failed: false,
            in_maintenance: false,
            maintenance_end_tick: None,
            current_task: None,
            last_product: None,
            temperature_c: ambient_temperature_c,
            software_version: None,
            cleanroom: def.cleanroom_class_capability.map(CleanroomState::new),
        });
        id
    }

    pub fn get(&self, id: ModuleId) -> &ModuleInstance {
        &self.instances[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut ModuleInstance {
        &mut self.instances[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleInstance> {
        self.instances.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ModuleInstance> {
        self.instances.iter_mut()
    }

    pub fn count_of_kind(&self, kind: ModuleKindId) -> usize {
        self.instances.iter().filter(|m| m.kind == kind).count()
    }

    /// Mean efficiency across non-failed modules; 1.0 with no modules.
    pub fn mean_efficiency(&self) -> f32 {
        let live: Vec<f32> = self
            .instances
            .iter()
            .filter(|m| !m.failed)
            .map(|m| m.efficiency)
            .collect();
        if live.is_empty() {
            1.0
        } else {
            live.iter().sum::<f32>() / live.len() as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModuleKindDef;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn kind_def() -> ModuleKindDef {
        ModuleKindDef {
            mtbf_hours: 1e9,
            degradation_rate: 0.02,
            ..ModuleKindDef::new("smelter")
        }
    }

    fn instance() -> ModuleInstance {
        let mut registry = ModuleRegistry::new();
        let id = registry.add(ModuleKindId(0), &kind_def(), 22.0);
        registry.get(id).clone()
    }

    #[test]
    fn efficiency_floors_at_point_three() {
        let def = kind_def();
        let mut module = instance();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..10_000 {
            module.record_operation(100.0, &def, true, &mut rng);
        }
        assert!((module.efficiency - EFFICIENCY_FLOOR).abs() < 1e-6);
    }

    #[test]
    fn temperature_derate_has_a_comfort_band() {
        let mut module = instance();
        module.temperature_c = 25.0;
        assert!((module.temperature_derate() - 1.0).abs() < 1e-6);
        module.temperature_c = 42.0;
        assert!((module.temperature_derate() - 0.85).abs() < 1e-6);
    }

    #[test]
    fn guaranteed_failure_at_mtbf() {
        let def = ModuleKindDef {
            mtbf_hours: 10.0,
            ..kind_def()
        };
        let mut module = instance();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let failed = module.record_operation(10.0, &def, true, &mut rng);
        assert!(failed);
        assert!(!module.is_available());
    }

    #[test]
    fn maintenance_restores_bounded_efficiency() {
        let mut module = instance();
        module.efficiency = 0.8;
        module.time_since_maintenance_h = 600.0;
        module.begin_maintenance(80);
        assert!(!module.is_available());
        module.finish_maintenance();
        assert!((module.efficiency - 0.88).abs() < 1e-6);
        assert_eq!(module.time_since_maintenance_h, 0.0);

        module.efficiency = 0.99;
        module.finish_maintenance();
        assert_eq!(module.efficiency, 1.0);
    }
}
