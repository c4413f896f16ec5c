//! Thermal envelope: aggregate module heat, cooling demand, feasibility.
//!
//! Derived each tick from module power draw; nothing here persists.

use serde::Serialize;

use crate::types::SimConfig;

/// Fraction of module electrical power rejected as heat.
const HEAT_FRACTION: f32 = 0.8;

/// Building heat gain per square metre of floor area.
const AREA_HEAT_KW_PER_M2: f32 = 0.1;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ThermalLoad {
    pub module_heat_kw: f32,
    pub cooling_demand_kw: f32,
    pub cooling_power_kw: f32,
}

/// Heat rejected by a module drawing `power_kw`.
pub fn module_heat_kw(power_kw: f32) -> f32 {
    HEAT_FRACTION * power_kw
}

/// Coefficient of performance of the cooling plant at the given ambient.
fn cooling_cop(ambient_c: f32) -> f32 {
    (3.5 - 0.05 * (ambient_c - 22.0).abs()).max(1.5)
}

/// Electrical power required to reject `module_heat_kw` plus building gains.
pub fn cooling_demand_kw(module_heat_kw: f32, config: &SimConfig) -> f32 {
    let total_heat = module_heat_kw + AREA_HEAT_KW_PER_M2 * config.factory_area_m2;
    total_heat / cooling_cop(config.ambient_temperature_c)
}

/// Whether the cooling plant can carry the projected module heat.
pub fn is_feasible(projected_module_heat_kw: f32, config: &SimConfig) -> bool {
    if !config.enable_thermal_management {
        return true;
    }
    cooling_demand_kw(projected_module_heat_kw, config) <= config.cooling_capacity_kw
}

/// Full load summary for metrics and the energy balance.
pub fn load_summary(module_heat_kw: f32, config: &SimConfig) -> ThermalLoad {
    let cooling_demand = cooling_demand_kw(module_heat_kw, config);
    ThermalLoad {
        module_heat_kw,
        cooling_demand_kw: cooling_demand,
        cooling_power_kw: cooling_demand.min(config.cooling_capacity_kw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cop_clamps_at_floor() {
        assert!((cooling_cop(22.0) - 3.5).abs() < 1e-6);
        assert!((cooling_cop(80.0) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn feasibility_tracks_capacity() {
        let config = SimConfig {
            cooling_capacity_kw: 100.0,
            factory_area_m2: 100.0,
            ambient_temperature_c: 22.0,
            ..SimConfig::default()
        };
        // Demand = (heat + 10) / 3.5 <= 100 -> heat <= 340.
        assert!(is_feasible(300.0, &config));
        assert!(!is_feasible(400.0, &config));
    }

    #[test]
    fn disabled_thermal_management_always_feasible() {
        let config = SimConfig {
            cooling_capacity_kw: 0.0,
            enable_thermal_management: false,
            ..SimConfig::default()
        };
        assert!(is_feasible(1e9, &config));
    }
}
