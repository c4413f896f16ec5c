//! Typed spec-file schema.
//!
//! Specs are parsed into `serde_json::Value` first (JSON or YAML), merged
//! through the inheritance chain, then deserialized into these structs.
//! `BTreeMap` everywhere so handle assignment is independent of file order.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Path to a parent spec, resolved relative to this spec's file.
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResourceEntry {
    pub density: f32,
    pub storage_temp: f32,
    pub contamination_sensitivity: f32,
    pub recyclable: bool,
    pub hazardous: bool,
    pub volume_per_unit: f32,
    /// Recovery fraction from the waste stream; defaults by material name.
    pub recovery_fraction: Option<f32>,
}

impl Default for ResourceEntry {
    fn default() -> Self {
        Self {
            density: 1.0,
            storage_temp: 20.0,
            contamination_sensitivity: 0.0,
            recyclable: true,
            hazardous: false,
            volume_per_unit: 1.0,
            recovery_fraction: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeEntry {
    pub output: String,
    #[serde(default = "one")]
    pub output_quantity: f32,
    #[serde(default)]
    pub inputs: BTreeMap<String, f32>,
    #[serde(default)]
    pub energy_kwh: f32,
    #[serde(default = "one")]
    pub time_hours: f32,
    /// Module kind that runs this recipe. Defaults to `assembly`.
    #[serde(default)]
    pub required_module: Option<String>,
    #[serde(default)]
    pub tolerance_um: Option<f32>,
    #[serde(default)]
    pub cleanroom_class: Option<u32>,
    #[serde(default)]
    pub software_required: Option<String>,
    #[serde(default)]
    pub waste_products: BTreeMap<String, f32>,
}

fn one() -> f32 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModuleEntry {
    pub max_throughput: f32,
    pub power_consumption_idle: f32,
    pub power_consumption_active: f32,
    pub mtbf_hours: f32,
    pub maintenance_interval: f32,
    pub degradation_rate: f32,
    pub footprint_m2: f32,
    pub min_batch: f32,
    pub max_batch: f32,
    pub setup_time: f32,
    pub base_quality: f32,
    pub tolerance_capability_um: Option<f32>,
    pub cleanroom_class_capability: Option<u32>,
}

impl Default for ModuleEntry {
    fn default() -> Self {
        Self {
            max_throughput: 10.0,
            power_consumption_idle: 5.0,
            power_consumption_active: 50.0,
            mtbf_hours: 5_000.0,
            maintenance_interval: 500.0,
            degradation_rate: 0.02,
            footprint_m2: 50.0,
            min_batch: 1.0,
            max_batch: 100.0,
            setup_time: 0.5,
            base_quality: 0.98,
            tolerance_capability_um: None,
            cleanroom_class_capability: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SoftwareEntry {
    pub base_bug_rate: Option<f32>,
    pub compatible_modules: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InitialState {
    /// Module kind name -> instance count at t = 0.
    pub modules: BTreeMap<String, u32>,
    /// Resource name -> stockpiled tons at t = 0.
    pub resources: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpecFile {
    pub metadata: Metadata,
    pub resources: BTreeMap<String, ResourceEntry>,
    pub recipes: Vec<RecipeEntry>,
    pub modules: BTreeMap<String, ModuleEntry>,
    pub software: BTreeMap<String, SoftwareEntry>,
    pub initial_state: InitialState,
    /// Flat runtime config overrides (the `SimConfig` keys).
    pub constraints: serde_json::Map<String, serde_json::Value>,
    /// Named partial-config overlays selectable with `--profile`.
    pub profiles: BTreeMap<String, serde_json::Map<String, serde_json::Value>>,
    /// Module kinds to replicate; defaults to one of each kind.
    pub target_modules: Option<Vec<String>>,
}
