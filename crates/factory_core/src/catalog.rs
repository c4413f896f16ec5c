//! Static catalog: resource kinds, recipes, module kinds.
//!
//! Everything here is immutable for the life of one run. Kinds are dense
//! handles; the catalog owns the side tables (names, densities, recipes by
//! output handle) so hot paths index vectors instead of hashing strings.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::types::{ModuleKindId, ResourceId, SimConfig};

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDef {
    pub name: String,
    pub density_t_per_m3: f32,
    pub storage_temp_c: f32,
    /// How strongly cleanroom particles degrade yield for this kind, in [0, 1].
    pub contamination_sensitivity: f32,
    pub recyclable: bool,
    pub hazardous: bool,
    /// Advisory metadata; core volume math uses `quantity / density`.
    pub volume_per_unit_m3: f32,
    /// Fraction of this kind recoverable from the waste stream.
    pub recovery_fraction: f32,
}

impl ResourceDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            density_t_per_m3: 1.0,
            storage_temp_c: 20.0,
            contamination_sensitivity: 0.0,
            recyclable: true,
            hazardous: false,
            volume_per_unit_m3: 1.0,
            recovery_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDef {
    pub output: ResourceId,
    /// Output quantity per execution, before yield.
    pub output_qty: f32,
    /// Input quantity per execution (not per output unit).
    pub inputs: SmallVec<[(ResourceId, f32); 4]>,
    pub energy_kwh: f32,
    pub time_hours: f32,
    pub required_module: ModuleKindId,
    /// Smaller is stricter. A module qualifies when its capability is <= this.
    pub tolerance_um: Option<f32>,
    /// Smaller is stricter (ISO-style class rating).
    pub cleanroom_class: Option<u32>,
    /// Software kind that must exist in the library before this recipe runs.
    pub software_required: Option<ResourceId>,
    /// Fixed per-execution waste emissions, in addition to yield loss.
    pub waste_products: SmallVec<[(ResourceId, f32); 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleKindDef {
    pub name: String,
    /// Units per hour under nominal conditions.
    pub max_throughput: f32,
    pub idle_power_kw: f32,
    pub active_power_kw: f32,
    pub mtbf_hours: f32,
    pub maintenance_interval_h: f32,
    /// Fraction of efficiency lost per 1000 operating hours.
    pub degradation_rate: f32,
    pub footprint_m2: f32,
    pub min_batch: f32,
    pub max_batch: f32,
    pub setup_time_h: f32,
    /// In (0, 1].
    pub base_quality: f32,
    pub tolerance_capability_um: Option<f32>,
    pub cleanroom_class_capability: Option<u32>,
}

impl ModuleKindDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_throughput: 10.0,
            idle_power_kw: 5.0,
            active_power_kw: 50.0,
            mtbf_hours: 5_000.0,
            maintenance_interval_h: 500.0,
            degradation_rate: 0.02,
            footprint_m2: 50.0,
            min_batch: 1.0,
            max_batch: 100.0,
            setup_time_h: 0.5,
            base_quality: 0.98,
            tolerance_capability_um: None,
            cleanroom_class_capability: None,
        }
    }
}

/// Metadata for resource kinds that are software packages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftwareKindDef {
    pub resource: ResourceId,
    pub base_bug_rate: f32,
    pub compatible_module_kinds: Vec<ModuleKindId>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    resources: Vec<ResourceDef>,
    /// Indexed by output handle.
    recipes: Vec<Option<RecipeDef>>,
    module_kinds: Vec<ModuleKindDef>,
    resource_names: AHashMap<String, ResourceId>,
    module_kind_names: AHashMap<String, ModuleKindId>,
    /// Resource kinds whose completion instantiates a module.
    module_products: AHashMap<ResourceId, ModuleKindId>,
    software_kinds: AHashMap<ResourceId, SoftwareKindDef>,
    /// Sink kind for non-recyclable yield loss (typically a plastic-waste kind).
    default_waste_kind: Option<ResourceId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource kind. Names must be unique; duplicates are an
    /// authoring error.
    pub fn add_resource(&mut self, def: ResourceDef) -> ResourceId {
        assert!(
            !self.resource_names.contains_key(&def.name),
            "duplicate resource `{}`",
            def.name
        );
        assert!(
            def.density_t_per_m3 > 0.0,
            "resource `{}` must have positive density",
            def.name
        );
        let id = ResourceId(u16::try_from(self.resources.len()).expect("resource table overflow"));
        self.resource_names.insert(def.name.clone(), id);
        self.resources.push(def);
        self.recipes.push(None);
        id
    }

    pub fn add_module_kind(&mut self, def: ModuleKindDef) -> ModuleKindId {
        assert!(
            !self.module_kind_names.contains_key(&def.name),
            "duplicate module kind `{}`",
            def.name
        );
        let id =
            ModuleKindId(u16::try_from(self.module_kinds.len()).expect("module table overflow"));
        self.module_kind_names.insert(def.name.clone(), id);
        self.module_kinds.push(def);
        id
    }

    /// Registers the recipe producing `recipe.output`. One recipe per output.
    pub fn set_recipe(&mut self, recipe: RecipeDef) {
        let slot = &mut self.recipes[recipe.output.index()];
        assert!(
            slot.is_none(),
            "output `{}` already has a recipe",
            self.resources[recipe.output.index()].name
        );
        *slot = Some(recipe);
    }

    /// Marks `resource` as producing a `kind` module instance on completion.
    pub fn link_module_product(&mut self, resource: ResourceId, kind: ModuleKindId) {
        self.module_products.insert(resource, kind);
    }

    pub fn register_software(&mut self, def: SoftwareKindDef) {
        self.software_kinds.insert(def.resource, def);
    }

    pub fn set_default_waste_kind(&mut self, kind: ResourceId) {
        self.default_waste_kind = Some(kind);
    }

    pub fn default_waste_kind(&self) -> Option<ResourceId> {
        self.default_waste_kind
    }

    // --- Lookups -----------------------------------------------------------

    pub fn resource(&self, id: ResourceId) -> &ResourceDef {
        &self.resources[id.index()]
    }

    pub fn resource_id(&self, name: &str) -> Option<ResourceId> {
        self.resource_names.get(name).copied()
    }

    pub fn resource_name(&self, id: ResourceId) -> &str {
        &self.resources[id.index()].name
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn resources(&self) -> impl Iterator<Item = (ResourceId, &ResourceDef)> {
        self.resources
            .iter()
            .enumerate()
            .map(|(i, def)| (ResourceId(i as u16), def))
    }

    pub fn recipe_for(&self, output: ResourceId) -> Option<&RecipeDef> {
        self.recipes[output.index()].as_ref()
    }

    pub fn recipes(&self) -> impl Iterator<Item = &RecipeDef> {
        self.recipes.iter().filter_map(Option::as_ref)
    }

    pub fn module_kind(&self, id: ModuleKindId) -> &ModuleKindDef {
        &self.module_kinds[id.index()]
    }

    pub fn module_kind_id(&self, name: &str) -> Option<ModuleKindId> {
        self.module_kind_names.get(name).copied()
    }

    pub fn module_kind_count(&self) -> usize {
        self.module_kinds.len()
    }

    pub fn module_kinds(&self) -> impl Iterator<Item = (ModuleKindId, &ModuleKindDef)> {
        self.module_kinds
            .iter()
            .enumerate()
            .map(|(i, def)| (ModuleKindId(i as u16), def))
    }

    /// The module kind instantiated when a task for `resource` completes.
    pub fn module_product(&self, resource: ResourceId) -> Option<ModuleKindId> {
        self.module_products.get(&resource).copied()
    }

    /// The resource kind whose recipe produces a `kind` module, if any.
    /// Lowest handle wins so the choice is deterministic.
    pub fn product_for_module_kind(&self, kind: ModuleKindId) -> Option<ResourceId> {
        self.module_products
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(r, _)| *r)
            .min()
    }

    pub fn software(&self, resource: ResourceId) -> Option<&SoftwareKindDef> {
        self.software_kinds.get(&resource)
    }

    pub fn is_software(&self, resource: ResourceId) -> bool {
        self.software_kinds.contains_key(&resource)
    }
}

// ---------------------------------------------------------------------------
// Content bundle
// ---------------------------------------------------------------------------

/// Everything immutable for one run: catalog, resolved config, and the module
/// kinds the factory is trying to replicate.
#[derive(Debug, Clone)]
pub struct FactoryContent {
    pub catalog: Catalog,
    pub config: SimConfig,
    pub target_modules: Vec<ModuleKindId>,
}
