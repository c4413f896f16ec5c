//! Shared fixtures for engine tests: a compact but complete catalog (ore
//! through module product, with a cleanroom-gated kind and one software
//! kind), plus a deterministic Rng.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use smallvec::{smallvec, SmallVec};

use crate::catalog::{
    Catalog, FactoryContent, ModuleKindDef, RecipeDef, ResourceDef, SoftwareKindDef,
};
use crate::factory::FactoryState;
use crate::types::{ModuleKindId, ResourceId, SimConfig};

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

/// Handles into the fixture catalog.
#[derive(Debug, Clone, Copy)]
pub struct FixtureIds {
    pub iron_ore: ResourceId,
    pub steel: ResourceId,
    pub steel_beam: ResourceId,
    pub silicon_wafer: ResourceId,
    pub plastic_waste: ResourceId,
    pub plc_program: ResourceId,
    pub module_smelter: ResourceId,
    pub smelter: ModuleKindId,
    pub cnc: ModuleKindId,
    pub assembly: ModuleKindId,
    pub fab: ModuleKindId,
    pub software_lab: ModuleKindId,
}

/// Deterministic baseline config: weather and quality jitter off so tests
/// can assert exact quantities. Individual tests re-enable what they probe.
pub fn base_config() -> SimConfig {
    SimConfig {
        enable_weather: false,
        enable_quality_control: false,
        enable_degradation: false,
        enable_maintenance: false,
        enable_transport_time: false,
        average_cloud_cover: 0.0,
        ..SimConfig::default()
    }
}

#[allow(clippy::too_many_lines)]
pub fn base_content() -> (FactoryContent, FixtureIds) {
    let mut catalog = Catalog::new();

    let iron_ore = catalog.add_resource(ResourceDef {
        density_t_per_m3: 4.0,
        recyclable: false,
        ..ResourceDef::new("IRON_ORE")
    });
    let steel = catalog.add_resource(ResourceDef {
        density_t_per_m3: 7.8,
        recovery_fraction: 0.95,
        ..ResourceDef::new("STEEL")
    });
    let steel_beam = catalog.add_resource(ResourceDef {
        density_t_per_m3: 7.8,
        recovery_fraction: 0.95,
        ..ResourceDef::new("STEEL_BEAM")
    });
    let silicon_wafer = catalog.add_resource(ResourceDef {
        density_t_per_m3: 2.3,
        contamination_sensitivity: 1.0,
        recovery_fraction: 0.70,
        ..ResourceDef::new("SILICON_WAFER")
    });
    let plastic_waste = catalog.add_resource(ResourceDef {
        density_t_per_m3: 0.9,
        recovery_fraction: 0.60,
        ..ResourceDef::new("PLASTIC_WASTE")
    });
    let plc_program = catalog.add_resource(ResourceDef {
        recyclable: false,
        ..ResourceDef::new("PLC_PROGRAM")
    });
    let module_smelter = catalog.add_resource(ResourceDef {
        density_t_per_m3: 5.0,
        recyclable: false,
        ..ResourceDef::new("MODULE_SMELTER")
    });
    catalog.set_default_waste_kind(plastic_waste);

    let smelter = catalog.add_module_kind(ModuleKindDef {
        max_throughput: 25.0,
        idle_power_kw: 5.0,
        active_power_kw: 100.0,
        setup_time_h: 0.5,
        min_batch: 1.0,
        max_batch: 100.0,
        base_quality: 1.0,
        ..ModuleKindDef::new("smelter")
    });
    let cnc = catalog.add_module_kind(ModuleKindDef {
        max_throughput: 10.0,
        idle_power_kw: 3.0,
        active_power_kw: 40.0,
        setup_time_h: 0.25,
        tolerance_capability_um: Some(0.1),
        base_quality: 0.99,
        ..ModuleKindDef::new("cnc")
    });
    let assembly = catalog.add_module_kind(ModuleKindDef {
        max_throughput: 1.0,
        idle_power_kw: 2.0,
        active_power_kw: 20.0,
        setup_time_h: 0.5,
        min_batch: 1.0,
        max_batch: 1.0,
        base_quality: 1.0,
        ..ModuleKindDef::new("assembly")
    });
    let fab = catalog.add_module_kind(ModuleKindDef {
        max_throughput: 2.0,
        idle_power_kw: 8.0,
        active_power_kw: 60.0,
        setup_time_h: 1.0,
        tolerance_capability_um: Some(0.05),
        cleanroom_class_capability: Some(100),
        base_quality: 0.95,
        ..ModuleKindDef::new("fab")
    });
    let software_lab = catalog.add_module_kind(ModuleKindDef {
        max_throughput: 0.1,
        idle_power_kw: 1.0,
        active_power_kw: 5.0,
        setup_time_h: 0.0,
        min_batch: 1.0,
        max_batch: 1.0,
        base_quality: 1.0,
        ..ModuleKindDef::new("software_lab")
    });

    catalog.set_recipe(RecipeDef {
        output: steel,
        output_qty: 10.0,
        inputs: smallvec![(iron_ore, 15.0)],
        energy_kwh: 100.0,
        time_hours: 2.0,
        required_module: smelter,
        tolerance_um: None,
        cleanroom_class: None,
        software_required: None,
        waste_products: SmallVec::new(),
    });
    catalog.set_recipe(RecipeDef {
        output: steel_beam,
        output_qty: 1.0,
        inputs: smallvec![(steel, 10.0)],
        energy_kwh: 50.0,
        time_hours: 1.0,
        required_module: cnc,
        tolerance_um: Some(0.5),
        cleanroom_class: None,
        software_required: None,
        waste_products: SmallVec::new(),
    });
    catalog.set_recipe(RecipeDef {
        output: silicon_wafer,
        output_qty: 1.0,
        inputs: smallvec![(steel, 1.0)],
        energy_kwh: 50.0,
        time_hours: 5.0,
        required_module: fab,
        tolerance_um: Some(0.1),
        cleanroom_class: Some(100),
        software_required: None,
        waste_products: SmallVec::new(),
    });
    catalog.set_recipe(RecipeDef {
        output: plc_program,
        output_qty: 1.0,
        inputs: SmallVec::new(),
        energy_kwh: 0.0,
        time_hours: 10.0,
        required_module: software_lab,
        tolerance_um: None,
        cleanroom_class: None,
        software_required: None,
        waste_products: SmallVec::new(),
    });
    catalog.set_recipe(RecipeDef {
        output: module_smelter,
        output_qty: 1.0,
        inputs: smallvec![(steel, 20.0)],
        energy_kwh: 200.0,
        time_hours: 5.0,
        required_module: assembly,
        tolerance_um: None,
        cleanroom_class: None,
        software_required: None,
        waste_products: SmallVec::new(),
    });

    catalog.link_module_product(module_smelter, smelter);
    catalog.register_software(SoftwareKindDef {
        resource: plc_program,
        base_bug_rate: 0.05,
        compatible_module_kinds: vec![smelter, cnc, assembly],
    });

    let ids = FixtureIds {
        iron_ore,
        steel,
        steel_beam,
        silicon_wafer,
        plastic_waste,
        plc_program,
        module_smelter,
        smelter,
        cnc,
        assembly,
        fab,
        software_lab,
    };
    let content = FactoryContent {
        catalog,
        config: base_config(),
        target_modules: vec![smelter],
    };
    (content, ids)
}

/// One module of each kind plus a healthy ore stockpile.
pub fn base_state(content: &FactoryContent, ids: &FixtureIds) -> FactoryState {
    let mut state = FactoryState::new(content, 42);
    for kind in [
        ids.smelter,
        ids.cnc,
        ids.assembly,
        ids.fab,
        ids.software_lab,
    ] {
        state.modules.add(
            kind,
            content.catalog.module_kind(kind),
            content.config.ambient_temperature_c,
        );
    }
    state.storage.seed(ids.iron_ore, 1_000.0);
    state
}
