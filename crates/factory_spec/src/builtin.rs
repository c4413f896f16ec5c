//! Built-in factory definition, used when no spec file is given.
//!
//! A compact but closed self-replication catalog: four ore feeds plus crude
//! oil, refined materials, machined and cleanroom components, a software
//! prerequisite chain, and one MODULE_* product per module kind so every
//! kind in the factory can be rebuilt from raw inputs.

use std::collections::BTreeMap;

use crate::schema::{
    InitialState, Metadata, ModuleEntry, RecipeEntry, ResourceEntry, SoftwareEntry, SpecFile,
};

fn resource(density: f32, recyclable: bool) -> ResourceEntry {
    ResourceEntry {
        density,
        recyclable,
        ..ResourceEntry::default()
    }
}

#[allow(clippy::too_many_lines)]
pub fn builtin_spec() -> SpecFile {
    let mut resources: BTreeMap<String, ResourceEntry> = BTreeMap::new();

    // Raw feeds. Not recyclable: ore never comes back from the waste stream.
    resources.insert("IRON_ORE".into(), resource(4.0, false));
    resources.insert("COPPER_ORE".into(), resource(4.5, false));
    resources.insert("SILICON_ORE".into(), resource(2.6, false));
    resources.insert("ALUMINUM_ORE".into(), resource(2.7, false));
    resources.insert("CRUDE_OIL".into(), resource(0.9, false));

    // Refined materials.
    resources.insert("STEEL".into(), resource(7.8, true));
    resources.insert("COPPER".into(), resource(8.9, true));
    resources.insert("ALUMINUM".into(), resource(2.7, true));
    resources.insert("SILICON".into(), resource(2.3, true));
    resources.insert("GLASS".into(), resource(2.5, true));
    resources.insert("PLASTIC".into(), resource(0.95, true));
    resources.insert("SLAG".into(), resource(3.0, false));
    resources.insert("PLASTIC_WASTE".into(), resource(0.9, true));

    // Machined and assembled components.
    resources.insert("STEEL_BEAM".into(), resource(7.8, true));
    resources.insert("COPPER_WIRE".into(), resource(8.9, true));
    resources.insert("BEARING".into(), resource(7.8, true));
    resources.insert("MOTOR".into(), resource(6.0, false));
    resources.insert(
        "SILICON_WAFER".into(),
        ResourceEntry {
            density: 2.3,
            contamination_sensitivity: 1.0,
            storage_temp: 22.0,
            ..ResourceEntry::default()
        },
    );
    resources.insert(
        "CHIP".into(),
        ResourceEntry {
            density: 2.3,
            contamination_sensitivity: 1.0,
            storage_temp: 22.0,
            ..ResourceEntry::default()
        },
    );
    resources.insert("SENSOR".into(), resource(3.0, false));
    resources.insert("CONTROL_BOARD".into(), resource(2.8, false));

    // Software kinds (library assets, never stored physically).
    for name in [
        "PLC_PROGRAM",
        "ROBOT_FIRMWARE",
        "SCADA_SYSTEM",
        "AI_MODEL",
    ] {
        resources.insert(name.into(), resource(1.0, false));
    }

    // Module products.
    for name in [
        "MODULE_SMELTER",
        "MODULE_REFINER",
        "MODULE_CHEMICAL_PLANT",
        "MODULE_CNC",
        "MODULE_FAB",
        "MODULE_ASSEMBLY",
        "MODULE_SOFTWARE_LAB",
    ] {
        resources.insert(name.into(), resource(5.0, false));
    }

    let mut modules: BTreeMap<String, ModuleEntry> = BTreeMap::new();
    modules.insert(
        "smelter".into(),
        ModuleEntry {
            max_throughput: 25.0,
            power_consumption_idle: 10.0,
            power_consumption_active: 250.0,
            mtbf_hours: 8_000.0,
            setup_time: 0.5,
            base_quality: 0.97,
            ..ModuleEntry::default()
        },
    );
    modules.insert(
        "refiner".into(),
        ModuleEntry {
            max_throughput: 20.0,
            power_consumption_idle: 8.0,
            power_consumption_active: 150.0,
            mtbf_hours: 9_000.0,
            base_quality: 0.97,
            ..ModuleEntry::default()
        },
    );
    modules.insert(
        "chemical_plant".into(),
        ModuleEntry {
            max_throughput: 15.0,
            power_consumption_idle: 8.0,
            power_consumption_active: 120.0,
            mtbf_hours: 7_000.0,
            base_quality: 0.96,
            ..ModuleEntry::default()
        },
    );
    modules.insert(
        "cnc".into(),
        ModuleEntry {
            max_throughput: 10.0,
            power_consumption_idle: 5.0,
            power_consumption_active: 75.0,
            mtbf_hours: 10_000.0,
            setup_time: 0.25,
            tolerance_capability_um: Some(0.5),
            base_quality: 0.98,
            ..ModuleEntry::default()
        },
    );
    modules.insert(
        "fab".into(),
        ModuleEntry {
            max_throughput: 2.0,
            power_consumption_idle: 15.0,
            power_consumption_active: 100.0,
            mtbf_hours: 6_000.0,
            setup_time: 1.0,
            tolerance_capability_um: Some(0.05),
            cleanroom_class_capability: Some(10),
            base_quality: 0.94,
            ..ModuleEntry::default()
        },
    );
    modules.insert(
        "assembly".into(),
        ModuleEntry {
            max_throughput: 5.0,
            power_consumption_idle: 5.0,
            power_consumption_active: 60.0,
            mtbf_hours: 12_000.0,
            tolerance_capability_um: Some(1.0),
            base_quality: 0.98,
            ..ModuleEntry::default()
        },
    );
    modules.insert(
        "software_lab".into(),
        ModuleEntry {
            max_throughput: 0.025,
            power_consumption_idle: 2.0,
            power_consumption_active: 10.0,
            mtbf_hours: 20_000.0,
            setup_time: 0.0,
            min_batch: 1.0,
            max_batch: 1.0,
            base_quality: 1.0,
            ..ModuleEntry::default()
        },
    );

    let recipe = |output: &str,
                  output_quantity: f32,
                  inputs: &[(&str, f32)],
                  energy_kwh: f32,
                  time_hours: f32,
                  module: &str|
     -> RecipeEntry {
        RecipeEntry {
            output: output.into(),
            output_quantity,
            inputs: inputs
                .iter()
                .map(|(name, qty)| ((*name).to_string(), *qty))
                .collect(),
            energy_kwh,
            time_hours,
            required_module: Some(module.into()),
            tolerance_um: None,
            cleanroom_class: None,
            software_required: None,
            waste_products: BTreeMap::new(),
        }
    };

    let mut recipes = vec![
        // Refining.
        RecipeEntry {
            waste_products: BTreeMap::from([("SLAG".to_string(), 0.5)]),
            ..recipe("STEEL", 10.0, &[("IRON_ORE", 15.0)], 100.0, 2.0, "smelter")
        },
        RecipeEntry {
            waste_products: BTreeMap::from([("SLAG".to_string(), 0.4)]),
            ..recipe("COPPER", 10.0, &[("COPPER_ORE", 12.0)], 90.0, 2.5, "smelter")
        },
        RecipeEntry {
            waste_products: BTreeMap::from([("SLAG".to_string(), 0.5)]),
            ..recipe(
                "ALUMINUM",
                10.0,
                &[("ALUMINUM_ORE", 14.0)],
                150.0,
                3.0,
                "smelter",
            )
        },
        recipe("SILICON", 10.0, &[("SILICON_ORE", 12.0)], 120.0, 3.0, "refiner"),
        recipe("GLASS", 10.0, &[("SILICON_ORE", 14.0)], 80.0, 2.0, "refiner"),
        recipe(
            "PLASTIC",
            10.0,
            &[("CRUDE_OIL", 12.0)],
            60.0,
            2.0,
            "chemical_plant",
        ),
        // Machining.
        RecipeEntry {
            tolerance_um: Some(1.0),
            ..recipe("STEEL_BEAM", 10.0, &[("STEEL", 12.0)], 40.0, 1.0, "cnc")
        },
        RecipeEntry {
            tolerance_um: Some(0.5),
            ..recipe("COPPER_WIRE", 10.0, &[("COPPER", 11.0)], 30.0, 1.0, "cnc")
        },
        RecipeEntry {
            tolerance_um: Some(0.5),
            ..recipe("BEARING", 1.0, &[("STEEL", 2.0)], 25.0, 1.0, "cnc")
        },
        // Cleanroom fabrication.
        RecipeEntry {
            tolerance_um: Some(0.5),
            cleanroom_class: Some(100),
            ..recipe("SILICON_WAFER", 1.0, &[("SILICON", 1.2)], 50.0, 4.0, "fab")
        },
        RecipeEntry {
            tolerance_um: Some(0.1),
            cleanroom_class: Some(10),
            ..recipe("CHIP", 1.0, &[("SILICON_WAFER", 1.1)], 80.0, 6.0, "fab")
        },
        RecipeEntry {
            cleanroom_class: Some(100),
            ..recipe(
                "CONTROL_BOARD",
                1.0,
                &[("CHIP", 0.3), ("COPPER_WIRE", 0.4)],
                40.0,
                3.0,
                "fab",
            )
        },
        // Assembly.
        RecipeEntry {
            software_required: Some("ROBOT_FIRMWARE".to_string()),
            ..recipe(
                "MOTOR",
                1.0,
                &[("STEEL", 1.0), ("COPPER_WIRE", 0.5), ("BEARING", 0.2)],
                50.0,
                2.0,
                "assembly",
            )
        },
        RecipeEntry {
            software_required: Some("PLC_PROGRAM".to_string()),
            ..recipe(
                "SENSOR",
                1.0,
                &[("CHIP", 0.2), ("PLASTIC", 0.3), ("COPPER_WIRE", 0.2)],
                30.0,
                2.0,
                "assembly",
            )
        },
        // Software development (time-only cost).
        recipe("PLC_PROGRAM", 1.0, &[], 0.0, 40.0, "software_lab"),
        RecipeEntry {
            software_required: Some("PLC_PROGRAM".to_string()),
            ..recipe("ROBOT_FIRMWARE", 1.0, &[], 0.0, 60.0, "software_lab")
        },
        RecipeEntry {
            software_required: Some("PLC_PROGRAM".to_string()),
            ..recipe("SCADA_SYSTEM", 1.0, &[], 0.0, 80.0, "software_lab")
        },
        RecipeEntry {
            software_required: Some("SCADA_SYSTEM".to_string()),
            ..recipe("AI_MODEL", 1.0, &[], 0.0, 120.0, "software_lab")
        },
    ];

    // Module products: completing one commissions a new instance.
    recipes.extend([
        recipe(
            "MODULE_SMELTER",
            1.0,
            &[("STEEL_BEAM", 10.0), ("MOTOR", 2.0), ("CONTROL_BOARD", 1.0)],
            300.0,
            20.0,
            "assembly",
        ),
        recipe(
            "MODULE_REFINER",
            1.0,
            &[("STEEL_BEAM", 10.0), ("MOTOR", 3.0), ("CONTROL_BOARD", 1.0)],
            280.0,
            20.0,
            "assembly",
        ),
        recipe(
            "MODULE_CHEMICAL_PLANT",
            1.0,
            &[
                ("STEEL_BEAM", 10.0),
                ("ALUMINUM", 4.0),
                ("MOTOR", 2.0),
                ("CONTROL_BOARD", 1.0),
            ],
            260.0,
            24.0,
            "assembly",
        ),
        recipe(
            "MODULE_CNC",
            1.0,
            &[
                ("STEEL_BEAM", 8.0),
                ("MOTOR", 4.0),
                ("BEARING", 2.0),
                ("CONTROL_BOARD", 2.0),
            ],
            320.0,
            24.0,
            "assembly",
        ),
        RecipeEntry {
            software_required: Some("SCADA_SYSTEM".to_string()),
            ..recipe(
                "MODULE_FAB",
                1.0,
                &[
                    ("STEEL_BEAM", 10.0),
                    ("ALUMINUM", 5.0),
                    ("GLASS", 5.0),
                    ("SENSOR", 4.0),
                    ("CONTROL_BOARD", 4.0),
                ],
                500.0,
                40.0,
                "assembly",
            )
        },
        recipe(
            "MODULE_ASSEMBLY",
            1.0,
            &[
                ("STEEL_BEAM", 12.0),
                ("MOTOR", 6.0),
                ("SENSOR", 4.0),
                ("CONTROL_BOARD", 2.0),
            ],
            400.0,
            30.0,
            "assembly",
        ),
        recipe(
            "MODULE_SOFTWARE_LAB",
            1.0,
            &[("STEEL_BEAM", 6.0), ("CHIP", 2.0), ("SENSOR", 2.0)],
            200.0,
            20.0,
            "assembly",
        ),
    ]);

    let software = BTreeMap::from([
        (
            "PLC_PROGRAM".to_string(),
            SoftwareEntry {
                base_bug_rate: Some(0.05),
                compatible_modules: vec!["smelter".into(), "cnc".into(), "assembly".into()],
            },
        ),
        (
            "ROBOT_FIRMWARE".to_string(),
            SoftwareEntry {
                base_bug_rate: Some(0.08),
                compatible_modules: vec!["assembly".into(), "cnc".into()],
            },
        ),
        (
            "SCADA_SYSTEM".to_string(),
            SoftwareEntry {
                base_bug_rate: Some(0.06),
                compatible_modules: vec!["fab".into(), "chemical_plant".into()],
            },
        ),
        (
            "AI_MODEL".to_string(),
            SoftwareEntry {
                base_bug_rate: Some(0.12),
                compatible_modules: vec!["fab".into()],
            },
        ),
    ]);

    let initial_state = InitialState {
        modules: modules.keys().map(|name| (name.clone(), 1)).collect(),
        // Comfortably inside the default 10000 t / 15000 m3 storage caps.
        resources: BTreeMap::from([
            ("IRON_ORE".to_string(), 2_500.0),
            ("COPPER_ORE".to_string(), 1_000.0),
            ("SILICON_ORE".to_string(), 1_000.0),
            ("ALUMINUM_ORE".to_string(), 500.0),
            ("CRUDE_OIL".to_string(), 500.0),
        ]),
    };

    SpecFile {
        metadata: Metadata {
            name: "Self-Replicating Solar Factory".to_string(),
            version: "1.0".to_string(),
            description: "Built-in closed catalog: ores to module copies".to_string(),
            parent: None,
        },
        resources,
        recipes,
        modules,
        software,
        initial_state,
        constraints: serde_json::Map::new(),
        profiles: BTreeMap::new(),
        target_modules: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate;

    #[test]
    fn builtin_spec_validates() {
        validate(&builtin_spec()).unwrap();
    }

    #[test]
    fn builtin_spec_builds_content_and_state() {
        let spec = builtin_spec();
        let content = crate::build_content(&spec, None).unwrap();
        assert_eq!(content.catalog.module_kind_count(), 7);
        assert_eq!(content.target_modules.len(), 7);

        let state = crate::build_state(&content, &spec, 1);
        assert_eq!(state.modules.len(), 7);
        assert!(state.storage.quantity(content.catalog.resource_id("IRON_ORE").unwrap()) > 0.0);
    }

    #[test]
    fn builtin_every_module_kind_has_a_product() {
        let spec = builtin_spec();
        let content = crate::build_content(&spec, None).unwrap();
        for (kind, def) in content.catalog.module_kinds() {
            assert!(
                content.catalog.product_for_module_kind(kind).is_some(),
                "module kind `{}` has no MODULE_* product recipe",
                def.name
            );
        }
    }

    #[test]
    fn builtin_goals_seed_cleanly() {
        let spec = builtin_spec();
        let content = crate::build_content(&spec, None).unwrap();
        let mut state = crate::build_state(&content, &spec, 1);
        factory_core::seed_goals(&mut state, &content).unwrap();
        assert_eq!(state.goal_tasks.len(), 7);
    }
}
