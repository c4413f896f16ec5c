//! File-level spec loading tests: formats, inheritance, profiles,
//! validation failures.

use std::io::Write;
use std::path::PathBuf;

use factory_spec::{load_factory, load_spec, resolve_config, SpecError};

fn write_spec(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

const MINIMAL_JSON: &str = r#"{
    "metadata": {"name": "Test Factory", "version": "1.0"},
    "resources": {
        "IRON_ORE": {"density": 4.0, "recyclable": false},
        "STEEL": {"density": 7.8}
    },
    "recipes": [
        {
            "output": "STEEL",
            "output_quantity": 10,
            "inputs": {"IRON_ORE": 15},
            "energy_kwh": 100,
            "time_hours": 2.0,
            "required_module": "smelter"
        }
    ],
    "modules": {
        "smelter": {"max_throughput": 25.0, "power_consumption_active": 250.0}
    },
    "initial_state": {
        "modules": {"smelter": 1},
        "resources": {"IRON_ORE": 1000}
    },
    "constraints": {"parallel_processing_limit": 5},
    "profiles": {
        "high_power": {"initial_solar_capacity_kw": 500.0}
    },
    "target_modules": []
}"#;

#[test]
fn loads_minimal_json_spec() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(&dir, "minimal.json", MINIMAL_JSON);

    let spec = load_spec(&path).unwrap();
    assert_eq!(spec.metadata.name, "Test Factory");
    assert!(spec.resources.contains_key("IRON_ORE"));
    assert_eq!(spec.recipes.len(), 1);

    let config = resolve_config(&spec, None).unwrap();
    assert_eq!(config.parallel_processing_limit, 5);
    // Unlisted keys fall back to defaults.
    assert_eq!(config.agv_fleet_size, 10);
}

#[test]
fn loads_yaml_spec_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(
        &dir,
        "minimal.yaml",
        r#"
metadata:
  name: Yaml Factory
resources:
  IRON_ORE:
    density: 4.0
  STEEL:
    density: 7.8
recipes:
  - output: STEEL
    output_quantity: 10
    inputs:
      IRON_ORE: 15
    energy_kwh: 100
    time_hours: 2.0
    required_module: smelter
modules:
  smelter:
    max_throughput: 25.0
"#,
    );
    let spec = load_spec(&path).unwrap();
    assert_eq!(spec.metadata.name, "Yaml Factory");
    assert_eq!(spec.recipes[0].output, "STEEL");
}

#[test]
fn missing_spec_file_is_not_found() {
    let err = load_spec(std::path::Path::new("/no/such/spec.json")).unwrap_err();
    assert!(matches!(err, SpecError::NotFound { .. }));
}

#[test]
fn invalid_json_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(&dir, "broken.json", "{ invalid json }");
    let err = load_spec(&path).unwrap_err();
    assert!(matches!(err, SpecError::Parse { .. }));
}

#[test]
fn child_spec_inherits_and_overrides_parent() {
    let dir = tempfile::tempdir().unwrap();
    write_spec(&dir, "parent.json", MINIMAL_JSON);
    let child = write_spec(
        &dir,
        "child.json",
        r#"{
            "metadata": {"name": "Child Factory", "parent": "parent.json"},
            "resources": {
                "ALUMINUM": {"density": 2.7}
            },
            "constraints": {"parallel_processing_limit": 8}
        }"#,
    );

    let spec = load_spec(&child).unwrap();
    assert_eq!(spec.metadata.name, "Child Factory");
    // Parent content survives; child additions and overrides land.
    assert!(spec.resources.contains_key("IRON_ORE"));
    assert!(spec.resources.contains_key("ALUMINUM"));
    let config = resolve_config(&spec, None).unwrap();
    assert_eq!(config.parallel_processing_limit, 8);
}

#[test]
fn inheritance_loop_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write_spec(
        &dir,
        "a.json",
        r#"{"metadata": {"name": "A", "parent": "b.json"}}"#,
    );
    let a = dir.path().join("a.json");
    write_spec(
        &dir,
        "b.json",
        r#"{"metadata": {"name": "B", "parent": "a.json"}}"#,
    );
    let err = load_spec(&a).unwrap_err();
    assert!(matches!(err, SpecError::Inheritance { .. }));
}

#[test]
fn unknown_input_resource_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(
        &dir,
        "bad.json",
        r#"{
            "resources": {"STEEL": {}},
            "recipes": [
                {"output": "STEEL", "inputs": {"MISSING_RESOURCE": 15},
                 "required_module": "smelter"}
            ],
            "modules": {"smelter": {}}
        }"#,
    );
    let err = load_spec(&path).unwrap_err();
    match err {
        SpecError::Validation { reason, .. } => assert!(reason.contains("MISSING_RESOURCE")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn unknown_required_module_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(
        &dir,
        "bad.json",
        r#"{
            "resources": {"IRON_ORE": {}, "STEEL": {}},
            "recipes": [
                {"output": "STEEL", "inputs": {"IRON_ORE": 15},
                 "required_module": "nonexistent_module"}
            ],
            "modules": {}
        }"#,
    );
    let err = load_spec(&path).unwrap_err();
    match err {
        SpecError::Validation { reason, .. } => assert!(reason.contains("nonexistent_module")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn negative_throughput_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(
        &dir,
        "bad.json",
        r#"{
            "resources": {},
            "recipes": [],
            "modules": {"bad_module": {"max_throughput": -10.0}}
        }"#,
    );
    let err = load_spec(&path).unwrap_err();
    match err {
        SpecError::Validation { reason, .. } => assert!(reason.contains("throughput")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn recipe_cycle_fails_validation_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(
        &dir,
        "cyclic.json",
        r#"{
            "resources": {"A": {}, "B": {}, "C": {}},
            "recipes": [
                {"output": "A", "inputs": {"B": 1}, "required_module": "assembly"},
                {"output": "B", "inputs": {"C": 1}, "required_module": "assembly"},
                {"output": "C", "inputs": {"A": 1}, "required_module": "assembly"}
            ],
            "modules": {"assembly": {}}
        }"#,
    );
    let err = load_spec(&path).unwrap_err();
    match err {
        SpecError::Cycle { path } => {
            assert!(path.len() >= 4, "cycle path should name the loop: {path:?}");
            assert!(["A", "B", "C"].iter().any(|k| path.contains(&(*k).to_string())));
        }
        other => panic!("expected cycle error, got {other:?}"),
    }
}

#[test]
fn unknown_profile_is_a_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(&dir, "minimal.json", MINIMAL_JSON);
    let spec = load_spec(&path).unwrap();
    let err = resolve_config(&spec, Some("no_such_profile")).unwrap_err();
    assert!(matches!(err, SpecError::Validation { .. }));
}

#[test]
fn profile_overrides_base_constraints() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(&dir, "minimal.json", MINIMAL_JSON);
    let spec = load_spec(&path).unwrap();

    let base = resolve_config(&spec, None).unwrap();
    assert_eq!(base.initial_solar_capacity_kw, 100.0);

    let tuned = resolve_config(&spec, Some("high_power")).unwrap();
    assert_eq!(tuned.initial_solar_capacity_kw, 500.0);
    // Base constraint keys survive the overlay.
    assert_eq!(tuned.parallel_processing_limit, 5);
}

#[test]
fn out_of_range_constraint_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(
        &dir,
        "bad_config.json",
        r#"{
            "resources": {},
            "recipes": [],
            "modules": {},
            "constraints": {"initial_solar_capacity_kw": -100.0}
        }"#,
    );
    let spec = load_spec(&path).unwrap();
    let err = resolve_config(&spec, None).unwrap_err();
    assert!(matches!(err, SpecError::Config(_)));
}

#[test]
fn load_factory_builds_runnable_state_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(&dir, "minimal.json", MINIMAL_JSON);

    let (content, state) = load_factory(Some(&path), None, 7).unwrap();
    assert_eq!(content.catalog.resource_count(), 2);
    assert_eq!(state.modules.len(), 1);
    let ore = content.catalog.resource_id("IRON_ORE").unwrap();
    assert_eq!(state.storage.quantity(ore), 1_000.0);
}

#[test]
fn load_factory_without_spec_uses_builtin() {
    let (content, state) = load_factory(None, None, 7).unwrap();
    assert!(content.catalog.resource_count() > 20);
    assert_eq!(state.modules.len(), 7);
}

#[test]
fn module_prefixed_resources_link_to_their_kind() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(
        &dir,
        "products.json",
        r#"{
            "resources": {
                "STEEL": {"density": 7.8},
                "MODULE_SMELTER": {"density": 5.0, "recyclable": false}
            },
            "recipes": [
                {"output": "MODULE_SMELTER", "inputs": {"STEEL": 20},
                 "time_hours": 5.0, "required_module": "smelter"}
            ],
            "modules": {"smelter": {}},
            "initial_state": {"modules": {"smelter": 1}}
        }"#,
    );
    let (content, _state) = load_factory(Some(&path), None, 1).unwrap();
    let product = content.catalog.resource_id("MODULE_SMELTER").unwrap();
    let smelter = content.catalog.module_kind_id("smelter").unwrap();
    assert_eq!(content.catalog.module_product(product), Some(smelter));
    assert_eq!(content.catalog.product_for_module_kind(smelter), Some(product));
}
