//! Spec loading and factory construction shared between the CLI and tests.
//!
//! Specs are JSON or YAML files (picked by extension) with optional parent
//! inheritance and named config profiles. `load_factory` is the one-call
//! surface: spec file (or the built-in catalog) in, validated
//! `FactoryContent` plus seeded `FactoryState` out.

mod builtin;
mod merge;
mod schema;
mod validate;

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use factory_core::{
    default_recovery_fraction, Catalog, ConfigError, FactoryContent, FactoryState, ModuleKindDef,
    RecipeDef, ResourceDef, SimConfig, SoftwareKindDef,
};

pub use builtin::builtin_spec;
pub use schema::{
    InitialState, Metadata, ModuleEntry, RecipeEntry, ResourceEntry, SoftwareEntry, SpecFile,
};
pub use validate::{validate, DEFAULT_MODULE_KIND};

/// Resource-name prefix marking a kind whose completion commissions a module
/// instance (`MODULE_SMELTER` -> module kind `smelter`).
const MODULE_PRODUCT_PREFIX: &str = "MODULE_";

/// Resource name used as the sink for non-recyclable yield loss, when
/// declared.
const WASTE_SINK_RESOURCE: &str = "PLASTIC_WASTE";

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("spec file not found: {path}")]
    NotFound { path: PathBuf },
    #[error("failed to read spec {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse spec {path}: {detail}")]
    Parse { path: PathBuf, detail: String },
    #[error("spec inheritance error: {detail}")]
    Inheritance { detail: String },
    #[error("spec validation failed at `{field}`: {reason}")]
    Validation { field: String, reason: String },
    #[error("circular recipe dependency: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Loads, inherits, and validates a spec file.
pub fn load_spec(path: &Path) -> Result<SpecFile, SpecError> {
    let mut chain: Vec<PathBuf> = Vec::new();
    let value = load_value(path, &mut chain)?;
    let spec: SpecFile = serde_json::from_value(value).map_err(|e| SpecError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    validate::validate(&spec)?;
    info!(
        spec = %path.display(),
        name = %spec.metadata.name,
        resources = spec.resources.len(),
        recipes = spec.recipes.len(),
        "spec loaded"
    );
    Ok(spec)
}

/// Reads one file into a JSON value, recursing through `metadata.parent` and
/// merging child over parent. `chain` guards against inheritance loops.
fn load_value(path: &Path, chain: &mut Vec<PathBuf>) -> Result<Value, SpecError> {
    if !path.exists() {
        return Err(SpecError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let canonical = path
        .canonicalize()
        .map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if chain.contains(&canonical) {
        return Err(SpecError::Inheritance {
            detail: format!(
                "inheritance loop through {}",
                canonical.display()
            ),
        });
    }
    chain.push(canonical.clone());

    let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = parse_by_extension(path, &text)?;

    let parent_path = value
        .get("metadata")
        .and_then(|m| m.get("parent"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let merged = if let Some(parent) = parent_path {
        let parent_file = canonical
            .parent()
            .map_or_else(|| PathBuf::from(&parent), |dir| dir.join(&parent));
        debug!(parent = %parent_file.display(), "resolving spec parent");
        let mut base = load_value(&parent_file, chain)?;
        merge::deep_merge(&mut base, value);
        base
    } else {
        value
    };

    chain.pop();
    Ok(merged)
}

fn parse_by_extension(path: &Path, text: &str) -> Result<Value, SpecError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let parsed = if extension == "yaml" || extension == "yml" {
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(text).map_err(|e| e.to_string())
    };
    parsed.map_err(|detail| SpecError::Parse {
        path: path.to_path_buf(),
        detail,
    })
}

// ---------------------------------------------------------------------------
// Config resolution
// ---------------------------------------------------------------------------

/// Resolves the flat runtime config: defaults, `constraints`, then the
/// selected profile overlay. Range-checked before use.
pub fn resolve_config(spec: &SpecFile, profile: Option<&str>) -> Result<SimConfig, SpecError> {
    let mut value = Value::Object(spec.constraints.clone());
    if let Some(name) = profile {
        let overlay = spec.profiles.get(name).ok_or_else(|| SpecError::Validation {
            field: "profiles".to_string(),
            reason: format!("unknown profile `{name}`"),
        })?;
        merge::deep_merge(&mut value, Value::Object(overlay.clone()));
        info!(profile = name, "profile applied");
    }
    let config: SimConfig =
        serde_json::from_value(value).map_err(|e| SpecError::Validation {
            field: "constraints".to_string(),
            reason: e.to_string(),
        })?;
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Catalog and state construction
// ---------------------------------------------------------------------------

/// Builds the immutable run content from a validated spec.
pub fn build_content(spec: &SpecFile, profile: Option<&str>) -> Result<FactoryContent, SpecError> {
    validate::validate(spec)?;
    let config = resolve_config(spec, profile)?;
    let mut catalog = Catalog::new();

    // BTreeMap order makes handle assignment deterministic.
    for (name, entry) in &spec.resources {
        catalog.add_resource(ResourceDef {
            name: name.clone(),
            density_t_per_m3: entry.density,
            storage_temp_c: entry.storage_temp,
            contamination_sensitivity: entry.contamination_sensitivity,
            recyclable: entry.recyclable,
            hazardous: entry.hazardous,
            volume_per_unit_m3: entry.volume_per_unit,
            recovery_fraction: entry
                .recovery_fraction
                .unwrap_or_else(|| default_recovery_fraction(name)),
        });
    }
    if let Some(sink) = catalog.resource_id(WASTE_SINK_RESOURCE) {
        catalog.set_default_waste_kind(sink);
    }

    for (name, entry) in &spec.modules {
        catalog.add_module_kind(ModuleKindDef {
            name: name.clone(),
            max_throughput: entry.max_throughput,
            idle_power_kw: entry.power_consumption_idle,
            active_power_kw: entry.power_consumption_active,
            mtbf_hours: entry.mtbf_hours,
            maintenance_interval_h: entry.maintenance_interval,
            degradation_rate: entry.degradation_rate,
            footprint_m2: entry.footprint_m2,
            min_batch: entry.min_batch,
            max_batch: entry.max_batch,
            setup_time_h: entry.setup_time,
            base_quality: entry.base_quality,
            tolerance_capability_um: entry.tolerance_capability_um,
            cleanroom_class_capability: entry.cleanroom_class_capability,
        });
    }

    for recipe in &spec.recipes {
        let output = catalog
            .resource_id(&recipe.output)
            .expect("validated output");
        let module_name = recipe
            .required_module
            .as_deref()
            .unwrap_or(DEFAULT_MODULE_KIND);
        catalog.set_recipe(RecipeDef {
            output,
            output_qty: recipe.output_quantity,
            inputs: recipe
                .inputs
                .iter()
                .map(|(name, qty)| (catalog.resource_id(name).expect("validated input"), *qty))
                .collect(),
            energy_kwh: recipe.energy_kwh,
            time_hours: recipe.time_hours,
            required_module: catalog
                .module_kind_id(module_name)
                .expect("validated module kind"),
            tolerance_um: recipe.tolerance_um,
            cleanroom_class: recipe.cleanroom_class,
            software_required: recipe
                .software_required
                .as_deref()
                .map(|name| catalog.resource_id(name).expect("validated software")),
            waste_products: recipe
                .waste_products
                .iter()
                .map(|(name, qty)| (catalog.resource_id(name).expect("validated waste"), *qty))
                .collect(),
        });
    }

    // MODULE_<KIND> resources commission a <kind> instance on completion.
    let product_links: Vec<_> = catalog
        .resources()
        .filter_map(|(id, def)| {
            def.name.strip_prefix(MODULE_PRODUCT_PREFIX).and_then(|rest| {
                catalog
                    .module_kind_id(&rest.to_ascii_lowercase())
                    .map(|kind| (id, kind))
            })
        })
        .collect();
    for (resource, kind) in product_links {
        catalog.link_module_product(resource, kind);
    }

    for (name, entry) in &spec.software {
        let resource = catalog.resource_id(name).expect("validated software kind");
        catalog.register_software(SoftwareKindDef {
            resource,
            base_bug_rate: entry.base_bug_rate.unwrap_or(0.05),
            compatible_module_kinds: entry
                .compatible_modules
                .iter()
                .filter_map(|kind| catalog.module_kind_id(kind))
                .collect(),
        });
    }

    let target_modules = match &spec.target_modules {
        Some(names) => names
            .iter()
            .map(|name| catalog.module_kind_id(name).expect("validated target"))
            .collect(),
        // Default goal: one copy of every module kind.
        None => catalog.module_kinds().map(|(id, _)| id).collect(),
    };

    Ok(FactoryContent {
        catalog,
        config,
        target_modules,
    })
}

/// Builds the t = 0 state: declared module instances plus stockpiles.
pub fn build_state(content: &FactoryContent, spec: &SpecFile, seed: u64) -> FactoryState {
    let mut state = FactoryState::new(content, seed);
    for (kind_name, count) in &spec.initial_state.modules {
        let kind = content
            .catalog
            .module_kind_id(kind_name)
            .expect("validated initial module");
        for _ in 0..*count {
            state.modules.add(
                kind,
                content.catalog.module_kind(kind),
                content.config.ambient_temperature_c,
            );
        }
    }
    for (resource_name, quantity) in &spec.initial_state.resources {
        let resource = content
            .catalog
            .resource_id(resource_name)
            .expect("validated initial resource");
        state.storage.seed(resource, *quantity);
    }
    state
}

/// One-call construction: a spec file (or the built-in catalog when absent),
/// an optional profile, and a seed.
pub fn load_factory(
    spec_path: Option<&Path>,
    profile: Option<&str>,
    seed: u64,
) -> Result<(FactoryContent, FactoryState), SpecError> {
    let spec = match spec_path {
        Some(path) => load_spec(path)?,
        None => {
            info!("no spec file given, using the built-in catalog");
            builtin::builtin_spec()
        }
    };
    let content = build_content(&spec, profile)?;
    let state = build_state(&content, &spec, seed);
    Ok((content, state))
}
