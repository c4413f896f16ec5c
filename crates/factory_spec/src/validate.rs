//! Pre-run spec validation: reference checks, range checks, recipe-graph
//! cycle detection. Everything here fails fast, before any state exists.

use std::collections::BTreeMap;

use crate::schema::{RecipeEntry, SpecFile};
use crate::SpecError;

pub const DEFAULT_MODULE_KIND: &str = "assembly";

fn validation(field: impl Into<String>, reason: impl Into<String>) -> SpecError {
    SpecError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

pub fn validate(spec: &SpecFile) -> Result<(), SpecError> {
    let mut seen_outputs: Vec<&str> = Vec::new();

    for recipe in &spec.recipes {
        let output = recipe.output.as_str();
        if !spec.resources.contains_key(output) {
            return Err(validation(
                "recipes.output",
                format!("recipe output `{output}` is not a declared resource"),
            ));
        }
        if seen_outputs.contains(&output) {
            return Err(validation(
                "recipes.output",
                format!("duplicate recipe for output `{output}`"),
            ));
        }
        seen_outputs.push(output);

        if recipe.output_quantity <= 0.0 {
            return Err(validation(
                "recipes.output_quantity",
                format!("recipe `{output}` must produce a positive quantity"),
            ));
        }
        for input in recipe.inputs.keys() {
            if !spec.resources.contains_key(input) {
                return Err(validation(
                    "recipes.inputs",
                    format!("recipe `{output}` input `{input}` is not a declared resource"),
                ));
            }
        }
        for waste in recipe.waste_products.keys() {
            if !spec.resources.contains_key(waste) {
                return Err(validation(
                    "recipes.waste_products",
                    format!("recipe `{output}` waste `{waste}` is not a declared resource"),
                ));
            }
        }
        if let Some(software) = &recipe.software_required {
            if !spec.resources.contains_key(software) {
                return Err(validation(
                    "recipes.software_required",
                    format!("recipe `{output}` requires unknown software `{software}`"),
                ));
            }
        }
        let module = recipe
            .required_module
            .as_deref()
            .unwrap_or(DEFAULT_MODULE_KIND);
        if !spec.modules.contains_key(module) {
            return Err(validation(
                "recipes.required_module",
                format!("recipe `{output}` requires unknown module kind `{module}`"),
            ));
        }
    }

    for (name, module) in &spec.modules {
        if module.max_throughput <= 0.0 {
            return Err(validation(
                "modules.max_throughput",
                format!("module kind `{name}` must have positive throughput"),
            ));
        }
        if !(0.0..=1.0).contains(&module.base_quality) || module.base_quality == 0.0 {
            return Err(validation(
                "modules.base_quality",
                format!("module kind `{name}` base_quality must be in (0, 1]"),
            ));
        }
        if module.mtbf_hours <= 0.0 {
            return Err(validation(
                "modules.mtbf_hours",
                format!("module kind `{name}` mtbf_hours must be positive"),
            ));
        }
    }

    for name in spec.software.keys() {
        if !spec.resources.contains_key(name) {
            return Err(validation(
                "software",
                format!("software kind `{name}` is not a declared resource"),
            ));
        }
    }

    for kind in spec.initial_state.modules.keys() {
        if !spec.modules.contains_key(kind) {
            return Err(validation(
                "initial_state.modules",
                format!("initial module kind `{kind}` is not declared"),
            ));
        }
    }
    for resource in spec.initial_state.resources.keys() {
        if !spec.resources.contains_key(resource) {
            return Err(validation(
                "initial_state.resources",
                format!("initial resource `{resource}` is not declared"),
            ));
        }
    }

    if let Some(targets) = &spec.target_modules {
        for kind in targets {
            if !spec.modules.contains_key(kind) {
                return Err(validation(
                    "target_modules",
                    format!("target module kind `{kind}` is not declared"),
                ));
            }
        }
    }

    detect_recipe_cycles(spec)
}

/// DFS over the output -> input edges (plus software prerequisites),
/// reporting the offending path on the first cycle found.
fn detect_recipe_cycles(spec: &SpecFile) -> Result<(), SpecError> {
    let by_output: BTreeMap<&str, &RecipeEntry> = spec
        .recipes
        .iter()
        .map(|recipe| (recipe.output.as_str(), recipe))
        .collect();

    fn visit<'a>(
        name: &'a str,
        by_output: &BTreeMap<&'a str, &'a RecipeEntry>,
        stack: &mut Vec<&'a str>,
        done: &mut Vec<&'a str>,
    ) -> Result<(), SpecError> {
        if done.contains(&name) {
            return Ok(());
        }
        if stack.contains(&name) {
            let mut path: Vec<String> = stack.iter().map(|s| (*s).to_string()).collect();
            path.push(name.to_string());
            return Err(SpecError::Cycle { path });
        }
        let Some(recipe) = by_output.get(name) else {
            return Ok(()); // Raw input: no recipe, no outgoing edges.
        };
        stack.push(name);
        for input in recipe.inputs.keys() {
            visit(input, by_output, stack, done)?;
        }
        if let Some(software) = &recipe.software_required {
            visit(software, by_output, stack, done)?;
        }
        stack.pop();
        done.push(name);
        Ok(())
    }

    let mut done: Vec<&str> = Vec::new();
    for &output in by_output.keys() {
        let mut stack: Vec<&str> = Vec::new();
        visit(output, &by_output, &mut stack, &mut done)?;
    }
    Ok(())
}
