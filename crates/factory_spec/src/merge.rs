//! Deep merge for spec inheritance and profile overlays.

use serde_json::Value;

/// Merges `overlay` onto `base` in place. Objects union their keys and merge
/// recursively; every other value (including arrays) is replaced wholesale.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn child_overrides_leaves_and_unions_keys() {
        let mut base = json!({
            "resources": {
                "IRON_ORE": {"density": 4.0},
                "STEEL": {"density": 7.8}
            },
            "constraints": {"param1": 100}
        });
        let overlay = json!({
            "resources": {
                "ALUMINUM": {"density": 2.7}
            },
            "constraints": {"param1": 200}
        });
        deep_merge(&mut base, overlay);

        assert_eq!(base["resources"]["IRON_ORE"]["density"], 4.0);
        assert_eq!(base["resources"]["STEEL"]["density"], 7.8);
        assert_eq!(base["resources"]["ALUMINUM"]["density"], 2.7);
        assert_eq!(base["constraints"]["param1"], 200);
    }

    #[test]
    fn arrays_are_replaced_not_concatenated() {
        let mut base = json!({"recipes": [{"output": "A"}]});
        deep_merge(&mut base, json!({"recipes": [{"output": "B"}]}));
        assert_eq!(base["recipes"].as_array().unwrap().len(), 1);
        assert_eq!(base["recipes"][0]["output"], "B");
    }

    #[test]
    fn nested_partial_override_keeps_siblings() {
        let mut base = json!({"a": {"b": {"c": 1, "d": 2}}});
        deep_merge(&mut base, json!({"a": {"b": {"c": 9}}}));
        assert_eq!(base["a"]["b"]["c"], 9);
        assert_eq!(base["a"]["b"]["d"], 2);
    }
}
