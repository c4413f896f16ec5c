use super::*;
use crate::{build_run_log, run_simulation, seed_goals, RunLimits};

fn full_physics_content() -> (crate::FactoryContent, crate::test_fixtures::FixtureIds) {
    let (mut content, ids) = base_content();
    content.config.enable_weather = true;
    content.config.enable_quality_control = true;
    content.config.enable_degradation = true;
    content.config.enable_maintenance = true;
    content.config.enable_transport_time = true;
    content.config.average_cloud_cover = 0.3;
    (content, ids)
}

fn run_once(seed: u64) -> String {
    use rand::SeedableRng;

    let (content, ids) = full_physics_content();
    let mut state = crate::test_fixtures::base_state(&content, &ids);
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);

    seed_goals(&mut state, &content).unwrap();
    let report = run_simulation(
        &mut state,
        &content,
        &mut rng,
        RunLimits {
            max_hours: 50.0,
            max_wall_seconds: 60.0,
        },
    )
    .unwrap();
    serde_json::to_string(&report.run_log).unwrap()
}

#[test]
fn test_same_seed_reproduces_the_run_log_byte_for_byte() {
    let first = run_once(7);
    let second = run_once(7);
    assert_eq!(first, second);
}

#[test]
fn test_different_seeds_diverge_under_jitter() {
    let first = run_once(7);
    let second = run_once(8);
    assert_ne!(
        first, second,
        "weather and quality jitter should separate different seeds"
    );
}

#[test]
fn test_run_log_serialization_is_stable_for_one_state() {
    let (content, ids, mut state) = setup();
    let mut rng = make_rng();
    expand_production_task(&mut state, &content, ids.steel, 20.0, 0).unwrap();
    run_ticks(&mut state, &content, &mut rng, 30);

    let a = serde_json::to_string(&build_run_log(&state, &content)).unwrap();
    let b = serde_json::to_string(&build_run_log(&state, &content)).unwrap();
    assert_eq!(a, b);

    // Reload-compare: the JSON is structurally identical after a round trip.
    let va: serde_json::Value = serde_json::from_str(&a).unwrap();
    let vb: serde_json::Value = serde_json::from_str(&b).unwrap();
    assert_eq!(va, vb);
}
