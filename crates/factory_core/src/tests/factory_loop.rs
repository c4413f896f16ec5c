use super::*;
use crate::{
    run_simulation, seed_goals, LogLevel, RunLimits, RunOutcome, BATTERY_MAX_SOC, BATTERY_MIN_SOC,
};

fn limits(max_hours: f32) -> RunLimits {
    RunLimits {
        max_hours,
        max_wall_seconds: 60.0,
    }
}

#[test]
fn test_single_recipe_run_end_to_end() {
    let (content, ids, mut state) = setup();
    let mut rng = make_rng();

    let goal = expand_production_task(&mut state, &content, ids.steel, 50.0, 0).unwrap();
    state.goal_tasks.push(goal);

    let report = run_simulation(&mut state, &content, &mut rng, limits(100.0)).unwrap();
    assert_eq!(report.outcome, RunOutcome::GoalsAchieved);

    // 925 t ore remain, 50 t steel on hand, finished shortly after 2.5 h.
    assert!((state.storage.quantity(ids.iron_ore) - 925.0).abs() < 1e-2);
    assert!((state.storage.quantity(ids.steel) - 50.0).abs() < 1e-2);
    assert!(state.time_hours() < 4.0);

    let status = &report.run_log.final_status;
    assert_eq!(status.completed_tasks, 1);
    assert_eq!(status.active_tasks, 0);
    assert_eq!(status.blocked_tasks, 0);
    assert_eq!(report.run_log.completed_tasks.len(), 1);
}

#[test]
fn test_replication_goal_builds_a_second_smelter() {
    let (content, ids, mut state) = setup();
    let mut rng = make_rng();

    seed_goals(&mut state, &content).unwrap();
    assert_eq!(state.goal_tasks.len(), 1);
    // Module task plus its steel dependency.
    assert_eq!(state.sched.tasks.len(), 2);

    let report = run_simulation(&mut state, &content, &mut rng, limits(100.0)).unwrap();
    assert_eq!(report.outcome, RunOutcome::GoalsAchieved);
    assert_eq!(state.modules.count_of_kind(ids.smelter), 2);
    assert_eq!(report.run_log.final_status.modules["smelter"], 2);
}

#[test]
fn test_unbuildable_module_requirement_deadlocks() {
    let (content, ids) = base_content();
    // No modules at all: the steel task can never find a smelter, and
    // nothing produces one.
    let mut state = FactoryState::new(&content, 42);
    state.storage.seed(ids.iron_ore, 1_000.0);
    let mut rng = make_rng();

    let goal = expand_production_task(&mut state, &content, ids.steel, 10.0, 0).unwrap();
    state.goal_tasks.push(goal);

    let report = run_simulation(&mut state, &content, &mut rng, limits(100.0)).unwrap();
    assert_eq!(report.outcome, RunOutcome::DeadlockDetected);
    assert_eq!(report.run_log.final_status.blocked_tasks, 1);
    assert_eq!(state.sched.blocked_counts(), vec![("blocked_module", 1)]);
    assert!(
        report
            .run_log
            .log_entries
            .iter()
            .any(|e| e.level == LogLevel::Error && e.message.contains("deadlock")),
        "deadlock diagnostic must be logged"
    );
    // Termination is clean: a full report exists despite the deadlock.
    assert!(!report.run_log.metrics.is_empty());
}

#[test]
fn test_deadlock_confirms_after_two_retry_cycles() {
    let (content, ids) = base_content();
    let mut state = FactoryState::new(&content, 42);
    state.storage.seed(ids.iron_ore, 1_000.0);
    let mut rng = make_rng();

    expand_production_task(&mut state, &content, ids.steel, 10.0, 0).unwrap();

    // Blocked on the first admission pass: the structural condition holds
    // immediately, but confirmation needs the census to see it survive two
    // full retry cycles of requeue-and-reblock.
    run_ticks(&mut state, &content, &mut rng, 1);
    assert!(state.is_deadlocked());
    assert!(!state.deadlock_confirmed());

    run_ticks(&mut state, &content, &mut rng, 18);
    assert!(!state.deadlock_confirmed(), "one cycle is not enough");

    run_ticks(&mut state, &content, &mut rng, 1);
    assert!(state.is_deadlocked());
    assert!(state.deadlock_confirmed());
}

#[test]
fn test_idle_factory_runs_to_time_exhaustion() {
    let (content, _ids, mut state) = setup();
    let mut rng = make_rng();

    let report = run_simulation(&mut state, &content, &mut rng, limits(1.0)).unwrap();
    assert_eq!(report.outcome, RunOutcome::TimeExhausted);
    assert!((state.time_hours() - 1.0).abs() < 0.11);
}

#[test]
fn test_wall_clock_timeout_is_fatal() {
    let (content, _ids, mut state) = setup();
    let mut rng = make_rng();

    let err = run_simulation(
        &mut state,
        &content,
        &mut rng,
        RunLimits {
            max_hours: 1e9,
            max_wall_seconds: 0.0,
        },
    )
    .unwrap_err();
    assert!(matches!(err, crate::SimError::Timeout { .. }));
}

#[test]
fn test_metrics_sampled_once_per_simulated_hour() {
    let (content, _ids, mut state) = setup();
    let mut rng = make_rng();

    run_ticks(&mut state, &content, &mut rng, 25);
    // Samples at t = 0.0, 1.0, 2.0.
    assert_eq!(state.metrics.len(), 3);
    assert_eq!(state.metrics.time, vec![0.0, 1.0, 2.0]);
    assert_eq!(state.metrics.modules.last(), Some(&5));
}

#[test]
fn test_battery_and_storage_invariants_hold_every_tick() {
    let (mut content, ids) = base_content();
    // Full physics on.
    content.config.enable_weather = true;
    content.config.enable_quality_control = true;
    content.config.enable_degradation = true;
    content.config.enable_maintenance = true;
    let mut state = crate::test_fixtures::base_state(&content, &ids);
    let mut rng = make_rng();

    expand_production_task(&mut state, &content, ids.steel_beam, 5.0, 0).unwrap();
    expand_production_task(&mut state, &content, ids.steel, 30.0, 2).unwrap();

    let cap = state.energy.battery_capacity_kwh;
    for _ in 0..600 {
        tick(&mut state, &content, &mut rng).unwrap();
        let charge = state.energy.battery_charge_kwh;
        assert!(
            charge >= BATTERY_MIN_SOC * cap - 1e-3 && charge <= BATTERY_MAX_SOC * cap + 1e-3,
            "battery charge {charge} outside SOC band"
        );
        assert!(
            state.storage.total_weight_t() <= content.config.max_storage_weight_tons + 1e-3,
            "weight cap violated"
        );
        assert!(
            state.storage.total_volume_m3(&content.catalog)
                <= content.config.max_storage_volume_m3 + 1e-3,
            "volume cap violated"
        );
    }
}

#[test]
fn test_blocked_retry_runs_on_the_retry_interval() {
    let (content, ids) = base_content();
    let mut state = FactoryState::new(&content, 42);
    state.storage.seed(ids.iron_ore, 1_000.0);
    let mut rng = make_rng();

    let task = expand_production_task(&mut state, &content, ids.steel, 10.0, 0).unwrap();
    run_ticks(&mut state, &content, &mut rng, 1);
    assert_eq!(
        status_of(&state, task),
        TaskStatus::Blocked(BlockReason::Module)
    );

    // A smelter appears, but the blocked map is only re-evaluated on the
    // 10-tick boundary.
    state.modules.add(
        ids.smelter,
        content.catalog.module_kind(ids.smelter),
        content.config.ambient_temperature_c,
    );
    run_ticks(&mut state, &content, &mut rng, 8);
    assert_eq!(
        status_of(&state, task),
        TaskStatus::Blocked(BlockReason::Module)
    );

    // Tick 10 requeues; the next admission pass starts it.
    run_ticks(&mut state, &content, &mut rng, 3);
    assert_eq!(status_of(&state, task), TaskStatus::Active);
}

#[test]
fn test_completed_tasks_keep_only_last_hundred_in_run_log() {
    let (content, _ids, mut state) = setup();

    // Synthesize a long completed log directly.
    for i in 0..250 {
        state.sched.completed_log.push(crate::CompletedTaskRecord {
            task_id: i,
            output: "STEEL".to_string(),
            quantity: 1.0,
            actual_output: 1.0,
            energy_consumed: 1.0,
            completion_time: i as f32,
            quality_yield: 1.0,
            waste_generated: 0.0,
        });
    }
    let run_log = crate::build_run_log(&state, &content);
    assert_eq!(run_log.completed_tasks.len(), 100);
    assert_eq!(run_log.completed_tasks[0].task_id, 150);
    assert_eq!(run_log.completed_tasks[99].task_id, 249);
}
