use crate::test_fixtures::{base_content, base_state, make_rng, FixtureIds};
use crate::{
    expand_production_task, tick, BlockReason, FactoryContent, FactoryState, TaskId, TaskStatus,
};

mod determinism;
mod factory_loop;

// --- Shared test helpers ------------------------------------------------

fn setup() -> (FactoryContent, FixtureIds, FactoryState) {
    let (content, ids) = base_content();
    let state = base_state(&content, &ids);
    (content, ids, state)
}

fn run_ticks(
    state: &mut FactoryState,
    content: &FactoryContent,
    rng: &mut impl rand::Rng,
    ticks: u64,
) {
    for _ in 0..ticks {
        tick(state, content, rng).expect("tick should not fail");
    }
}

fn status_of(state: &FactoryState, id: TaskId) -> TaskStatus {
    state.sched.task(id).status
}
