//! Same inputs, same battle.
//!
//! Battles are compared through
//! [`BattleController::state_hash`](village_core::battle::BattleController::state_hash). A check
//! either runs identical inputs several times and compares the final
//! hashes, or plays a recorded [`BattleReplayData`] back and compares it
//! with the hash stored at recording time. Any mismatch is a bug in the
//! simulation, never noise.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::panic;
use std::thread;

use village_core::battle::{BattleReplayData, ReplayPlayer};

use crate::fixtures::{test_data, BattleScenario};

/// Final state hash of every run of one setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRuns {
    /// One hash per run, in run order.
    pub hashes: Vec<u64>,
    /// Ticks each run was stepped.
    pub ticks: u64,
}

impl HashRuns {
    /// Whether every run ended in the same state.
    #[must_use]
    pub fn all_match(&self) -> bool {
        self.hashes.windows(2).all(|pair| pair[0] == pair[1])
    }

    /// Distinct end states.
    #[must_use]
    pub fn distinct(&self) -> BTreeSet<u64> {
        self.hashes.iter().copied().collect()
    }

    /// # Panics
    ///
    /// Panics, listing every hash, if two runs ended differently.
    pub fn assert_deterministic(&self) {
        assert!(
            self.all_match(),
            "{} runs over {} ticks ended in {} different states: {:?}",
            self.hashes.len(),
            self.ticks,
            self.distinct().len(),
            self.hashes
        );
    }
}

/// Build a fresh state with `setup` `runs` times, step each one `ticks`
/// times and hash the result.
///
/// ```ignore
/// use village_test_utils::determinism::verify_determinism;
/// use village_test_utils::fixtures::barbarian_raid;
///
/// verify_determinism(5, 300, barbarian_raid, |raid| { raid.step(); }, |raid| raid.state_hash())
///     .assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> HashRuns
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let hashes = (0..runs)
        .map(|_| {
            let mut state = setup();
            (0..ticks).for_each(|_| step(&mut state));
            hash(&state)
        })
        .collect();
    HashRuns { hashes, ticks }
}

/// Two runs of a scenario end in the same state.
pub fn battle_repeats<F>(setup: F, ticks: u64) -> bool
where
    F: Fn() -> BattleScenario,
{
    verify_determinism(2, ticks, setup, |s| {
        s.step();
    }, BattleScenario::state_hash)
    .all_match()
}

/// Play a replay back on the default game data and check its outcome
/// and final hash. A replay that cannot even be set up does not match.
#[must_use]
pub fn replay_matches(replay: BattleReplayData) -> bool {
    ReplayPlayer::new(test_data(), replay).is_ok_and(|mut player| player.verify())
}

/// Finish a scenario and record it.
pub fn record_scenario(scenario: &mut BattleScenario) -> BattleReplayData {
    scenario.battle.finish_battle(&mut scenario.store);
    scenario.battle.replay_data(&scenario.store)
}

/// Run `count` copies of a scenario on scoped threads.
///
/// # Panics
///
/// Re-raises a panic from any worker.
pub fn run_parallel_battles<F>(setup: F, count: usize, ticks: u64) -> HashRuns
where
    F: Fn() -> BattleScenario + Sync,
{
    let hashes = thread::scope(|s| {
        let workers: Vec<_> = (0..count)
            .map(|_| {
                s.spawn(|| {
                    let mut scenario = setup();
                    scenario.run(ticks);
                    scenario.state_hash()
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap_or_else(|cause| panic::resume_unwind(cause)))
            .collect()
    });
    HashRuns { hashes, ticks }
}

/// Compare two battle runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if the runs agree throughout, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> BattleScenario,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        a.step();
        b.step();

        if a.state_hash() != b.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for battle and map inputs.
pub mod strategies {
    use proptest::prelude::*;
    use village_core::data::TroopKind;
    use village_core::grid::{GRID_HEIGHT, GRID_WIDTH};
    use village_core::map_generation::Difficulty;

    /// Any cell on the default map.
    pub fn arb_cell() -> impl Strategy<Value = (i32, i32)> {
        (0..GRID_WIDTH, 0..GRID_HEIGHT)
    }

    /// A cell on the outer deployment border (3 cells deep).
    pub fn arb_edge_cell() -> impl Strategy<Value = (i32, i32)> {
        prop_oneof![
            (0..GRID_WIDTH, 0..3),
            (0..GRID_WIDTH, GRID_HEIGHT - 3..GRID_HEIGHT),
            (0..3, 0..GRID_HEIGHT),
            (GRID_WIDTH - 3..GRID_WIDTH, 0..GRID_HEIGHT),
        ]
    }

    /// Any troop type.
    pub fn arb_troop_kind() -> impl Strategy<Value = TroopKind> {
        proptest::sample::select(TroopKind::ALL.to_vec())
    }

    /// A troop placed at some tick on the map border.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PlannedDeployment {
        /// Tick to deploy on.
        pub tick: u64,
        /// Troop type.
        pub kind: TroopKind,
        /// Cell column.
        pub x: i32,
        /// Cell row.
        pub y: i32,
    }

    /// One deployment within the first `max_tick` ticks.
    pub fn arb_deployment(max_tick: u64) -> impl Strategy<Value = PlannedDeployment> {
        (0..max_tick, arb_troop_kind(), arb_edge_cell())
            .prop_map(|(tick, kind, (x, y))| PlannedDeployment { tick, kind, x, y })
    }

    /// Deployments sorted by tick.
    pub fn arb_deployment_plan(max_len: usize, max_tick: u64) -> impl Strategy<Value = Vec<PlannedDeployment>> {
        proptest::collection::vec(arb_deployment(max_tick), 1..max_len).prop_map(|mut plan| {
            plan.sort_by_key(|d| d.tick);
            plan
        })
    }

    /// A difficulty tier, including random.
    pub fn arb_difficulty() -> impl Strategy<Value = Difficulty> {
        prop_oneof![
            Just(Difficulty::Easy),
            Just(Difficulty::Medium),
            Just(Difficulty::Hard),
            Just(Difficulty::Random),
        ]
    }
}
