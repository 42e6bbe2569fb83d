//! Record a battle on a generated map, write it to disk, play it back.

use village_core::battle::{BattleController, BattlePhase, BattleReplayData, ReplayPlayer};
use village_core::data::TroopKind;
use village_core::map_generation::{BattleMapGenerator, Difficulty};
use village_core::store::{Resources, VillageStore};
use village_test_utils::fixtures::test_data;
use village_test_utils::init_test_tracing;

const SEED: u64 = 0x5EED_0F_C1A5;

fn record() -> BattleReplayData {
    let data = test_data();
    let mut store = VillageStore::new(data.clone());
    let map = BattleMapGenerator::new(data)
        .generate_into(&mut store, Difficulty::Hard, SEED)
        .unwrap();
    store.add_troop(TroopKind::WallBreaker, 2);
    store.add_troop(TroopKind::Giant, 4);
    store.add_troop(TroopKind::Archer, 10);

    let mut battle = BattleController::start(&mut store, map.battle_config()).unwrap();
    battle.set_map_seed(SEED);

    battle.deploy_troop(&mut store, TroopKind::WallBreaker, 0, 20).unwrap();
    battle.deploy_troop(&mut store, TroopKind::WallBreaker, 0, 24).unwrap();
    for tick in 0..4000u64 {
        if tick == 60 {
            for y in [19, 21, 23, 25] {
                battle.deploy_troop(&mut store, TroopKind::Giant, 0, y).unwrap();
            }
        }
        if tick == 200 {
            for x in 15..25 {
                battle.deploy_troop(&mut store, TroopKind::Archer, x, 43).unwrap();
            }
        }
        if battle.step(&mut store) == BattlePhase::Ended {
            break;
        }
    }
    let result = battle.finish_battle(&mut store);
    assert_eq!(result.stars, battle.stars());
    if result.stars > 0 {
        assert_eq!(result.bonus, map.win_bonus);
    }
    battle.replay_data(&store)
}

#[test]
fn replay_file_reproduces_the_battle() {
    init_test_tracing();
    let replay = record();
    assert_eq!(replay.map_seed, Some(SEED));
    assert_eq!(replay.deployments.len(), 16);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("raid.replay");
    replay.save(&path).unwrap();
    let loaded = BattleReplayData::load(&path).unwrap();
    assert_eq!(loaded, replay);

    let mut player = ReplayPlayer::new(test_data(), loaded).unwrap();
    assert!(player.verify());
    assert_eq!(player.controller().loot(), replay.loot);
}

#[test]
fn tampered_replay_fails_verification() {
    let mut replay = record();
    replay.deployments.retain(|d| d.kind != TroopKind::Giant);
    replay.loot = Resources::new(replay.loot.gold + 1, replay.loot.elixir);

    let mut player = ReplayPlayer::new(test_data(), replay).unwrap();
    assert!(!player.verify());
}
