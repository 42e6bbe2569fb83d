//! Battle recording and playback.
//!
//! A replay stores the battle map as it was when the battle started, the
//! attacker's army and research levels, and every deployment with the tick
//! it happened on. Because the battle loop is deterministic, feeding the
//! same deployments back through [`BattleController::step`] reproduces the
//! battle exactly; the recorded final state hash proves it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::{GameData, TroopKind};
use crate::error::{GameError, Result};
use crate::math::Fixed;
use crate::store::{BuildingInstance, Resources, VillageStore};

use super::controller::{BattleConfig, BattleController, BattlePhase};

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// One troop placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentEvent {
    /// Battle tick at which the troop was placed.
    pub tick: u64,
    /// Troop type.
    pub kind: TroopKind,
    /// Cell column.
    pub x: i32,
    /// Cell row.
    pub y: i32,
}

/// Complete replay of one battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReplayData {
    /// Replay format version.
    pub version: u32,
    /// Tunables the battle ran with.
    pub config: BattleConfig,
    /// Seed of the generated battle map, if it was generated.
    pub map_seed: Option<u64>,
    /// Battle map at the start of the battle.
    pub buildings: Vec<BuildingInstance>,
    /// Attacker's army at the start of the battle.
    pub army: BTreeMap<TroopKind, u32>,
    /// Attacker's troop research levels.
    pub troop_levels: BTreeMap<TroopKind, u32>,
    /// Deployments in the order they happened.
    pub deployments: Vec<DeploymentEvent>,
    /// Stars earned.
    pub stars: u8,
    /// Final destruction percentage as raw fixed-point bits.
    pub percent_bits: i64,
    /// Loot collected.
    pub loot: Resources,
    /// Ticks simulated while fighting.
    pub duration_ticks: u64,
    /// Battle state hash when the recording was finalised.
    pub final_hash: u64,
}

impl BattleReplayData {
    /// Final destruction percentage.
    #[must_use]
    pub fn percent(&self) -> Fixed {
        Fixed::from_bits(self.percent_bits)
    }

    /// Deployments made at one tick, in recorded order.
    pub fn deployments_at_tick(&self, tick: u64) -> impl Iterator<Item = &DeploymentEvent> {
        self.deployments.iter().filter(move |d| d.tick == tick)
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if encoding fails and
    /// [`GameError::Io`] if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    /// Load a replay from a file, rejecting other format versions.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Io`] if the file cannot be read and
    /// [`GameError::Serialization`] if it does not decode or has another
    /// version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| GameError::Serialization(format!("Failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::Serialization(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }

        Ok(replay)
    }
}

/// Collects what a replay needs while a battle runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleRecorder {
    config: BattleConfig,
    map_seed: Option<u64>,
    buildings: Vec<BuildingInstance>,
    army: BTreeMap<TroopKind, u32>,
    troop_levels: BTreeMap<TroopKind, u32>,
    deployments: Vec<DeploymentEvent>,
}

impl BattleRecorder {
    /// Snapshot the battle map and the attacker's army.
    #[must_use]
    pub fn new(store: &VillageStore, config: BattleConfig) -> Self {
        let army: BTreeMap<TroopKind, u32> = store.army().collect();
        let troop_levels = TroopKind::ALL
            .iter()
            .map(|&kind| (kind, store.troop_level(kind)))
            .collect();
        Self {
            config,
            map_seed: None,
            buildings: store.buildings().cloned().collect(),
            army,
            troop_levels,
            deployments: Vec::new(),
        }
    }

    /// Remember the seed the battle map came from.
    pub fn set_map_seed(&mut self, seed: u64) {
        self.map_seed = Some(seed);
    }

    /// Append a deployment.
    pub fn record_deployment(&mut self, tick: u64, kind: TroopKind, x: i32, y: i32) {
        self.deployments.push(DeploymentEvent { tick, kind, x, y });
    }

    /// Deployments so far.
    #[must_use]
    pub fn deployments(&self) -> &[DeploymentEvent] {
        &self.deployments
    }

    /// Produce the replay with the given outcome.
    #[must_use]
    pub fn finish(
        &self,
        stars: u8,
        percent: Fixed,
        loot: Resources,
        duration_ticks: u64,
        final_hash: u64,
    ) -> BattleReplayData {
        BattleReplayData {
            version: REPLAY_VERSION,
            config: self.config,
            map_seed: self.map_seed,
            buildings: self.buildings.clone(),
            army: self.army.clone(),
            troop_levels: self.troop_levels.clone(),
            deployments: self.deployments.clone(),
            stars,
            percent_bits: percent.to_bits(),
            loot,
            duration_ticks,
            final_hash,
        }
    }
}

/// Re-simulates a recorded battle on a fresh store.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: BattleReplayData,
    store: VillageStore,
    controller: BattleController,
    deployment_index: usize,
}

impl ReplayPlayer {
    /// Set up a store with the recorded map and army, ready to play.
    ///
    /// # Errors
    ///
    /// Propagates errors from starting the battle.
    pub fn new(data: Arc<GameData>, replay: BattleReplayData) -> Result<Self> {
        let mut store = VillageStore::new(data);
        // Nothing drains a replay's events.
        store.events_mut().set_queueing(false);
        store.set_in_battle_mode(true);
        store.load_battle_map(replay.buildings.iter().cloned());
        for (&kind, &count) in &replay.army {
            store.add_troop(kind, count);
        }
        for (&kind, &level) in &replay.troop_levels {
            store.set_troop_level(kind, level);
        }
        let mut controller = BattleController::start(&mut store, replay.config)?;
        if let Some(seed) = replay.map_seed {
            controller.set_map_seed(seed);
        }
        Ok(Self {
            replay,
            store,
            controller,
            deployment_index: 0,
        })
    }

    /// Apply this tick's deployments and advance one step.
    ///
    /// Returns `true` while there is more to play. The battle is ended
    /// once the recorded duration is reached, matching a recording that
    /// was finished early.
    pub fn advance(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }

        let tick = self.controller.tick_count();
        while let Some(deployment) = self.replay.deployments.get(self.deployment_index) {
            if deployment.tick > tick {
                break;
            }
            if let Err(error) =
                self.controller
                    .deploy_troop(&mut self.store, deployment.kind, deployment.x, deployment.y)
            {
                tracing::warn!(%error, tick, "Recorded deployment failed on replay");
            }
            self.deployment_index += 1;
        }

        if self.controller.phase() == BattlePhase::Fighting {
            self.controller.step(&mut self.store);
        }
        if self.controller.phase() != BattlePhase::Ended
            && (self.controller.phase() == BattlePhase::Ready
                || self.controller.tick_count() >= self.replay.duration_ticks)
        {
            self.controller.end_battle(&mut self.store, "replay complete");
        }

        !self.is_finished()
    }

    /// Play to the end.
    pub fn run_to_end(&mut self) {
        while self.advance() {}
    }

    /// Play to the end and check the outcome against the recording.
    pub fn verify(&mut self) -> bool {
        self.run_to_end();
        let matches = self.controller.state_hash(&self.store) == self.replay.final_hash
            && self.controller.stars() == self.replay.stars
            && self.controller.destruction_percent() == self.replay.percent()
            && self.controller.loot() == self.replay.loot;
        if !matches {
            tracing::warn!(
                ticks = self.controller.tick_count(),
                expected_ticks = self.replay.duration_ticks,
                "Replay diverged from recording"
            );
        }
        matches
    }

    /// Whether the replayed battle has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.controller.phase() == BattlePhase::Ended
    }

    /// The replay being played.
    #[must_use]
    pub const fn replay(&self) -> &BattleReplayData {
        &self.replay
    }

    /// The replayed battle.
    #[must_use]
    pub const fn controller(&self) -> &BattleController {
        &self.controller
    }

    /// The store the replay runs on.
    #[must_use]
    pub const fn store(&self) -> &VillageStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BuildingKind;
    use crate::store::BuildingState;

    fn recorded_battle() -> (Arc<GameData>, BattleReplayData) {
        let data = Arc::new(GameData::default());
        let mut store = VillageStore::new(Arc::clone(&data));
        store.set_in_battle_mode(true);
        for (kind, x, y) in [
            (BuildingKind::TownHall, 20, 20),
            (BuildingKind::Cannon, 14, 20),
            (BuildingKind::GoldStorage, 26, 20),
            (BuildingKind::Bomb, 18, 18),
        ] {
            store
                .add_building(kind, 1, x, y, BuildingState::Built, 0, false)
                .unwrap();
        }
        store.add_troop(TroopKind::Barbarian, 6);
        store.add_troop(TroopKind::Archer, 4);

        let mut battle = BattleController::start(&mut store, BattleConfig::default()).unwrap();
        battle.deploy_troop(&mut store, TroopKind::Barbarian, 5, 20).unwrap();
        battle.deploy_troop(&mut store, TroopKind::Barbarian, 5, 22).unwrap();
        for tick in 0..600 {
            if tick == 40 {
                for y in [18, 19, 20, 21] {
                    battle.deploy_troop(&mut store, TroopKind::Archer, 4, y).unwrap();
                }
            }
            if tick == 90 {
                for x in [30, 31, 32, 33] {
                    battle.deploy_troop(&mut store, TroopKind::Barbarian, x, 36).unwrap();
                }
            }
            if battle.step(&mut store) == BattlePhase::Ended {
                break;
            }
        }
        battle.finish_battle(&mut store);
        (data, battle.replay_data(&store))
    }

    #[test]
    fn test_replay_reproduces_battle() {
        let (data, replay) = recorded_battle();
        assert_eq!(replay.deployments.len(), 10);
        assert_eq!(replay.deployments_at_tick(40).count(), 4);

        let mut player = ReplayPlayer::new(data, replay.clone()).unwrap();
        assert!(player.verify());
        assert_eq!(player.controller().tick_count(), replay.duration_ticks);
        assert_eq!(player.controller().stars(), replay.stars);
        assert!(player.store().events().pending().is_empty());
    }

    #[test]
    fn test_replay_save_load() {
        let (_, replay) = recorded_battle();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("battle.replay");

        replay.save(&path).unwrap();
        let loaded = BattleReplayData::load(&path).unwrap();
        assert_eq!(loaded, replay);
    }

    #[test]
    fn test_load_rejects_other_versions() {
        let (_, mut replay) = recorded_battle();
        replay.version = REPLAY_VERSION + 1;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.replay");
        replay.save(&path).unwrap();

        assert!(matches!(
            BattleReplayData::load(&path),
            Err(GameError::Serialization(_))
        ));
        assert!(matches!(
            BattleReplayData::load(dir.path().join("missing.replay")),
            Err(GameError::Io(_))
        ));
    }
}
