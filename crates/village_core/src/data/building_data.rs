//! Building data structures for data-driven building definitions.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_decimal_serde, Fixed};

/// Every building type the village can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    /// The village centre; destroying it awards a star.
    TownHall,
    /// Produces gold over time.
    GoldMine,
    /// Produces elixir over time.
    ElixirCollector,
    /// Stores gold.
    GoldStorage,
    /// Stores elixir.
    ElixirStorage,
    /// Houses trained troops; its level sets army capacity.
    ArmyCamp,
    /// Trains troops.
    Barracks,
    /// Provides a builder.
    BuilderHut,
    /// Single-target ground defense.
    Cannon,
    /// Long-range single-target defense.
    ArcherTower,
    /// Long-range splash defense.
    Mortar,
    /// One-cell wall segment.
    Wall,
    /// Small area-damage trap.
    Bomb,
    /// Large area-damage trap.
    GiantBomb,
}

impl BuildingKind {
    /// All kinds in declaration order.
    pub const ALL: [Self; 14] = [
        Self::TownHall,
        Self::GoldMine,
        Self::ElixirCollector,
        Self::GoldStorage,
        Self::ElixirStorage,
        Self::ArmyCamp,
        Self::Barracks,
        Self::BuilderHut,
        Self::Cannon,
        Self::ArcherTower,
        Self::Mortar,
        Self::Wall,
        Self::Bomb,
        Self::GiantBomb,
    ];
}

/// Coarse grouping used by target selection and scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingCategory {
    /// The town hall.
    TownHall,
    /// Mines, collectors and storages.
    Resource,
    /// Buildings that shoot at troops.
    Defense,
    /// Wall segments.
    Wall,
    /// Hidden traps.
    Trap,
    /// Army camps and barracks.
    Army,
    /// Anything else.
    Other,
}

impl BuildingCategory {
    /// Whether buildings of this category count toward destruction percentage.
    #[must_use]
    pub const fn counts_for_destruction(self) -> bool {
        !matches!(self, Self::Wall | Self::Trap)
    }
}

/// Currencies of the resource ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Gold.
    Gold,
    /// Elixir.
    Elixir,
    /// Gems (premium currency).
    Gem,
}

/// Stats of one building level.
///
/// # Example RON
///
/// ```ron
/// (
///     hit_points: 420,
///     damage_per_second: 9.0,
///     attack_range: 9.0,
///     build_cost: 250,
///     build_time: 60,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildingLevel {
    /// Maximum health points.
    pub hit_points: i32,

    /// Damage per second dealt by defenses.
    #[serde(default, with = "fixed_decimal_serde")]
    pub damage_per_second: Fixed,

    /// Attack range in cells, measured from the footprint edge.
    #[serde(default, with = "fixed_decimal_serde")]
    pub attack_range: Fixed,

    /// Radius of area damage in cells (defenses and traps).
    #[serde(default, with = "fixed_decimal_serde")]
    pub splash_radius: Fixed,

    /// Trap trigger radius in cells.
    #[serde(default, with = "fixed_decimal_serde")]
    pub trigger_radius: Fixed,

    /// Delay in seconds between a trap triggering and exploding.
    #[serde(default, with = "fixed_decimal_serde")]
    pub trigger_delay: Fixed,

    /// Damage dealt once by an exploding trap.
    #[serde(default)]
    pub trap_damage: i32,

    /// Cost to build (level 1) or upgrade to this level.
    #[serde(default)]
    pub build_cost: u64,

    /// Construction time in seconds; zero means the building is instant.
    #[serde(default)]
    pub build_time: u64,

    /// Resource capacity for storages and collectors, housing space for army camps.
    #[serde(default)]
    pub capacity: u64,

    /// Resource production per hour for mines and collectors.
    #[serde(default)]
    pub production_rate: u64,
}

/// Data-driven building definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingData {
    /// Building type this entry describes.
    pub kind: BuildingKind,

    /// Display name.
    pub name: String,

    /// Coarse category.
    pub category: BuildingCategory,

    /// Footprint width in cells.
    pub width: i32,

    /// Footprint height in cells.
    pub height: i32,

    /// Currency spent to build and upgrade.
    pub build_resource: ResourceKind,

    /// Currency held by this building if it is a storage.
    #[serde(default)]
    pub stores: Option<ResourceKind>,

    /// Currency produced by this building if it is a mine or collector.
    #[serde(default)]
    pub produces: Option<ResourceKind>,

    /// Per-level stats; index 0 is level 1.
    pub levels: Vec<BuildingLevel>,
}

impl BuildingData {
    /// Highest level this building can reach.
    #[must_use]
    pub fn max_level(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Stats for a 1-based level.
    #[must_use]
    pub fn level(&self, level: u32) -> Option<&BuildingLevel> {
        if level == 0 {
            return None;
        }
        self.levels.get(level as usize - 1)
    }

    /// Whether this is a storage building.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        self.stores.is_some()
    }

    /// Whether this building shoots at troops.
    #[must_use]
    pub fn is_defense(&self) -> bool {
        self.category == BuildingCategory::Defense
    }

    /// Whether troops can walk over this building's cells.
    #[must_use]
    pub fn is_passable(&self) -> bool {
        self.category == BuildingCategory::Trap
    }

    pub(crate) fn validate(&self, errors: &mut Vec<String>) {
        if self.width <= 0 || self.height <= 0 {
            errors.push(format!("Building {:?} has an empty footprint", self.kind));
        }
        if self.levels.is_empty() {
            errors.push(format!("Building {:?} has no levels", self.kind));
        }
        for (index, level) in self.levels.iter().enumerate() {
            if level.hit_points <= 0 {
                errors.push(format!(
                    "Building {:?} level {} has no hit points",
                    self.kind,
                    index + 1
                ));
            }
            if self.category == BuildingCategory::Defense && level.damage_per_second <= Fixed::ZERO {
                errors.push(format!(
                    "Defense {:?} level {} deals no damage",
                    self.kind,
                    index + 1
                ));
            }
            if self.category == BuildingCategory::Trap && level.trigger_radius <= Fixed::ZERO {
                errors.push(format!(
                    "Trap {:?} level {} has no trigger radius",
                    self.kind,
                    index + 1
                ));
            }
        }
    }
}

fn level(hit_points: i32, build_cost: u64, build_time: u64) -> BuildingLevel {
    BuildingLevel {
        hit_points,
        build_cost,
        build_time,
        ..BuildingLevel::default()
    }
}

fn defense_level(
    hit_points: i32,
    dps: i32,
    range: i32,
    build_cost: u64,
    build_time: u64,
) -> BuildingLevel {
    BuildingLevel {
        damage_per_second: Fixed::from_num(dps),
        attack_range: Fixed::from_num(range),
        ..level(hit_points, build_cost, build_time)
    }
}

fn storage_level(hit_points: i32, capacity: u64, build_cost: u64, build_time: u64) -> BuildingLevel {
    BuildingLevel {
        capacity,
        ..level(hit_points, build_cost, build_time)
    }
}

fn collector_level(
    hit_points: i32,
    rate: u64,
    capacity: u64,
    build_cost: u64,
    build_time: u64,
) -> BuildingLevel {
    BuildingLevel {
        production_rate: rate,
        capacity,
        ..level(hit_points, build_cost, build_time)
    }
}

fn trap_level(damage: i32, trigger: Fixed, splash: Fixed, build_cost: u64) -> BuildingLevel {
    BuildingLevel {
        trap_damage: damage,
        trigger_radius: trigger,
        splash_radius: splash,
        trigger_delay: Fixed::from_num(0.5),
        ..level(1, build_cost, 0)
    }
}

#[allow(clippy::too_many_lines)]
pub(crate) fn default_buildings() -> Vec<BuildingData> {
    use BuildingCategory as C;
    use BuildingKind as K;
    use ResourceKind as R;

    let entry = |kind, name: &str, category, size, build_resource, levels| BuildingData {
        kind,
        name: name.to_string(),
        category,
        width: size,
        height: size,
        build_resource,
        stores: None,
        produces: None,
        levels,
    };

    vec![
        entry(
            K::TownHall,
            "Town Hall",
            C::TownHall,
            4,
            R::Gold,
            vec![
                storage_level(1500, 1000, 0, 0),
                storage_level(1600, 2500, 1000, 300),
                storage_level(1850, 10_000, 4000, 3600),
            ],
        ),
        BuildingData {
            produces: Some(R::Gold),
            ..entry(
                K::GoldMine,
                "Gold Mine",
                C::Resource,
                3,
                R::Elixir,
                vec![
                    collector_level(400, 200, 1000, 150, 10),
                    collector_level(440, 400, 2000, 300, 60),
                    collector_level(480, 600, 3000, 700, 240),
                ],
            )
        },
        BuildingData {
            produces: Some(R::Elixir),
            ..entry(
                K::ElixirCollector,
                "Elixir Collector",
                C::Resource,
                3,
                R::Gold,
                vec![
                    collector_level(400, 200, 1000, 150, 10),
                    collector_level(440, 400, 2000, 300, 60),
                    collector_level(480, 600, 3000, 700, 240),
                ],
            )
        },
        BuildingData {
            stores: Some(R::Gold),
            ..entry(
                K::GoldStorage,
                "Gold Storage",
                C::Resource,
                3,
                R::Elixir,
                vec![
                    storage_level(400, 1500, 300, 10),
                    storage_level(600, 3000, 750, 1800),
                    storage_level(800, 6000, 1500, 3600),
                ],
            )
        },
        BuildingData {
            stores: Some(R::Elixir),
            ..entry(
                K::ElixirStorage,
                "Elixir Storage",
                C::Resource,
                3,
                R::Gold,
                vec![
                    storage_level(400, 1500, 300, 10),
                    storage_level(600, 3000, 750, 1800),
                    storage_level(800, 6000, 1500, 3600),
                ],
            )
        },
        entry(
            K::ArmyCamp,
            "Army Camp",
            C::Army,
            4,
            R::Elixir,
            vec![
                storage_level(250, 20, 250, 300),
                storage_level(270, 30, 2500, 900),
                storage_level(290, 35, 10_000, 3600),
            ],
        ),
        entry(
            K::Barracks,
            "Barracks",
            C::Army,
            3,
            R::Elixir,
            vec![
                level(250, 100, 10),
                level(290, 500, 900),
                level(330, 2500, 3600),
            ],
        ),
        entry(
            K::BuilderHut,
            "Builder Hut",
            C::Other,
            2,
            R::Gem,
            vec![level(250, 0, 0)],
        ),
        entry(
            K::Cannon,
            "Cannon",
            C::Defense,
            3,
            R::Gold,
            vec![
                defense_level(420, 9, 9, 250, 60),
                defense_level(470, 11, 9, 1000, 900),
                defense_level(520, 15, 9, 4000, 3600),
            ],
        ),
        entry(
            K::ArcherTower,
            "Archer Tower",
            C::Defense,
            3,
            R::Gold,
            vec![
                defense_level(380, 11, 10, 1000, 900),
                defense_level(420, 15, 10, 2000, 1800),
                defense_level(460, 19, 10, 5000, 3600),
            ],
        ),
        entry(
            K::Mortar,
            "Mortar",
            C::Defense,
            3,
            R::Gold,
            vec![
                BuildingLevel {
                    splash_radius: Fixed::from_num(1.5),
                    ..defense_level(400, 4, 11, 5000, 3600)
                },
                BuildingLevel {
                    splash_radius: Fixed::from_num(1.5),
                    ..defense_level(450, 5, 11, 8000, 7200)
                },
                BuildingLevel {
                    splash_radius: Fixed::from_num(1.5),
                    ..defense_level(500, 6, 11, 12_000, 14_400)
                },
            ],
        ),
        entry(
            K::Wall,
            "Wall",
            C::Wall,
            1,
            R::Gold,
            vec![level(300, 50, 0), level(500, 1000, 0), level(700, 5000, 0)],
        ),
        entry(
            K::Bomb,
            "Bomb",
            C::Trap,
            1,
            R::Gold,
            vec![
                trap_level(20, Fixed::from_num(1.5), Fixed::from_num(3), 400),
                trap_level(24, Fixed::from_num(1.5), Fixed::from_num(3), 1000),
                trap_level(29, Fixed::from_num(1.5), Fixed::from_num(3), 10_000),
            ],
        ),
        entry(
            K::GiantBomb,
            "Giant Bomb",
            C::Trap,
            2,
            R::Gold,
            vec![
                trap_level(175, Fixed::from_num(2), Fixed::from_num(3), 12_500),
                trap_level(200, Fixed::from_num(2), Fixed::from_num(3), 75_000),
                trap_level(225, Fixed::from_num(2), Fixed::from_num(3.5), 150_000),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(kind: BuildingKind) -> BuildingData {
        default_buildings()
            .into_iter()
            .find(|b| b.kind == kind)
            .unwrap()
    }

    #[test]
    fn test_every_kind_has_defaults() {
        let buildings = default_buildings();
        for kind in BuildingKind::ALL {
            assert!(
                buildings.iter().any(|b| b.kind == kind),
                "missing default data for {kind:?}"
            );
        }
    }

    #[test]
    fn test_level_lookup_is_one_based() {
        let cannon = find(BuildingKind::Cannon);
        assert_eq!(cannon.max_level(), 3);
        assert!(cannon.level(0).is_none());
        assert_eq!(cannon.level(1).unwrap().hit_points, 420);
        assert!(cannon.level(4).is_none());
    }

    #[test]
    fn test_category_flags() {
        assert!(find(BuildingKind::GoldStorage).is_storage());
        assert!(!find(BuildingKind::GoldMine).is_storage());
        assert!(find(BuildingKind::Mortar).is_defense());
        assert!(find(BuildingKind::Bomb).is_passable());
        assert!(!find(BuildingKind::Wall).is_passable());
        assert!(!BuildingCategory::Wall.counts_for_destruction());
        assert!(BuildingCategory::TownHall.counts_for_destruction());
    }

    #[test]
    fn test_defaults_validate() {
        let mut errors = Vec::new();
        for building in default_buildings() {
            building.validate(&mut errors);
        }
        assert!(errors.is_empty(), "{errors:?}");
    }
}
