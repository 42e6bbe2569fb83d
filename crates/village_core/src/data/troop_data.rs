//! Troop data structures for data-driven troop definitions.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_decimal_serde, Fixed};

/// Every troop type the attacker can deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TroopKind {
    /// Melee, attacks the nearest building.
    Barbarian,
    /// Ranged, attacks the nearest building.
    Archer,
    /// Slow tank that goes for defenses.
    Giant,
    /// Fast raider that goes for resources.
    Goblin,
    /// Suicide bomber that breaches walls.
    WallBreaker,
}

impl TroopKind {
    /// All kinds in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Barbarian,
        Self::Archer,
        Self::Giant,
        Self::Goblin,
        Self::WallBreaker,
    ];
}

/// Which buildings a troop prefers to attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetPreference {
    /// Nearest building of any category.
    Any,
    /// Nearest resource building, falling back to any.
    Resources,
    /// Nearest defense, falling back to any.
    Defenses,
    /// Walls in the way of the eventual target.
    Walls,
}

/// Stats of one troop level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroopLevel {
    /// Maximum health points.
    pub hit_points: i32,

    /// Damage per second against buildings.
    #[serde(with = "fixed_decimal_serde")]
    pub damage_per_second: Fixed,
}

/// Data-driven troop definition.
///
/// # Example RON
///
/// ```ron
/// TroopData(
///     kind: Barbarian,
///     name: "Barbarian",
///     attack_range: 0.5,
///     speed: 96.0,
///     housing_space: 1,
///     training_cost: 25,
///     preference: Any,
///     levels: [(hit_points: 45, damage_per_second: 8.0)],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroopData {
    /// Troop type this entry describes.
    pub kind: TroopKind,

    /// Display name.
    pub name: String,

    /// Attack range in cells, measured to the target footprint edge.
    #[serde(with = "fixed_decimal_serde")]
    pub attack_range: Fixed,

    /// Movement speed in pixels per second.
    #[serde(with = "fixed_decimal_serde")]
    pub speed: Fixed,

    /// Army camp space taken by one troop.
    pub housing_space: u32,

    /// Elixir cost to train one troop.
    pub training_cost: u64,

    /// Target selection rule.
    pub preference: TargetPreference,

    /// Damage multiplier applied when hitting walls.
    #[serde(default = "default_multiplier", with = "fixed_decimal_serde")]
    pub wall_damage_multiplier: Fixed,

    /// Whether the troop dies after its first hit.
    #[serde(default)]
    pub suicide: bool,

    /// Per-level stats; index 0 is level 1.
    pub levels: Vec<TroopLevel>,
}

fn default_multiplier() -> Fixed {
    Fixed::ONE
}

impl TroopData {
    /// Stats for a 1-based level, clamped to the highest defined level.
    #[must_use]
    pub fn level(&self, level: u32) -> Option<&TroopLevel> {
        if self.levels.is_empty() {
            return None;
        }
        let index = (level.max(1) as usize - 1).min(self.levels.len() - 1);
        self.levels.get(index)
    }

    pub(crate) fn validate(&self, errors: &mut Vec<String>) {
        if self.levels.is_empty() {
            errors.push(format!("Troop {:?} has no levels", self.kind));
        }
        if self.speed <= Fixed::ZERO {
            errors.push(format!("Troop {:?} cannot move", self.kind));
        }
        if self.housing_space == 0 {
            errors.push(format!("Troop {:?} takes no housing space", self.kind));
        }
    }
}

pub(crate) fn default_troops() -> Vec<TroopData> {
    let troop = |kind, name: &str, range: f64, speed: i32, housing, cost, preference| TroopData {
        kind,
        name: name.to_string(),
        attack_range: Fixed::from_num(range),
        speed: Fixed::from_num(speed),
        housing_space: housing,
        training_cost: cost,
        preference,
        wall_damage_multiplier: Fixed::ONE,
        suicide: false,
        levels: Vec::new(),
    };
    let levels = |stats: &[(i32, i32)]| -> Vec<TroopLevel> {
        stats
            .iter()
            .map(|&(hit_points, dps)| TroopLevel {
                hit_points,
                damage_per_second: Fixed::from_num(dps),
            })
            .collect()
    };

    vec![
        TroopData {
            levels: levels(&[(45, 8), (54, 11), (65, 14)]),
            ..troop(
                TroopKind::Barbarian,
                "Barbarian",
                0.5,
                96,
                1,
                25,
                TargetPreference::Any,
            )
        },
        TroopData {
            levels: levels(&[(20, 7), (23, 9), (28, 12)]),
            ..troop(
                TroopKind::Archer,
                "Archer",
                3.5,
                96,
                1,
                50,
                TargetPreference::Any,
            )
        },
        TroopData {
            levels: levels(&[(300, 11), (360, 14), (430, 19)]),
            ..troop(
                TroopKind::Giant,
                "Giant",
                1.0,
                64,
                5,
                250,
                TargetPreference::Defenses,
            )
        },
        TroopData {
            levels: levels(&[(25, 11), (30, 14), (36, 19)]),
            ..troop(
                TroopKind::Goblin,
                "Goblin",
                0.5,
                128,
                1,
                25,
                TargetPreference::Resources,
            )
        },
        TroopData {
            levels: levels(&[(20, 8), (24, 12), (29, 16)]),
            wall_damage_multiplier: Fixed::from_num(40),
            suicide: true,
            ..troop(
                TroopKind::WallBreaker,
                "Wall Breaker",
                1.0,
                128,
                2,
                1000,
                TargetPreference::Walls,
            )
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_defaults() {
        let troops = default_troops();
        for kind in TroopKind::ALL {
            assert!(troops.iter().any(|t| t.kind == kind), "missing {kind:?}");
        }
    }

    #[test]
    fn test_level_clamps_to_defined_levels() {
        let troops = default_troops();
        let giant = troops.iter().find(|t| t.kind == TroopKind::Giant).unwrap();
        assert_eq!(giant.level(0).unwrap().hit_points, 300);
        assert_eq!(giant.level(2).unwrap().hit_points, 360);
        assert_eq!(giant.level(99).unwrap().hit_points, 430);
    }

    #[test]
    fn test_wall_breaker_is_suicidal() {
        let troops = default_troops();
        let breaker = troops
            .iter()
            .find(|t| t.kind == TroopKind::WallBreaker)
            .unwrap();
        assert!(breaker.suicide);
        assert_eq!(breaker.preference, TargetPreference::Walls);
        assert_eq!(breaker.wall_damage_multiplier, Fixed::from_num(40));
    }
}
