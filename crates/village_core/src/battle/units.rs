//! Deployed attacker units and their state machine.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::data::TroopKind;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::occupancy::BuildingId;

/// Unique id of a deployed unit within one battle.
pub type UnitId = u32;

/// Per-unit AI state, advanced once per tick.
///
/// ```text
/// SeekingTarget -> Moving -> Attacking -> SeekingTarget
///       |             |          |
///       v             v          v
///     Idle          Dying      Dying
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitState {
    /// Needs a target; one is chosen this tick.
    SeekingTarget,
    /// Walking its path toward the target.
    Moving,
    /// In range and hitting the target.
    Attacking,
    /// No reachable target; retries after a delay.
    Idle {
        /// Seconds until the next target search.
        #[serde(with = "fixed_serde")]
        retry_in: Fixed,
    },
    /// Dead; removed at the end of the tick.
    Dying,
}

/// One deployed troop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Battle-unique id.
    pub id: UnitId,
    /// Troop type.
    pub kind: TroopKind,
    /// Research level used for stats.
    pub level: u32,
    /// World position in pixels.
    pub position: Vec2Fixed,
    /// Remaining hit points.
    pub hp: i32,
    /// Hit points at deployment.
    pub max_hp: i32,
    /// AI state.
    pub state: UnitState,
    /// Building being approached or attacked.
    pub target: Option<BuildingId>,
    /// Remaining waypoints, nearest first.
    pub path: VecDeque<Vec2Fixed>,
    /// Fractional damage not yet applied to the target.
    pub accumulated_damage: Fixed,
}

impl Unit {
    /// Create a fresh unit seeking its first target.
    #[must_use]
    pub fn new(id: UnitId, kind: TroopKind, level: u32, position: Vec2Fixed, hp: i32) -> Self {
        Self {
            id,
            kind,
            level,
            position,
            hp,
            max_hp: hp,
            state: UnitState::SeekingTarget,
            target: None,
            path: VecDeque::new(),
            accumulated_damage: Fixed::ZERO,
        }
    }

    /// Whether the unit still takes part in combat.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state != UnitState::Dying && self.hp > 0
    }

    /// Apply whole-point damage. Returns `true` if this killed the unit.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.hp = (self.hp - amount).max(0);
        if self.hp == 0 {
            self.state = UnitState::Dying;
            self.path.clear();
            return true;
        }
        false
    }

    /// Drop the current target and search again next step.
    pub fn retarget(&mut self) {
        self.target = None;
        self.path.clear();
        self.accumulated_damage = Fixed::ZERO;
        if self.is_alive() {
            self.state = UnitState::SeekingTarget;
        }
    }

    /// Walk along the path by at most `step` pixels, consuming reached
    /// waypoints. Returns `true` when the path is exhausted.
    pub fn advance_along_path(&mut self, step: Fixed) -> bool {
        let mut budget = step;
        while let Some(&next) = self.path.front() {
            let distance = self.position.distance(next);
            if distance <= budget {
                self.position = next;
                budget -= distance;
                self.path.pop_front();
            } else {
                let (position, _) = self.position.move_towards(next, budget);
                self.position = position;
                return false;
            }
        }
        true
    }
}

/// Accumulate `rate × dt` into a fractional carry and split off the whole
/// points. Returns the whole damage to apply now.
pub fn accumulate_damage(carry: &mut Fixed, rate: Fixed, dt: Fixed) -> i32 {
    let total = *carry + rate * dt;
    let whole = total.floor();
    *carry = total - whole;
    whole.to_num::<i32>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulated_damage_carries_fractions() {
        let mut carry = Fixed::ZERO;
        let rate = Fixed::from_num(3);
        let dt = Fixed::from_num(0.25);

        // 0.75, 1.5, 2.25, 3.0 accumulated; whole points split off as they appear.
        let applied: Vec<i32> = (0..4).map(|_| accumulate_damage(&mut carry, rate, dt)).collect();
        assert_eq!(applied, vec![0, 1, 1, 1]);
        assert_eq!(carry, Fixed::ZERO);
    }

    #[test]
    fn test_take_damage_kills_once() {
        let mut unit = Unit::new(1, TroopKind::Barbarian, 1, Vec2Fixed::ZERO, 10);
        assert!(!unit.take_damage(4));
        assert!(unit.take_damage(10));
        assert_eq!(unit.state, UnitState::Dying);
        assert!(!unit.take_damage(10));
        assert_eq!(unit.hp, 0);
    }

    #[test]
    fn test_advance_along_path() {
        let mut unit = Unit::new(1, TroopKind::Barbarian, 1, Vec2Fixed::ZERO, 10);
        unit.path = VecDeque::from(vec![Vec2Fixed::from_ints(8, 0), Vec2Fixed::from_ints(8, 8)]);

        assert!(!unit.advance_along_path(Fixed::from_num(12)));
        assert_eq!(unit.position, Vec2Fixed::from_ints(8, 4));
        assert_eq!(unit.path.len(), 1);

        assert!(unit.advance_along_path(Fixed::from_num(12)));
        assert_eq!(unit.position, Vec2Fixed::from_ints(8, 8));
    }
}
