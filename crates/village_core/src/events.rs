//! Typed notifications from the simulation to the presentation layer.
//!
//! The store owns one [`EventBus`]. Events are delivered two ways: any
//! subscribed listener is called synchronously when the event is emitted,
//! and every event is also queued until a caller drains the queue. A
//! battle session that subscribes must unsubscribe when it ends; the bus
//! holds no other references to callers.

use std::fmt;

use crate::battle::{StarReason, UnitId};
use crate::data::{BuildingKind, ResourceKind, TroopKind};
use crate::math::Fixed;
use crate::occupancy::BuildingId;
use crate::store::{BuildingInstance, Resources};

/// Something presentation code may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// A ledger balance changed.
    ResourceChanged {
        /// Which currency.
        resource: ResourceKind,
        /// New balance.
        balance: u64,
    },
    /// A building was added in the `Placing` state.
    BuildingPlaced {
        /// New building.
        id: BuildingId,
        /// Its type.
        kind: BuildingKind,
    },
    /// A building entered `Constructing`.
    ConstructionStarted {
        /// Building under construction.
        id: BuildingId,
        /// Epoch second the timer elapses.
        finish_time: u64,
    },
    /// A building reached `Built` after construction or upgrade.
    ConstructionFinished {
        /// Finished building.
        id: BuildingId,
        /// Level now reached.
        level: u32,
    },
    /// A drag-and-drop move was committed.
    BuildingMoved {
        /// Moved building.
        id: BuildingId,
        /// New anchor column.
        x: i32,
        /// New anchor row.
        y: i32,
    },
    /// A building was removed from the active data set.
    BuildingRemoved {
        /// Removed building.
        id: BuildingId,
    },
    /// A building's hit points reached zero in battle.
    BuildingDestroyed {
        /// State of the building at the moment it was destroyed.
        building: BuildingInstance,
    },
    /// A troop was placed on the battlefield.
    UnitDeployed {
        /// New unit.
        unit: UnitId,
        /// Troop type.
        kind: TroopKind,
    },
    /// A unit chose a building to attack.
    UnitTargetLocked {
        /// Attacking unit.
        unit: UnitId,
        /// Chosen building.
        building: BuildingId,
    },
    /// A unit died or self-destructed.
    UnitKilled {
        /// Dead unit.
        unit: UnitId,
        /// Troop type.
        kind: TroopKind,
    },
    /// A trap detected a unit and started its countdown.
    TrapTriggered {
        /// Triggered trap.
        trap: BuildingId,
    },
    /// A trap exploded and was consumed.
    TrapExploded {
        /// Exploded trap.
        trap: BuildingId,
        /// Number of units caught in the blast.
        units_hit: u32,
    },
    /// Destruction percentage changed.
    DestructionProgress {
        /// Destroyed share of building HP, 0 to 100.
        percent: Fixed,
    },
    /// A star was earned.
    StarAwarded {
        /// Star count after this award (1 to 3).
        star: u8,
        /// Why the star was awarded.
        reason: StarReason,
    },
    /// The battle finished.
    BattleEnded {
        /// Stars earned.
        stars: u8,
        /// Final destruction percentage.
        percent: Fixed,
        /// Resources looted.
        loot: Resources,
    },
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u32);

type Listener = Box<dyn FnMut(&GameEvent)>;

/// Event queue plus synchronous listeners.
///
/// Queued events accumulate until [`drain`](Self::drain) is called. Callers
/// that only listen should turn queueing off with
/// [`set_queueing`](Self::set_queueing).
pub struct EventBus {
    queue: Vec<GameEvent>,
    queueing: bool,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u32,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            queue: Vec::new(),
            queueing: true,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("queued", &self.queue.len())
            .field("queueing", &self.queueing)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every listener, then queue it if queueing is on.
    pub fn emit(&mut self, event: GameEvent) {
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
        if self.queueing {
            self.queue.push(event);
        }
    }

    /// Turn the queue on or off. Turning it off drops anything pending.
    pub fn set_queueing(&mut self, enabled: bool) {
        self.queueing = enabled;
        if !enabled {
            self.queue.clear();
        }
    }

    /// Register a listener called for every subsequent event.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    /// Take every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.queue)
    }

    /// Queued events, oldest first.
    #[must_use]
    pub fn pending(&self) -> &[GameEvent] {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn changed(balance: u64) -> GameEvent {
        GameEvent::ResourceChanged {
            resource: ResourceKind::Gold,
            balance,
        }
    }

    #[test]
    fn test_queue_and_drain() {
        let mut bus = EventBus::new();
        bus.emit(changed(1));
        bus.emit(changed(2));

        assert_eq!(bus.pending().len(), 2);
        assert_eq!(bus.drain(), vec![changed(1), changed(2)]);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_listener_lifetime() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        let sink = Rc::clone(&seen);
        let id = bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        bus.emit(changed(5));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(changed(6));

        assert_eq!(*seen.borrow(), vec![changed(5)]);
        assert_eq!(bus.drain().len(), 2);
    }

    #[test]
    fn test_listeners_only_keeps_queue_empty() {
        let seen = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        bus.emit(changed(1));
        bus.set_queueing(false);
        assert!(bus.pending().is_empty());

        let sink = Rc::clone(&seen);
        bus.subscribe(move |_| *sink.borrow_mut() += 1);
        for balance in 0..100 {
            bus.emit(changed(balance));
        }

        assert_eq!(*seen.borrow(), 100);
        assert!(bus.drain().is_empty());
    }
}
