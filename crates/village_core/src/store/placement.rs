//! Drag-and-drop moves of existing buildings.
//!
//! A move is a small session: [`start_moving`](VillageStore::start_moving)
//! remembers the original anchor, [`update_preview_position`](VillageStore::update_preview_position)
//! validates candidate anchors while the player drags, and
//! [`complete_move`](VillageStore::complete_move) either commits the last
//! valid preview or snaps the building back.

use super::VillageStore;
use crate::events::GameEvent;
use crate::grid::GridPos;
use crate::occupancy::BuildingId;

/// State of an in-progress drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveSession {
    /// Building being dragged.
    pub id: BuildingId,
    /// Anchor before the drag started.
    pub original: GridPos,
    /// Last previewed anchor.
    pub preview: GridPos,
    /// Whether the preview anchor is a legal placement.
    pub valid: bool,
}

impl VillageStore {
    /// The drag in progress, if any.
    #[must_use]
    pub const fn move_session(&self) -> Option<&MoveSession> {
        self.moving.as_ref()
    }

    /// Begin dragging a building. Fails if it does not exist, is destroyed,
    /// or another drag is running.
    pub fn start_moving(&mut self, id: BuildingId) -> bool {
        if self.moving.is_some() {
            return false;
        }
        let Some(building) = self.get_building(id) else {
            tracing::warn!(id, "Cannot move: building not found");
            return false;
        };
        if building.is_destroyed {
            return false;
        }
        let original = building.position();
        self.moving = Some(MoveSession {
            id,
            original,
            preview: original,
            valid: true,
        });
        true
    }

    /// Preview a new anchor for the dragged building. Returns whether the
    /// footprint would fit there, ignoring the building's own cells.
    pub fn update_preview_position(&mut self, x: i32, y: i32) -> bool {
        let Some(session) = self.moving else {
            return false;
        };
        let valid = self
            .get_building(session.id)
            .is_some_and(|b| self.can_place(b.kind, x, y, Some(session.id)));
        self.moving = Some(MoveSession {
            preview: GridPos::new(x, y),
            valid,
            ..session
        });
        valid
    }

    /// End the drag. A valid preview is committed and `true` returned;
    /// otherwise the building keeps its original anchor.
    pub fn complete_move(&mut self) -> bool {
        let Some(session) = self.moving.take() else {
            return false;
        };
        if !session.valid || session.preview == session.original {
            return false;
        }
        let Some(building) = self.get_building_mut(session.id) else {
            return false;
        };
        building.grid_x = session.preview.x;
        building.grid_y = session.preview.y;

        self.update_occupancy();
        self.emit(GameEvent::BuildingMoved {
            id: session.id,
            x: session.preview.x,
            y: session.preview.y,
        });
        true
    }

    /// Abandon the drag; the building stays where it was.
    pub fn cancel_move(&mut self) {
        self.moving = None;
    }
}
