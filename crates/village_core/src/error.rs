//! Error types for the village simulation.
//!
//! Lookups that can legitimately miss (a building destroyed mid-frame, a
//! unit that already died) return `Option`/`bool` instead of an error.
//! [`GameError`] is for operations with several distinct failure reasons and
//! for data/IO problems.

use thiserror::Error;

use crate::data::{BuildingKind, TroopKind};

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// No building with this id exists in the active data set.
    #[error("Building not found: {0}")]
    BuildingNotFound(u32),

    /// No unit with this id is on the battlefield.
    #[error("Unit not found: {0}")]
    UnitNotFound(u32),

    /// Footprint is out of bounds or overlaps another building.
    #[error("Invalid placement at ({x}, {y})")]
    InvalidPlacement {
        /// Requested cell x.
        x: i32,
        /// Requested cell y.
        y: i32,
    },

    /// Insufficient resources.
    #[error("Insufficient resources: need {required} {resource}, have {available}")]
    InsufficientResources {
        /// Resource type.
        resource: String,
        /// Amount required.
        required: u64,
        /// Amount available.
        available: u64,
    },

    /// The attacker has no troop of this kind left to deploy.
    #[error("No {0:?} left in the army")]
    InsufficientTroops(TroopKind),

    /// The configuration tables have no entry for this building type.
    #[error("Unknown building type: {0:?}")]
    UnknownBuildingType(BuildingKind),

    /// The configuration tables have no entry for this troop type.
    #[error("Unknown troop type: {0:?}")]
    UnknownTroopType(TroopKind),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Data file parsing or validation error.
    #[error("Failed to parse data '{source_name}': {message}")]
    DataParseError {
        /// Name of the data source (file path or label).
        source_name: String,
        /// Error message.
        message: String,
    },

    /// Save or replay (de)serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Filesystem error while reading or writing a save or replay.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
