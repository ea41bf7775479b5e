use crate::grid::GridError;
use claw_office_protocol::Tile;
use std::fmt;

#[derive(Debug)]
pub enum RegistryError {
    NotFound(String),
    /// Operation not permitted on this bot kind.
    Forbidden { id: String, reason: &'static str },
    AlreadyBound { id: String, bound_by: String },
    /// Mutation requires an owning controller.
    Unbound(String),
    UnknownLocation(String),
    NoPathFound { from: Tile, to: Tile },
    NoWalkableTileFound,
    /// Map failed to load at startup; pathfinding is disabled.
    MapUnavailable,
    Storage(anyhow::Error),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "bot {id} not found"),
            Self::Forbidden { id, reason } => write!(f, "bot {id}: {reason}"),
            Self::AlreadyBound { id, bound_by } => {
                write!(f, "bot {id} is already bound by {bound_by}")
            }
            Self::Unbound(id) => write!(f, "bot {id} has no owning controller"),
            Self::UnknownLocation(key) => write!(f, "unknown location {key:?}"),
            Self::NoPathFound { from, to } => write!(f, "no path from {from} to {to}"),
            Self::NoWalkableTileFound => f.write_str("no walkable tile found"),
            Self::MapUnavailable => f.write_str("map is not loaded; pathfinding unavailable"),
            Self::Storage(err) => write!(f, "snapshot store: {err:#}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<anyhow::Error> for RegistryError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err)
    }
}

impl From<GridError> for RegistryError {
    fn from(err: GridError) -> Self {
        match err {
            GridError::NoWalkableTileFound { .. } => Self::NoWalkableTileFound,
            GridError::MapLoadFailed(_) => Self::MapUnavailable,
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
