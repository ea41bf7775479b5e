//! Authoritative state for the claw-office control plane: the walkability
//! grid, A* pathfinding, the bot registry and its SQLite snapshot store.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod bot;
pub mod error;
pub mod grid;
pub mod location;
pub mod motion;
pub mod office;
pub mod path;
pub mod registry;
pub mod store;

pub use bot::Bot;
pub use error::{RegistryError, RegistryResult};
pub use grid::{Grid, GridError};
pub use location::{Destination, LocationTable};
pub use motion::{Motion, MotionConfig, Step};
pub use office::OfficeMap;
pub use path::find_path;
pub use registry::{
    BindChange, BindOutcome, ConnectionId, EventSink, GotoPlan, LocalBotSpec, NullSink, Registry,
    RegistrySettings, TickReport,
};
pub use store::{BotSnapshot, SnapshotStore};

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
