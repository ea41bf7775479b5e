use claw_office_protocol::{Location, Tile};
use std::collections::BTreeMap;

/// Fixed lookup table of named waypoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationTable {
    entries: BTreeMap<String, Location>,
}

impl LocationTable {
    pub fn new(entries: BTreeMap<String, Location>) -> Self {
        Self { entries }
    }

    /// Office defaults used when the config names no locations.
    pub fn office_defaults() -> Self {
        let mut entries = BTreeMap::new();
        for (key, x, y, name) in [
            ("desk", 5, 5, "Desk"),
            ("meeting", 15, 4, "Meeting Room"),
            ("coffee", 25, 5, "Coffee Bar"),
            ("lounge", 6, 15, "Lounge"),
            ("door", 15, 18, "Front Door"),
        ] {
            entries.insert(
                key.to_string(),
                Location {
                    x,
                    y,
                    name: name.to_string(),
                },
            );
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Location> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> &BTreeMap<String, Location> {
        &self.entries
    }
}

/// Where a goto should end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Location(String),
    Coordinates(Tile),
}

impl Destination {
    /// Label recorded on the bot's path-follow motion.
    pub fn label(&self) -> String {
        match self {
            Destination::Location(key) => key.clone(),
            Destination::Coordinates(t) => format!("{},{}", t.x, t.y),
        }
    }

    pub fn resolve(&self, table: &LocationTable) -> Option<Tile> {
        match self {
            Destination::Location(key) => table.get(key).map(|l| Tile::new(l.x, l.y)),
            Destination::Coordinates(t) => Some(*t),
        }
    }
}
