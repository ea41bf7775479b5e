//! Umbrella crate for claw-office.
//!
//! Re-exports the engine and protocol crates so embedders (tests, tools,
//! alternative front ends) can depend on a single crate name.

pub use claw_office_engine as engine;
pub use claw_office_protocol as protocol;

pub use claw_office_engine::{Registry, RegistryError, RegistrySettings};
pub use claw_office_protocol::events::ServerEvent;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_resolve() {
        let grid = engine::Grid::from_ascii("...\n.#.\n...").unwrap();
        let path = engine::find_path(
            &grid,
            protocol::Tile::new(0, 1),
            protocol::Tile::new(2, 1),
        )
        .unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(RegistrySettings::default().characters.len(), 4);
    }
}
