use crate::grid::Grid;
use crate::location::LocationTable;
use claw_office_protocol::MapInfo;

/// Read-only map data shared by the registry and the API.
///
/// `grid` is `None` when the map asset failed to load; the process then runs
/// without collision and refuses pathfinding.
#[derive(Debug, Clone, Default)]
pub struct OfficeMap {
    grid: Option<Grid>,
    locations: LocationTable,
}

impl OfficeMap {
    pub fn new(grid: Option<Grid>, locations: LocationTable) -> Self {
        Self { grid, locations }
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    pub fn locations(&self) -> &LocationTable {
        &self.locations
    }

    pub fn info(&self) -> Option<MapInfo> {
        self.grid.as_ref().map(Grid::info)
    }
}
