//! Walkability grid loaded from the office map asset.

use claw_office_protocol::{MapInfo, Tile};
use rand::Rng;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub const DEFAULT_TILE_SIZE: u32 = 32;
pub const DEFAULT_RANDOM_POINT_ATTEMPTS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    MapLoadFailed(String),
    NoWalkableTileFound { attempts: u32 },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MapLoadFailed(why) => write!(f, "map load failed: {why}"),
            Self::NoWalkableTileFound { attempts } => {
                write!(f, "no walkable tile found after {attempts} attempts")
            }
        }
    }
}

impl std::error::Error for GridError {}

/// Row-major walkability grid. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: u32,
    height: u32,
    tile_size: u32,
    layers: Vec<String>,
    walkable: Vec<bool>,
}

impl Grid {
    pub fn from_cells(width: u32, height: u32, walkable: Vec<bool>) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::MapLoadFailed(format!(
                "grid must not be empty ({width}x{height})"
            )));
        }
        let expected = width as usize * height as usize;
        if walkable.len() != expected {
            return Err(GridError::MapLoadFailed(format!(
                "expected {expected} cells for {width}x{height}, got {}",
                walkable.len()
            )));
        }
        Ok(Self {
            width,
            height,
            tile_size: DEFAULT_TILE_SIZE,
            layers: Vec::new(),
            walkable,
        })
    }

    /// `#` is blocked, any other character is walkable. Blank lines are skipped;
    /// every row must have the same width.
    pub fn from_ascii(text: &str) -> Result<Self, GridError> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        let mut cells = Vec::with_capacity(width * rows.len());
        for (y, row) in rows.iter().enumerate() {
            let n = row.chars().count();
            if n != width {
                return Err(GridError::MapLoadFailed(format!(
                    "row {y} has {n} columns, expected {width}"
                )));
            }
            cells.extend(row.chars().map(|c| c != '#'));
        }
        let mut grid = Self::from_cells(width as u32, rows.len() as u32, cells)?;
        grid.layers = vec!["collision".to_string()];
        Ok(grid)
    }

    /// Tiled JSON export. Cells with a non-zero gid in `collision_layer` are blocked.
    pub fn from_tiled_json(text: &str, collision_layer: &str) -> Result<Self, GridError> {
        let map: TiledMap = serde_json::from_str(text)
            .map_err(|e| GridError::MapLoadFailed(format!("parse tiled map: {e}")))?;
        let layer = map
            .layers
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(collision_layer))
            .ok_or_else(|| {
                GridError::MapLoadFailed(format!("collision layer {collision_layer:?} not found"))
            })?;
        let data = layer.data.as_ref().ok_or_else(|| {
            GridError::MapLoadFailed(format!(
                "layer {:?} has no CSV tile data (base64 layers are not supported)",
                layer.name
            ))
        })?;
        let cells = data.iter().map(|gid| *gid == 0).collect();
        let mut grid = Self::from_cells(map.width, map.height, cells)?;
        grid.tile_size = map.tilewidth.unwrap_or(DEFAULT_TILE_SIZE);
        grid.layers = map.layers.iter().map(|l| l.name.clone()).collect();
        Ok(grid)
    }

    /// Loads `.json` as Tiled, anything else as ASCII.
    pub fn load(path: &Path, collision_layer: &str) -> Result<Self, GridError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GridError::MapLoadFailed(format!("read {}: {e}", path.display())))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_tiled_json(&text, collision_layer)
        } else {
            Self::from_ascii(&text)
        }
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn walkable(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return false;
        }
        self.walkable[y as usize * self.width as usize + x as usize]
    }

    pub fn is_walkable(&self, tile: Tile) -> bool {
        self.walkable(tile.x, tile.y)
    }

    /// Uniform rejection sampling, bounded so an all-blocked map cannot spin forever.
    pub fn random_walkable_point<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        max_attempts: u32,
    ) -> Result<Tile, GridError> {
        for _ in 0..max_attempts {
            let tile = Tile::new(
                rng.random_range(0..self.width) as i32,
                rng.random_range(0..self.height) as i32,
            );
            if self.is_walkable(tile) {
                return Ok(tile);
            }
        }
        Err(GridError::NoWalkableTileFound {
            attempts: max_attempts,
        })
    }

    pub fn info(&self) -> MapInfo {
        MapInfo {
            width: self.width,
            height: self.height,
            tile_size: self.tile_size,
            layers: self.layers.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TiledMap {
    width: u32,
    height: u32,
    #[serde(default)]
    tilewidth: Option<u32>,
    #[serde(default)]
    layers: Vec<TiledLayer>,
}

#[derive(Debug, Deserialize)]
struct TiledLayer {
    name: String,
    #[serde(default)]
    data: Option<Vec<u32>>,
}
