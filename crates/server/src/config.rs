use anyhow::Context;
use claw_office_engine::grid::DEFAULT_RANDOM_POINT_ATTEMPTS;
use claw_office_engine::{
    Grid, LocalBotSpec, LocationTable, MotionConfig, OfficeMap, RegistrySettings,
};
use claw_office_protocol::{Location, Tile};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 39340;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub listen: SocketAddr,
    /// Static credential for the Control API. Required to serve.
    pub api_token: Option<String>,
    /// Signing key for realtime credentials; random per process when unset.
    pub realtime_secret: Option<String>,
    pub realtime_token_ttl_secs: u64,
    pub db_path: Option<PathBuf>,
    pub public_dir: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
    pub broadcast_capacity: usize,
    pub map: MapConfig,
    pub spawn: Tile,
    pub characters: Vec<String>,
    pub locations: BTreeMap<String, Location>,
    pub local_bots: Vec<LocalBotConfig>,
    pub restore_remote_bots: bool,
    pub simulation: SimulationConfig,
    pub random_point_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        let registry = RegistrySettings::default();
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            api_token: None,
            realtime_secret: None,
            realtime_token_ttl_secs: 300,
            db_path: None,
            public_dir: None,
            allowed_origins: Vec::new(),
            broadcast_capacity: 1024,
            map: MapConfig::default(),
            spawn: registry.spawn,
            characters: registry.characters,
            locations: BTreeMap::new(),
            local_bots: Vec::new(),
            restore_remote_bots: true,
            simulation: SimulationConfig::default(),
            random_point_attempts: DEFAULT_RANDOM_POINT_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapConfig {
    /// Tiled JSON (`.json`) or ASCII grid. No path means no collision.
    pub path: Option<PathBuf>,
    pub collision_layer: String,
    pub tile_size: Option<u32>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            path: None,
            collision_layer: "collision".to_string(),
            tile_size: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub enabled: bool,
    pub tick_ms: u64,
    pub sync_ms: u64,
    /// Tiles per second.
    pub speed: f64,
    pub wander: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tick_ms: 100,
            sync_ms: 2000,
            speed: 3.0,
            wander: true,
        }
    }
}

impl SimulationConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn sync(&self) -> Duration {
        Duration::from_millis(self.sync_ms.max(self.tick_ms).max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalBotConfig {
    pub id: String,
    pub name: String,
    pub character: String,
    pub x: i32,
    pub y: i32,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Self = serde_yaml::from_str(text)?;
        cfg.check()?;
        Ok(cfg)
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.broadcast_capacity == 0 {
            anyhow::bail!("broadcast_capacity must be positive");
        }
        if self.realtime_token_ttl_secs == 0 {
            anyhow::bail!("realtime_token_ttl_secs must be positive");
        }
        if !(self.simulation.speed.is_finite() && self.simulation.speed > 0.0) {
            anyhow::bail!("simulation.speed must be a positive number");
        }
        let mut seen = std::collections::BTreeSet::new();
        for bot in &self.local_bots {
            if !crate::validate::is_valid_bot_id(&bot.id) {
                anyhow::bail!("invalid local bot id {:?}", bot.id);
            }
            if !seen.insert(bot.id.as_str()) {
                anyhow::bail!("duplicate local bot id {:?}", bot.id);
            }
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.realtime_token_ttl_secs)
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            spawn: self.spawn,
            characters: self.characters.clone(),
            local_bots: self
                .local_bots
                .iter()
                .map(|b| LocalBotSpec {
                    id: b.id.clone(),
                    name: b.name.clone(),
                    character: b.character.clone(),
                    spawn: Tile::new(b.x, b.y),
                })
                .collect(),
            restore_remote_bots: self.restore_remote_bots,
            random_point_attempts: self.random_point_attempts.max(1),
            motion: MotionConfig {
                speed: self.simulation.speed,
                ..MotionConfig::default()
            },
            wander: self.simulation.wander,
            ..RegistrySettings::default()
        }
    }

    pub fn location_table(&self) -> LocationTable {
        if self.locations.is_empty() {
            LocationTable::office_defaults()
        } else {
            LocationTable::new(self.locations.clone())
        }
    }

    /// A map that fails to load leaves the server running without collision;
    /// goto and random-point then answer `MapUnavailable`.
    pub fn load_map(&self) -> OfficeMap {
        let grid = match &self.map.path {
            None => {
                warn!("no map configured; collision and pathfinding disabled");
                None
            }
            Some(path) => match Grid::load(path, &self.map.collision_layer) {
                Ok(grid) => {
                    let grid = match self.map.tile_size {
                        Some(size) => grid.with_tile_size(size),
                        None => grid,
                    };
                    info!(
                        path = %path.display(),
                        width = grid.width(),
                        height = grid.height(),
                        "map loaded"
                    );
                    Some(grid)
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "map load failed; running without collision");
                    None
                }
            },
        };
        OfficeMap::new(grid, self.location_table())
    }
}

pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claw-office")
        .join("claw-office.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = Config::from_yaml("").unwrap();
        assert_eq!(cfg.listen.port(), DEFAULT_PORT);
        assert_eq!(cfg.broadcast_capacity, 1024);
        assert!(cfg.restore_remote_bots);
        assert!(!cfg.simulation.enabled);
        assert_eq!(cfg.location_table(), LocationTable::office_defaults());
        assert!(cfg.db_path().ends_with(".claw-office/claw-office.db"));
    }

    #[test]
    fn parses_full_document() {
        let cfg = Config::from_yaml(
            r#"
listen: 0.0.0.0:8080
api_token: hunter2
realtime_token_ttl_secs: 60
map:
  path: assets/office-map.txt
  tile_size: 16
spawn: { x: 3, y: 4 }
characters: [Alvin]
locations:
  kitchen: { x: 2, y: 2, name: Kitchen }
local_bots:
  - { id: alvin, name: Alvin, character: Alvin, x: 1, y: 1 }
simulation:
  enabled: true
  speed: 4.5
"#,
        )
        .unwrap();
        assert_eq!(cfg.listen.port(), 8080);
        assert_eq!(cfg.api_token.as_deref(), Some("hunter2"));
        assert_eq!(cfg.token_ttl(), Duration::from_secs(60));
        assert_eq!(cfg.map.collision_layer, "collision");
        assert_eq!(cfg.simulation.tick_ms, 100);

        let settings = cfg.registry_settings();
        assert_eq!(settings.spawn, Tile::new(3, 4));
        assert_eq!(settings.local_bots[0].spawn, Tile::new(1, 1));
        assert_eq!(settings.motion.speed, 4.5);
        assert_eq!(cfg.location_table().get("kitchen").map(|l| l.x), Some(2));
        assert!(cfg.location_table().get("coffee").is_none());
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(Config::from_yaml("listen: nowhere").is_err());
        assert!(Config::from_yaml("bogus_key: 1").is_err());
        assert!(Config::from_yaml("broadcast_capacity: 0").is_err());
        assert!(Config::from_yaml(
            "local_bots:\n  - { id: a, name: A, character: A, x: 0, y: 0 }\n  - { id: a, name: B, character: B, x: 1, y: 1 }"
        )
        .is_err());
    }

    #[test]
    fn local_bot_ids_must_be_addressable() {
        let doc = |id: &str| {
            format!("local_bots:\n  - {{ id: \"{id}\", name: A, character: A, x: 0, y: 0 }}")
        };
        assert!(Config::from_yaml(&doc("desk-1")).is_ok());
        assert!(Config::from_yaml(&doc("desk 1")).is_err());
        assert!(Config::from_yaml(&doc("goto")).is_err());
    }

    #[test]
    fn missing_map_degrades() {
        let cfg = Config::from_yaml("map:\n  path: /definitely/not/here.json").unwrap();
        let map = cfg.load_map();
        assert!(map.grid().is_none());
        assert!(map.info().is_none());
        assert!(map.locations().get("desk").is_some());
    }

    #[test]
    fn sample_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/office.yaml");
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.local_bots.len(), 1);
        assert_eq!(cfg.location_table(), LocationTable::office_defaults());
        assert_eq!(cfg.registry_settings().characters.len(), 4);
    }
}
