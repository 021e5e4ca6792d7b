//! Run configuration and the persisted database metadata (`meta.json`).

use crate::error::{Error, Result};
use crate::index::IndexType;
use crate::osm::EntityKind;
use crate::utils::{meta_file_name, DEFAULT_DATABASE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current `meta.json` format version
pub const META_VERSION: u32 = 1;

/// Entities read per input batch
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Where adjacency multimaps are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MapBackend {
    /// No maps are built
    #[default]
    None,
    /// Sorted pair lists in `<map>.map`
    Sorted,
    /// redb stores in `<map>.redb`
    Store,
}

impl FromStr for MapBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(MapBackend::None),
            "sorted" | "map" => Ok(MapBackend::Sorted),
            "store" | "redb" => Ok(MapBackend::Store),
            other => Err(Error::Config(format!(
                "Unknown map backend: '{}' (use sorted or store)",
                other
            ))),
        }
    }
}

impl fmt::Display for MapBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MapBackend::None => "none",
            MapBackend::Sorted => "sorted",
            MapBackend::Store => "store",
        })
    }
}

/// Options of one run, built once from the command line
#[derive(Debug, Clone)]
pub struct Config {
    pub database: PathBuf,
    /// Representation of the node, way and relation offset indexes
    pub index_type: IndexType,
    /// Location index built during import, if any
    pub location_type: Option<IndexType>,
    pub maps: MapBackend,
    pub batch_size: usize,
    /// Show spinners on stderr
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            index_type: IndexType::default(),
            location_type: None,
            maps: MapBackend::None,
            batch_size: DEFAULT_BATCH_SIZE,
            progress: false,
        }
    }
}

impl Config {
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        self
    }

    pub fn with_location_type(mut self, location_type: Option<IndexType>) -> Self {
        self.location_type = location_type;
        self
    }

    pub fn with_maps(mut self, maps: MapBackend) -> Self {
        self.maps = maps;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

/// Number of log records per entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityCounts {
    pub nodes: u64,
    pub ways: u64,
    pub relations: u64,
}

impl EntityCounts {
    pub fn add(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Node => self.nodes += 1,
            EntityKind::Way => self.ways += 1,
            EntityKind::Relation => self.relations += 1,
        }
    }

    pub fn merge(&mut self, other: &EntityCounts) {
        self.nodes += other.nodes;
        self.ways += other.ways;
        self.relations += other.relations;
    }

    pub fn total(&self) -> u64 {
        self.nodes + self.ways + self.relations
    }
}

/// Database metadata stored as `meta.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbMeta {
    pub version: u32,
    pub index_type: IndexType,
    #[serde(default)]
    pub location_type: Option<IndexType>,
    #[serde(default)]
    pub maps: MapBackend,
    pub counts: EntityCounts,
    pub log_length: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl DbMeta {
    pub fn new(config: &Config) -> Self {
        let now = unix_now();
        Self {
            version: META_VERSION,
            index_type: config.index_type,
            location_type: config.location_type,
            maps: config.maps,
            counts: EntityCounts::default(),
            log_length: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Read `<database>/meta.json`; `None` if the database has none
    pub fn load(database: &Path) -> Result<Option<Self>> {
        let path = meta_file_name(database);
        if !path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(&path).map_err(|e| Error::io("Reading metadata file", &path, e))?;
        let meta: DbMeta = serde_json::from_str(&content)
            .map_err(|e| Error::corrupt(&path, format!("invalid metadata: {}", e)))?;
        if meta.version != META_VERSION {
            return Err(Error::corrupt(
                &path,
                format!("unsupported metadata version {}", meta.version),
            ));
        }
        Ok(Some(meta))
    }

    pub fn save(&self, database: &Path) -> Result<()> {
        let path = meta_file_name(database);
        let file = File::create(&path).map_err(|e| Error::io("Creating metadata file", &path, e))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, self)
            .map_err(std::io::Error::from)
            .and_then(|_| out.flush())
            .map_err(|e| Error::io("Writing metadata file", &path, e))
    }

    pub fn touch(&mut self) {
        self.updated_at = unix_now();
    }
}
