//! Bulk import: create a database and fill the log, indexes and maps.

use crate::config::{Config, DbMeta, MapBackend};
use crate::error::{Error, Result};
use crate::index::{AnyIndex, IndexName, Offset, PositionIndex, RelationMaps};
use crate::log::ObjectLog;
use crate::osm::{Entity, EntityKind, EntityReader, Location};
use crate::store::RelationStores;
use crate::utils::{data_file_name, index_file_name, progress};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    /// Database directory and empty structures exist
    Created,
    /// At least one batch has been added
    Indexing,
    /// Every structure has been persisted; the importer is done
    Flushed,
}

enum Maps {
    None,
    Sorted(RelationMaps),
    Store(RelationStores),
}

/// Writer side of a fresh database
pub struct Importer {
    config: Config,
    state: ImportState,
    log: Option<ObjectLog>,
    /// Offset indexes for nodes, ways and relations, in `EntityKind::ALL` order
    offsets: Vec<AnyIndex<Offset>>,
    locations: Option<AnyIndex<Location>>,
    maps: Maps,
    meta: DbMeta,
}

fn kind_slot(kind: EntityKind) -> usize {
    kind as usize - 1
}

impl Importer {
    /// Create the database directory and its empty structures
    ///
    /// Fails if the directory already exists.
    pub fn create(config: &Config) -> Result<Self> {
        let database = &config.database;
        if database.exists() {
            return Err(Error::Config(format!(
                "Database directory '{}' already exists",
                database.display()
            )));
        }
        fs::create_dir_all(database)
            .map_err(|e| Error::io("Creating database directory", database, e))?;

        let log = ObjectLog::create(&data_file_name(database))?;
        let dense = config.index_type.is_dense();
        let offsets = EntityKind::ALL
            .iter()
            .map(|kind| {
                let path = index_file_name(database, kind.index_name(), dense);
                AnyIndex::create(config.index_type, &path)
            })
            .collect::<Result<Vec<_>>>()?;

        let locations = match config.location_type {
            Some(location_type) => {
                let path = index_file_name(database, "locations", location_type.is_dense());
                Some(AnyIndex::create(location_type, &path)?)
            }
            None => None,
        };

        let maps = match config.maps {
            MapBackend::None => Maps::None,
            MapBackend::Sorted => Maps::Sorted(RelationMaps::new()),
            MapBackend::Store => Maps::Store(RelationStores::create(database)?),
        };

        info!(
            database = %database.display(),
            index = %config.index_type,
            maps = %config.maps,
            "created database"
        );

        Ok(Self {
            config: config.clone(),
            state: ImportState::Created,
            log: Some(log),
            offsets,
            locations,
            maps,
            meta: DbMeta::new(config),
        })
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn database(&self) -> &Path {
        &self.config.database
    }

    /// Append a batch to the log and record it in every enabled structure
    pub fn add_batch(&mut self, batch: &[Entity]) -> Result<()> {
        if self.state == ImportState::Flushed {
            return Err(Error::State("import is already finished".to_string()));
        }
        self.state = ImportState::Indexing;

        let log = self
            .log
            .as_mut()
            .ok_or_else(|| Error::State("object log is closed".to_string()))?;

        for entity in batch {
            let offset = log.append(entity)?;
            let kind = entity.kind();
            let id = entity.positive_id();
            self.offsets[kind_slot(kind)].set(id, offset)?;
            self.meta.counts.add(kind);

            if let (Some(index), Some(location)) = (self.locations.as_mut(), entity.location()) {
                if location.is_defined() {
                    index.set(id, location)?;
                }
            }
            if let Maps::Sorted(maps) = &mut self.maps {
                maps.record(entity)?;
            }
        }

        if let Maps::Store(stores) = &self.maps {
            stores.record_batch(batch)?;
        }

        debug!(entities = batch.len(), log_length = log.offset(), "imported batch");
        Ok(())
    }

    /// Persist every structure and write `meta.json`
    pub fn finish(&mut self) -> Result<DbMeta> {
        if self.state == ImportState::Flushed {
            return Err(Error::State("import is already finished".to_string()));
        }
        let database = self.config.database.clone();

        for (kind, index) in EntityKind::ALL.iter().zip(self.offsets.iter_mut()) {
            let path = index_file_name(&database, kind.index_name(), index.index_type().is_dense());
            index.flush(&path)?;
            debug!(index = kind.index_name(), entries = index.len(), "flushed index");
        }

        if let Some(index) = self.locations.as_mut() {
            let path = index_file_name(&database, IndexName::Locations.as_str(), index.index_type().is_dense());
            index.flush(&path)?;
            debug!(entries = index.len(), "flushed location index");
        }

        if let Maps::Sorted(maps) = &mut self.maps {
            maps.flush(&database)?;
        }

        if let Some(log) = self.log.take() {
            self.meta.log_length = log.finish()?;
        }

        self.meta.touch();
        self.meta.save(&database)?;
        self.state = ImportState::Flushed;

        info!(
            nodes = self.meta.counts.nodes,
            ways = self.meta.counts.ways,
            relations = self.meta.counts.relations,
            log_length = self.meta.log_length,
            "import finished"
        );
        Ok(self.meta.clone())
    }
}

/// Create a database from `inputs` and import every entity in order
pub fn run_import(config: &Config, inputs: &[PathBuf]) -> Result<DbMeta> {
    let mut importer = Importer::create(config)?;

    let spinner = progress::spinner("Importing...", !config.progress);
    for input in inputs {
        info!(input = %input.display(), "reading input");
        for batch in EntityReader::open(input, config.batch_size)? {
            importer.add_batch(&batch?)?;
            if let Some(spinner) = &spinner {
                spinner.set_message(format!(
                    "Importing {} ({} objects)",
                    input.display(),
                    importer.meta.counts.total()
                ));
            }
        }
    }

    if let Some(spinner) = &spinner {
        spinner.set_message("Writing indexes...");
    }
    let meta = importer.finish()?;
    if let Some(spinner) = spinner {
        spinner.finish_with_message(format!("Imported {} objects", meta.counts.total()));
    }
    Ok(meta)
}
