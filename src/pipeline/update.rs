//! Incremental update: append entities to an existing database.
//!
//! Only the dense offset indexes are maintained, written in place through
//! their file mappings. Maps and the location cache are left untouched.

use crate::config::{Config, DbMeta};
use crate::error::{Error, Result};
use crate::index::dense::DenseFileIndex;
use crate::index::{IndexType, Offset};
use crate::log::ObjectLog;
use crate::osm::{Entity, EntityKind, EntityReader, SignedId};
use crate::utils::{data_file_name, index_file_name, progress};
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub struct Updater {
    database: PathBuf,
    log: Option<ObjectLog>,
    offsets: Vec<DenseFileIndex<Offset>>,
    /// Sign of the first id seen in this run
    negative: Option<bool>,
    meta: DbMeta,
}

impl Updater {
    /// Open the log for appending and map the dense offset indexes
    pub fn open(config: &Config) -> Result<Self> {
        let database = &config.database;
        if !database.is_dir() {
            return Err(Error::Config(format!(
                "Database directory '{}' does not exist",
                database.display()
            )));
        }

        let mut offsets = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            let path = index_file_name(database, kind.index_name(), true);
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Update needs dense indexes, '{}' not found",
                    path.display()
                )));
            }
            offsets.push(DenseFileIndex::open(&path)?);
        }

        let log = ObjectLog::open_append(&data_file_name(database))?;
        let meta = match DbMeta::load(database)? {
            Some(meta) => meta,
            None => DbMeta::new(&config.clone().with_index_type(IndexType::DenseFileArray)),
        };
        debug!(log_length = log.offset(), "opened database for update");

        Ok(Self {
            database: database.clone(),
            log: Some(log),
            offsets,
            negative: None,
            meta,
        })
    }

    fn check_sign(&mut self, id: SignedId) -> Result<()> {
        let negative = id < 0;
        match self.negative {
            None => {
                self.negative = Some(negative);
                Ok(())
            }
            Some(first) if first == negative => Ok(()),
            Some(_) => Err(Error::MixedSigns { id }),
        }
    }

    /// Append a batch and point the dense indexes at the new records
    pub fn add_batch(&mut self, batch: &[Entity]) -> Result<()> {
        for entity in batch {
            self.check_sign(entity.id)?;
            let log = self
                .log
                .as_mut()
                .ok_or_else(|| Error::State("update is already finished".to_string()))?;
            let offset = log.append(entity)?;
            let kind = entity.kind();
            self.offsets[kind as usize - 1].set(entity.positive_id(), offset)?;
            self.meta.counts.add(kind);
        }
        Ok(())
    }

    /// Flush the log and indexes, then refresh `meta.json`
    pub fn finish(&mut self) -> Result<DbMeta> {
        let log = self
            .log
            .take()
            .ok_or_else(|| Error::State("update is already finished".to_string()))?;
        self.meta.log_length = log.finish()?;
        for index in &mut self.offsets {
            index.sync()?;
        }
        self.meta.touch();
        self.meta.save(&self.database)?;
        info!(log_length = self.meta.log_length, "update finished");
        Ok(self.meta.clone())
    }
}

fn append_inputs(updater: &mut Updater, inputs: &[PathBuf], batch_size: usize) -> Result<()> {
    for input in inputs {
        info!(input = %input.display(), "reading input");
        for batch in EntityReader::open(input, batch_size)? {
            updater.add_batch(&batch?)?;
        }
    }
    Ok(())
}

/// Append every entity of `inputs` to the database named in `config`.
///
/// On failure the entities appended so far are kept and `meta.json` is
/// saved to match the log before the error is returned.
pub fn run_update(config: &Config, inputs: &[PathBuf]) -> Result<DbMeta> {
    let mut updater = Updater::open(config)?;
    let spinner = progress::spinner("Updating...", !config.progress);
    if let Err(err) = append_inputs(&mut updater, inputs, config.batch_size) {
        // Records already appended stay in the log, so meta must cover them
        match updater.finish() {
            Ok(meta) => warn!(log_length = meta.log_length, error = %err, "update stopped early"),
            Err(e) => warn!(error = %e, "could not save partial update"),
        }
        return Err(err);
    }
    let meta = updater.finish()?;
    if let Some(spinner) = spinner {
        spinner.finish_with_message(format!("Log is now {} bytes", meta.log_length));
    }
    Ok(meta)
}
