//! Adjacency multimaps kept in an external ordered key-value store (redb).
//!
//! One database file per relation kind. Each reference is a single key,
//! `be64(referenced) ++ be64(referrer)`, with `be64(referrer)` as its value, so
//! the store's key order groups all referrers of an entity together and a
//! lookup is a prefix range scan. Identical pairs collapse into one key.

use crate::error::{Error, Result};
use crate::index::multimap::references;
use crate::index::MapName;
use crate::osm::{Entity, ObjectId};
use crate::utils::{be_pair_key, split_be_pair_key, store_file_name};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableError};
use std::path::{Path, PathBuf};
use tracing::debug;

const PAIRS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("pairs");

/// One relation kind's multimap in its own redb file
pub struct RelationStore {
    db: Database,
    path: PathBuf,
}

impl RelationStore {
    /// Open or create the store file
    pub fn create(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(|e| Error::store(path, e))?;
        debug!(path = %path.display(), "opened relation store");
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing store file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::open(path).map_err(|e| Error::store(path, e))?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert `(referenced, referrer)` pairs in one write transaction
    pub fn insert_batch(&self, pairs: &[(ObjectId, ObjectId)]) -> Result<()> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| Error::store(&self.path, format!("write txn: {e}")))?;
        {
            let mut table = txn
                .open_table(PAIRS_TABLE)
                .map_err(|e| Error::store(&self.path, format!("open table: {e}")))?;
            for &(referenced, referrer) in pairs {
                let key = be_pair_key(referenced, referrer);
                table
                    .insert(key.as_slice(), referrer.to_be_bytes().as_slice())
                    .map_err(|e| Error::store(&self.path, format!("insert: {e}")))?;
            }
        }
        txn.commit()
            .map_err(|e| Error::store(&self.path, format!("commit: {e}")))?;
        Ok(())
    }

    /// Scan keys starting at `start` while `keep` accepts them
    fn scan(
        &self,
        start: &[u8],
        mut keep: impl FnMut(&[u8]) -> bool,
    ) -> Result<Vec<(ObjectId, ObjectId)>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| Error::store(&self.path, format!("read txn: {e}")))?;
        let table = match txn.open_table(PAIRS_TABLE) {
            Ok(t) => t,
            // Nothing was ever inserted
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(Error::store(&self.path, format!("open table: {e}"))),
        };

        let mut pairs = Vec::new();
        let iter = table
            .range(start..)
            .map_err(|e| Error::store(&self.path, format!("range scan: {e}")))?;
        for entry in iter {
            let (key, _) = entry.map_err(|e| Error::store(&self.path, format!("scan entry: {e}")))?;
            let key = key.value();
            if !keep(key) {
                break;
            }
            let pair = split_be_pair_key(key)
                .ok_or_else(|| Error::corrupt(&self.path, format!("key of length {}", key.len())))?;
            pairs.push(pair);
        }
        Ok(pairs)
    }

    /// Referrers of `referenced`, ascending
    pub fn get_all(&self, referenced: ObjectId) -> Result<Vec<ObjectId>> {
        let prefix = referenced.to_be_bytes();
        let pairs = self.scan(&prefix, |key| key.starts_with(&prefix))?;
        Ok(pairs.into_iter().map(|(_, referrer)| referrer).collect())
    }

    /// Every pair in key order
    pub fn pairs(&self) -> Result<Vec<(ObjectId, ObjectId)>> {
        self.scan(&[], |_| true)
    }
}

impl std::fmt::Debug for RelationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationStore")
            .field("path", &self.path)
            .finish()
    }
}

/// The four relation stores of a database
#[derive(Debug)]
pub struct RelationStores {
    stores: Vec<RelationStore>,
}

impl RelationStores {
    /// Create `<database>/<map>.redb` for every relation kind
    pub fn create(database: &Path) -> Result<Self> {
        let stores = MapName::ALL
            .iter()
            .map(|name| RelationStore::create(&store_file_name(database, name.as_str())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { stores })
    }

    pub fn store(&self, name: MapName) -> &RelationStore {
        &self.stores[name.slot()]
    }

    /// Record the references of one input batch, one transaction per kind
    pub fn record_batch(&self, entities: &[Entity]) -> Result<()> {
        let mut grouped: [Vec<(ObjectId, ObjectId)>; 4] = Default::default();
        for entity in entities {
            for (name, referenced, referrer) in references(entity) {
                grouped[name.slot()].push((referenced, referrer));
            }
        }

        for name in MapName::ALL {
            let pairs = &grouped[name.slot()];
            if !pairs.is_empty() {
                self.stores[name.slot()].insert_batch(pairs)?;
            }
        }
        Ok(())
    }
}
