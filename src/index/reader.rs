//! Readers that pick the on-disk representation of an index or map by
//! probing the database directory.

use super::dense::DenseIndexView;
use super::multimap::MultimapView;
use super::sparse::SparseIndexView;
use super::types::{IndexValue, MapName};
use crate::error::{Error, Lookup, Result};
use crate::osm::ObjectId;
use crate::store::RelationStore;
use crate::utils::{index_file_name, map_file_name, store_file_name};
use std::path::Path;

/// A persisted position index, dense or sparse
pub enum IndexReader<V: IndexValue> {
    Dense(DenseIndexView<V>),
    Sparse(SparseIndexView<V>),
}

impl<V: IndexValue> IndexReader<V> {
    /// Open `<database>/<name>.dense.idx`, falling back to `<name>.sparse.idx`
    pub fn open(database: &Path, name: &str) -> Result<Self> {
        let dense = index_file_name(database, name, true);
        if dense.exists() {
            tracing::debug!(path = %dense.display(), "using dense index");
            return Ok(IndexReader::Dense(DenseIndexView::open(&dense)?));
        }
        let sparse = index_file_name(database, name, false);
        if sparse.exists() {
            tracing::debug!(path = %sparse.display(), "using sparse index");
            return Ok(IndexReader::Sparse(SparseIndexView::open(&sparse)?));
        }
        Err(Error::Config(format!(
            "Can not open index '{}' in database '{}'",
            name,
            database.display()
        )))
    }

    pub fn is_dense(&self) -> bool {
        matches!(self, IndexReader::Dense(_))
    }

    pub fn get(&self, id: ObjectId) -> Lookup<V> {
        match self {
            IndexReader::Dense(view) => view.get(id),
            IndexReader::Sparse(view) => view.get(id),
        }
    }

    /// Every value stored for `id`; only sparse files can hold more than one
    pub fn get_all(&self, id: ObjectId) -> Vec<V> {
        match self {
            IndexReader::Dense(view) => view.get(id).found().into_iter().collect(),
            IndexReader::Sparse(view) => view.get_all(id),
        }
    }

    /// Present entries in id order
    pub fn iter(&self) -> Box<dyn Iterator<Item = (ObjectId, V)> + '_> {
        match self {
            IndexReader::Dense(view) => Box::new(view.iter()),
            IndexReader::Sparse(view) => Box::new(view.iter()),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            IndexReader::Dense(view) => view.path(),
            IndexReader::Sparse(view) => view.path(),
        }
    }
}

/// A persisted adjacency multimap, sorted pair list or external store
pub enum MapReader {
    Sorted(MultimapView),
    Store(RelationStore),
}

impl MapReader {
    /// Open `<database>/<map>.map`, falling back to `<map>.redb`
    pub fn open(database: &Path, name: MapName) -> Result<Self> {
        let sorted = map_file_name(database, name.as_str());
        if sorted.exists() {
            return Ok(MapReader::Sorted(MultimapView::open(&sorted)?));
        }
        let store = store_file_name(database, name.as_str());
        if store.exists() {
            return Ok(MapReader::Store(RelationStore::open(&store)?));
        }
        Err(Error::Config(format!(
            "Can not open map '{}' in database '{}'",
            name,
            database.display()
        )))
    }

    pub fn get_all(&self, referenced: ObjectId) -> Result<Vec<ObjectId>> {
        match self {
            MapReader::Sorted(view) => Ok(view.get_all(referenced)),
            MapReader::Store(store) => store.get_all(referenced),
        }
    }

    /// Every `(referenced, referrer)` pair in referenced-id order
    pub fn pairs(&self) -> Result<Vec<(ObjectId, ObjectId)>> {
        match self {
            MapReader::Sorted(view) => Ok(view.iter().collect()),
            MapReader::Store(store) => store.pairs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::any::{AnyIndex, PositionIndex};
    use crate::index::IndexType;
    use tempfile::tempdir;

    #[test]
    fn test_prefers_dense() {
        let dir = tempdir().unwrap();
        let dense_path = index_file_name(dir.path(), "nodes", true);
        let sparse_path = index_file_name(dir.path(), "nodes", false);

        let mut sparse = AnyIndex::<u64>::create(IndexType::SparseMemArray, &sparse_path).unwrap();
        sparse.set(1, 8).unwrap();
        sparse.flush(&sparse_path).unwrap();
        let reader = IndexReader::<u64>::open(dir.path(), "nodes").unwrap();
        assert!(!reader.is_dense());
        assert_eq!(reader.get(1), Lookup::Found(8));

        let mut dense = AnyIndex::<u64>::create(IndexType::DenseMemArray, &dense_path).unwrap();
        dense.set(1, 16).unwrap();
        dense.flush(&dense_path).unwrap();
        let reader = IndexReader::<u64>::open(dir.path(), "nodes").unwrap();
        assert!(reader.is_dense());
        assert_eq!(reader.get(1), Lookup::Found(16));
        assert_eq!(reader.iter().collect::<Vec<_>>(), vec![(1, 16)]);
    }

    #[test]
    fn test_missing_files() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            IndexReader::<u64>::open(dir.path(), "ways"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            MapReader::open(dir.path(), MapName::NodeToWay),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_map_reader_uses_store() {
        let dir = tempdir().unwrap();
        let store = RelationStore::create(&store_file_name(dir.path(), "node2way")).unwrap();
        store.insert_batch(&[(1, 10)]).unwrap();
        drop(store);

        let reader = MapReader::open(dir.path(), MapName::NodeToWay).unwrap();
        assert_eq!(reader.get_all(1).unwrap(), vec![10]);
        assert_eq!(reader.pairs().unwrap(), vec![(1, 10)]);
    }
}
