//! The closed set of position index representations behind one interface.

use super::dense::{DenseFileIndex, DenseMemIndex};
use super::sparse::{SparseMapIndex, SparseMemIndex};
use super::types::{IndexType, IndexValue};
use crate::error::{Error, Lookup, Result};
use crate::osm::ObjectId;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Operations shared by every position index representation
pub trait PositionIndex<V: IndexValue> {
    fn set(&mut self, id: ObjectId, value: V) -> Result<()>;

    /// Point lookup; sparse lists must be sorted first
    fn get(&self, id: ObjectId) -> Result<Lookup<V>>;

    /// Number of stored entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bring the index into queryable order; a no-op for dense and map indexes
    fn sort(&mut self);

    fn dump_as_array(&mut self, out: &mut dyn Write) -> io::Result<()>;
    fn dump_as_list(&mut self, out: &mut dyn Write) -> io::Result<()>;
}

impl<V: IndexValue> PositionIndex<V> for DenseMemIndex<V> {
    fn set(&mut self, id: ObjectId, value: V) -> Result<()> {
        DenseMemIndex::set(self, id, value)
    }

    fn get(&self, id: ObjectId) -> Result<Lookup<V>> {
        Ok(DenseMemIndex::get(self, id))
    }

    fn len(&self) -> usize {
        DenseMemIndex::len(self)
    }

    fn sort(&mut self) {}

    fn dump_as_array(&mut self, mut out: &mut dyn Write) -> io::Result<()> {
        DenseMemIndex::dump_as_array(self, &mut out)
    }

    fn dump_as_list(&mut self, mut out: &mut dyn Write) -> io::Result<()> {
        DenseMemIndex::dump_as_list(self, &mut out)
    }
}

impl<V: IndexValue> PositionIndex<V> for DenseFileIndex<V> {
    fn set(&mut self, id: ObjectId, value: V) -> Result<()> {
        DenseFileIndex::set(self, id, value)
    }

    fn get(&self, id: ObjectId) -> Result<Lookup<V>> {
        Ok(DenseFileIndex::get(self, id))
    }

    fn len(&self) -> usize {
        DenseFileIndex::len(self)
    }

    fn sort(&mut self) {}

    fn dump_as_array(&mut self, mut out: &mut dyn Write) -> io::Result<()> {
        DenseFileIndex::dump_as_array(self, &mut out)
    }

    fn dump_as_list(&mut self, mut out: &mut dyn Write) -> io::Result<()> {
        DenseFileIndex::dump_as_list(self, &mut out)
    }
}

impl<V: IndexValue> PositionIndex<V> for SparseMemIndex<V> {
    fn set(&mut self, id: ObjectId, value: V) -> Result<()> {
        SparseMemIndex::set(self, id, value)
    }

    fn get(&self, id: ObjectId) -> Result<Lookup<V>> {
        SparseMemIndex::get(self, id)
    }

    fn len(&self) -> usize {
        SparseMemIndex::len(self)
    }

    fn sort(&mut self) {
        SparseMemIndex::sort(self)
    }

    fn dump_as_array(&mut self, mut out: &mut dyn Write) -> io::Result<()> {
        SparseMemIndex::dump_as_array(self, &mut out)
    }

    fn dump_as_list(&mut self, mut out: &mut dyn Write) -> io::Result<()> {
        SparseMemIndex::dump_as_list(self, &mut out)
    }
}

impl<V: IndexValue> PositionIndex<V> for SparseMapIndex<V> {
    fn set(&mut self, id: ObjectId, value: V) -> Result<()> {
        SparseMapIndex::set(self, id, value)
    }

    fn get(&self, id: ObjectId) -> Result<Lookup<V>> {
        Ok(SparseMapIndex::get(self, id))
    }

    fn len(&self) -> usize {
        SparseMapIndex::len(self)
    }

    fn sort(&mut self) {}

    fn dump_as_array(&mut self, mut out: &mut dyn Write) -> io::Result<()> {
        SparseMapIndex::dump_as_array(self, &mut out)
    }

    fn dump_as_list(&mut self, mut out: &mut dyn Write) -> io::Result<()> {
        SparseMapIndex::dump_as_list(self, &mut out)
    }
}

/// A position index of any representation, chosen at runtime by name
pub enum AnyIndex<V: IndexValue> {
    DenseMem(DenseMemIndex<V>),
    DenseFile(DenseFileIndex<V>),
    SparseMem(SparseMemIndex<V>),
    SparseMap(SparseMapIndex<V>),
}

impl<V: IndexValue> AnyIndex<V> {
    /// Build an empty index; `path` is only touched by file-backed types
    pub fn create(index_type: IndexType, path: &Path) -> Result<Self> {
        Ok(match index_type {
            IndexType::DenseMemArray => AnyIndex::DenseMem(DenseMemIndex::new()),
            IndexType::DenseFileArray => AnyIndex::DenseFile(DenseFileIndex::create(path)?),
            IndexType::SparseMemArray => AnyIndex::SparseMem(SparseMemIndex::new()),
            IndexType::SparseMemMap => AnyIndex::SparseMap(SparseMapIndex::new()),
        })
    }

    pub fn index_type(&self) -> IndexType {
        match self {
            AnyIndex::DenseMem(_) => IndexType::DenseMemArray,
            AnyIndex::DenseFile(_) => IndexType::DenseFileArray,
            AnyIndex::SparseMem(_) => IndexType::SparseMemArray,
            AnyIndex::SparseMap(_) => IndexType::SparseMemMap,
        }
    }

    fn inner(&self) -> &dyn PositionIndex<V> {
        match self {
            AnyIndex::DenseMem(index) => index,
            AnyIndex::DenseFile(index) => index,
            AnyIndex::SparseMem(index) => index,
            AnyIndex::SparseMap(index) => index,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn PositionIndex<V> {
        match self {
            AnyIndex::DenseMem(index) => index,
            AnyIndex::DenseFile(index) => index,
            AnyIndex::SparseMem(index) => index,
            AnyIndex::SparseMap(index) => index,
        }
    }

    /// Persist the index to `path` in its on-disk format
    ///
    /// Dense indexes are written as arrays and sparse ones are sorted and
    /// written as pair lists. A file-backed index already lives in its file
    /// and is only synced.
    pub fn flush(&mut self, path: &Path) -> Result<()> {
        if let AnyIndex::DenseFile(index) = self {
            return index.sync();
        }

        let file = File::create(path).map_err(|e| Error::io("Creating index file", path, e))?;
        let mut out = BufWriter::new(file);
        let dense = self.index_type().is_dense();
        let written = if dense {
            self.dump_as_array(&mut out)
        } else {
            self.dump_as_list(&mut out)
        };
        written
            .and_then(|_| out.flush())
            .map_err(|e| Error::io("Writing index file", path, e))
    }
}

impl<V: IndexValue> PositionIndex<V> for AnyIndex<V> {
    fn set(&mut self, id: ObjectId, value: V) -> Result<()> {
        self.inner_mut().set(id, value)
    }

    fn get(&self, id: ObjectId) -> Result<Lookup<V>> {
        self.inner().get(id)
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn sort(&mut self) {
        self.inner_mut().sort()
    }

    fn dump_as_array(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self.inner_mut().dump_as_array(out)
    }

    fn dump_as_list(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self.inner_mut().dump_as_list(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::dense::DenseIndexView;
    use crate::index::sparse::SparseIndexView;
    use crate::osm::Location;
    use tempfile::tempdir;

    fn fill(index: &mut AnyIndex<u64>) {
        for (id, offset) in [(5, 0), (2, 24), (9, 48), (5, 72)] {
            index.set(id, offset).unwrap();
        }
    }

    #[test]
    fn test_every_type_agrees() {
        let dir = tempdir().unwrap();
        for name in IndexType::NAMES {
            let index_type: IndexType = name.parse().unwrap();
            let path = dir.path().join(format!("{}.idx", name));
            let mut index = AnyIndex::<u64>::create(index_type, &path).unwrap();
            fill(&mut index);
            index.sort();

            assert_eq!(index.get(5).unwrap(), Lookup::Found(72), "{}", name);
            assert_eq!(index.get(2).unwrap(), Lookup::Found(24), "{}", name);
            assert_eq!(index.get(3).unwrap(), Lookup::NotFound, "{}", name);
            assert_eq!(index.get(100).unwrap(), Lookup::NotFound, "{}", name);
        }
    }

    #[test]
    fn test_flush_dense_and_sparse_agree() {
        let dir = tempdir().unwrap();
        let dense_path = dir.path().join("nodes.dense.idx");
        let sparse_path = dir.path().join("nodes.sparse.idx");

        let mut dense = AnyIndex::<u64>::create(IndexType::DenseMemArray, &dense_path).unwrap();
        let mut sparse = AnyIndex::<u64>::create(IndexType::SparseMemArray, &sparse_path).unwrap();
        fill(&mut dense);
        fill(&mut sparse);
        dense.flush(&dense_path).unwrap();
        sparse.flush(&sparse_path).unwrap();

        let dense = DenseIndexView::<u64>::open(&dense_path).unwrap();
        let sparse = SparseIndexView::<u64>::open(&sparse_path).unwrap();
        for id in 1..12 {
            assert_eq!(dense.get(id), sparse.get(id), "id {}", id);
        }
    }

    #[test]
    fn test_flush_is_idempotent() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.idx");
        let second = dir.path().join("second.idx");

        let mut index = AnyIndex::<Location>::create(IndexType::SparseMemArray, &first).unwrap();
        index.set(7, Location::new(1, 1)).unwrap();
        index.set(3, Location::new(2, 2)).unwrap();
        index.flush(&first).unwrap();
        index.flush(&second).unwrap();

        assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
        assert!(matches!(index.set(8, Location::new(0, 0)), Err(Error::Sealed(_))));
    }

    #[test]
    fn test_file_backed_flush_syncs_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ways.dense.idx");
        let mut index = AnyIndex::<u64>::create(IndexType::DenseFileArray, &path).unwrap();
        fill(&mut index);
        index.flush(&path).unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 10 * 8);
        let view = DenseIndexView::<u64>::open(&path).unwrap();
        assert_eq!(view.get(9), Lookup::Found(48));
    }
}
