//! Sparse position indexes: `(id, value)` pairs sorted by id.
//!
//! On disk a sparse index is a packed array of records, an 8-byte
//! little-endian id followed by `V::SIZE` value bytes, sorted ascending by id.
//! Duplicate ids may appear; they keep insertion order, and point lookups
//! return the last one.

use super::types::{check_entry, dense_len, dense_slot, IndexValue};
use crate::error::{Error, Lookup, Result};
use crate::osm::ObjectId;
use crate::utils::{get_u64_le, MappedFile};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::Path;

/// Size of one on-disk `(id, value)` record
pub const fn record_size<V: IndexValue>() -> usize {
    8 + V::SIZE
}

pub(crate) fn write_list<V: IndexValue, W: Write>(
    out: &mut W,
    entries: impl Iterator<Item = (ObjectId, V)>,
) -> io::Result<()> {
    let mut buf = vec![0u8; record_size::<V>()];
    for (id, value) in entries {
        buf[..8].copy_from_slice(&id.to_le_bytes());
        value.write_le(&mut buf[8..]);
        out.write_all(&buf)?;
    }
    Ok(())
}

/// Expand sorted pairs into a dense array; later duplicates overwrite earlier ones
///
/// Ids a dense array can not hold fail with `InvalidInput`.
pub(crate) fn write_array<V: IndexValue, W: Write>(
    out: &mut W,
    entries: impl Iterator<Item = (ObjectId, V)>,
) -> io::Result<()> {
    let mut slots: Vec<V> = Vec::new();
    for (id, value) in entries {
        let slot = dense_slot(id).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        if slot >= slots.len() {
            slots
                .try_reserve(slot + 1 - slots.len())
                .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
            slots.resize(slot + 1, V::EMPTY);
        }
        slots[slot] = value;
    }

    let len = dense_len::<V>(slots.len()).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut buf = vec![0u8; len];
    for (slot, chunk) in slots.iter().zip(buf.chunks_exact_mut(V::SIZE)) {
        slot.write_le(chunk);
    }
    out.write_all(&buf)
}

/// Sparse index accumulated in memory as an unsorted pair list
///
/// Lookups need the list sorted. Once `sort` has run the index is sealed and
/// rejects further insertions.
#[derive(Debug, Default)]
pub struct SparseMemIndex<V: IndexValue> {
    entries: Vec<(ObjectId, V)>,
    sorted: bool,
}

impl<V: IndexValue> SparseMemIndex<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            sorted: false,
        }
    }

    pub fn set(&mut self, id: ObjectId, value: V) -> Result<()> {
        if self.sorted {
            return Err(Error::Sealed("sparse index"));
        }
        check_entry(id, &value)?;
        self.entries.push((id, value));
        Ok(())
    }

    /// Stable sort by id; idempotent
    pub fn sort(&mut self) {
        if !self.sorted {
            self.entries.sort_by_key(|(id, _)| *id);
            self.sorted = true;
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    fn require_sorted(&self) -> Result<()> {
        if self.sorted {
            Ok(())
        } else {
            Err(Error::State(
                "sparse index must be sorted before lookups".to_string(),
            ))
        }
    }

    pub fn get(&self, id: ObjectId) -> Result<Lookup<V>> {
        self.require_sorted()?;
        let end = self.entries.partition_point(|(k, _)| *k <= id);
        Ok(match end.checked_sub(1).map(|i| self.entries[i]) {
            Some((k, v)) if k == id => Lookup::Found(v),
            _ => Lookup::NotFound,
        })
    }

    /// All values stored under `id`, in insertion order
    pub fn get_all(&self, id: ObjectId) -> Result<Vec<V>> {
        self.require_sorted()?;
        let start = self.entries.partition_point(|(k, _)| *k < id);
        Ok(self.entries[start..]
            .iter()
            .take_while(|(k, _)| *k == id)
            .map(|(_, v)| *v)
            .collect())
    }

    /// Number of pairs, duplicates included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, V)> + '_ {
        self.entries.iter().copied()
    }

    /// Sorts first, then writes the pair list
    pub fn dump_as_list<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        self.sort();
        write_list(out, self.iter())
    }

    pub fn dump_as_array<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        self.sort();
        write_array(out, self.iter())
    }
}

/// Sparse index kept in an ordered map; always sorted, one value per id
#[derive(Debug, Default)]
pub struct SparseMapIndex<V: IndexValue> {
    map: BTreeMap<ObjectId, V>,
}

impl<V: IndexValue> SparseMapIndex<V> {
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, id: ObjectId, value: V) -> Result<()> {
        check_entry(id, &value)?;
        self.map.insert(id, value);
        Ok(())
    }

    pub fn get(&self, id: ObjectId) -> Lookup<V> {
        self.map.get(&id).copied().into()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, V)> + '_ {
        self.map.iter().map(|(k, v)| (*k, *v))
    }

    pub fn dump_as_list<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_list(out, self.iter())
    }

    pub fn dump_as_array<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_array(out, self.iter())
    }
}

/// Read-only view of a sparse index file
///
/// The file is validated on open: its length must be a whole number of
/// records and ids must be in non-decreasing order. Records with id 0 are
/// empty placeholders; they sort first and are never returned.
pub struct SparseIndexView<V: IndexValue> {
    file: MappedFile,
    count: usize,
    /// Index of the first record with a non-zero id
    start: usize,
    _value: PhantomData<V>,
}

impl<V: IndexValue> SparseIndexView<V> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = MappedFile::open(path)?;
        let size = record_size::<V>();
        if file.len() % size != 0 {
            return Err(Error::corrupt(
                path,
                format!("length {} is not a multiple of {}", file.len(), size),
            ));
        }

        let mut view = Self {
            count: file.len() / size,
            start: 0,
            file,
            _value: PhantomData,
        };

        let mut previous = 0;
        for i in 0..view.count {
            let id = view.key(i);
            if id < previous {
                return Err(Error::corrupt(
                    path,
                    format!("record {} (id {}) is out of order after id {}", i, id, previous),
                ));
            }
            previous = id;
        }
        view.start = (0..view.count).take_while(|&i| view.key(i) == 0).count();
        Ok(view)
    }

    #[inline]
    fn key(&self, i: usize) -> ObjectId {
        get_u64_le(self.file.data(), i * record_size::<V>()).unwrap_or(0)
    }

    #[inline]
    fn value(&self, i: usize) -> V {
        V::read_le(&self.file.data()[i * record_size::<V>() + 8..])
    }

    /// First record index whose id is not less than `id`
    fn lower_bound(&self, id: ObjectId) -> usize {
        let (mut lo, mut hi) = (self.start, self.count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.key(mid) < id {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Last value stored for `id`
    pub fn get(&self, id: ObjectId) -> Lookup<V> {
        if id == 0 {
            return Lookup::NotFound;
        }
        let start = self.lower_bound(id);
        let end = (start..self.count)
            .take_while(|&i| self.key(i) == id)
            .last();
        end.map(|i| self.value(i)).into()
    }

    pub fn get_all(&self, id: ObjectId) -> Vec<V> {
        if id == 0 {
            return Vec::new();
        }
        let start = self.lower_bound(id);
        (start..self.count)
            .take_while(|&i| self.key(i) == id)
            .map(|i| self.value(i))
            .collect()
    }

    /// Number of records, duplicates included, placeholders excluded
    pub fn len(&self) -> usize {
        self.count - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, V)> + '_ {
        (self.start..self.count).map(|i| (self.key(i), self.value(i)))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn close(self) -> Result<()> {
        self.file.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osm::Location;
    use tempfile::tempdir;

    #[test]
    fn test_mem_requires_sort() {
        let mut index = SparseMemIndex::<u64>::new();
        index.set(9, 1).unwrap();
        assert!(matches!(index.get(9), Err(Error::State(_))));

        index.sort();
        index.sort();
        assert_eq!(index.get(9).unwrap(), Lookup::Found(1));
        assert!(matches!(index.set(10, 2), Err(Error::Sealed(_))));
    }

    #[test]
    fn test_mem_duplicates_last_wins() {
        let mut index = SparseMemIndex::<u64>::new();
        index.set(5, 100).unwrap();
        index.set(2, 7).unwrap();
        index.set(5, 200).unwrap();
        index.sort();

        assert_eq!(index.get(5).unwrap(), Lookup::Found(200));
        assert_eq!(index.get_all(5).unwrap(), vec![100, 200]);
        assert_eq!(index.get(3).unwrap(), Lookup::NotFound);
        assert_eq!(index.get(1).unwrap(), Lookup::NotFound);
        assert_eq!(index.get(6).unwrap(), Lookup::NotFound);
    }

    #[test]
    fn test_map_index() {
        let mut index = SparseMapIndex::<Location>::new();
        index.set(5, Location::new(1, 2)).unwrap();
        index.set(5, Location::new(3, 4)).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(5), Lookup::Found(Location::new(3, 4)));
        assert!(index.set(6, Location::UNDEFINED).is_err());
    }

    #[test]
    fn test_view_lookup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nodes.sparse.idx");

        let mut index = SparseMemIndex::<u64>::new();
        for (id, offset) in [(30, 16), (10, 0), (20, 8), (20, 24)] {
            index.set(id, offset).unwrap();
        }
        let mut out = Vec::new();
        index.dump_as_list(&mut out).unwrap();
        std::fs::write(&path, &out).unwrap();

        let view = SparseIndexView::<u64>::open(&path).unwrap();
        assert_eq!(view.len(), 4);
        assert_eq!(view.get(10), Lookup::Found(0));
        assert_eq!(view.get(20), Lookup::Found(24));
        assert_eq!(view.get_all(20), vec![8, 24]);
        assert_eq!(view.get(15), Lookup::NotFound);
        assert_eq!(view.get(31), Lookup::NotFound);
        let ids: Vec<u64> = view.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![10, 20, 20, 30]);
    }

    #[test]
    fn test_view_rejects_unsorted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.sparse.idx");
        let mut out = Vec::new();
        write_list(&mut out, [(5u64, 1u64), (3, 2)].into_iter()).unwrap();
        std::fs::write(&path, &out).unwrap();

        assert!(matches!(
            SparseIndexView::<u64>::open(&path),
            Err(Error::Corrupt { .. })
        ));

        std::fs::write(&path, &out[..10]).unwrap();
        assert!(matches!(
            SparseIndexView::<u64>::open(&path),
            Err(Error::Corrupt { .. })
        ));
    }

    #[test]
    fn test_view_skips_placeholders() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ways.sparse.idx");
        let mut out = Vec::new();
        write_list(&mut out, [(0u64, 0u64), (0, 0), (4, 8)].into_iter()).unwrap();
        std::fs::write(&path, &out).unwrap();

        let view = SparseIndexView::<u64>::open(&path).unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view.get(0), Lookup::NotFound);
        assert!(view.get_all(0).is_empty());
        assert_eq!(view.get(4), Lookup::Found(8));
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![(4, 8)]);
    }

    #[test]
    fn test_sparse_dump_as_array_rejects_huge_id() {
        let mut index = SparseMemIndex::<u64>::new();
        index.set(1 << 61, 5).unwrap();
        let mut out = Vec::new();
        let err = index.dump_as_array(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(out.is_empty());
    }

    #[test]
    fn test_sparse_dump_as_array() {
        let mut index = SparseMemIndex::<u64>::new();
        index.set(3, 5).unwrap();
        index.set(3, 6).unwrap();
        let mut out = Vec::new();
        index.dump_as_array(&mut out).unwrap();
        assert_eq!(out.len(), 4 * 8);
        assert_eq!(u64::read_le(&out[24..]), 6);
        assert_eq!(u64::read_le(&out[8..]), u64::EMPTY);
    }
}
