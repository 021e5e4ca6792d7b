//! Dense position indexes: slot `id` of a flat array holds the value for `id`.
//!
//! On disk a dense index is the raw array, `V::SIZE` little-endian bytes per
//! slot, with `V::EMPTY` in every slot that was never set. Slot 0 is always
//! empty because identifier 0 is reserved.

use super::sparse::write_list;
use super::types::{check_entry, dense_len, dense_slot, IndexValue};
use crate::error::{Error, Lookup, Result};
use crate::osm::ObjectId;
use crate::utils::MappedFile;
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Slots added at once when a file-backed index has to grow
const GROW_SLOTS: usize = 1 << 16;

fn fill_empty<V: IndexValue>(bytes: &mut [u8]) {
    for chunk in bytes.chunks_exact_mut(V::SIZE) {
        V::EMPTY.write_le(chunk);
    }
}

/// Dense index held in memory and written out on flush
#[derive(Debug, Default)]
pub struct DenseMemIndex<V: IndexValue> {
    slots: Vec<V>,
    count: usize,
}

impl<V: IndexValue> DenseMemIndex<V> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            count: 0,
        }
    }

    pub fn set(&mut self, id: ObjectId, value: V) -> Result<()> {
        check_entry(id, &value)?;
        let slot = dense_slot(id)?;
        if slot >= self.slots.len() {
            self.slots
                .try_reserve(slot + 1 - self.slots.len())
                .map_err(|e| Error::IdTooLarge {
                    id,
                    reason: e.to_string(),
                })?;
            self.slots.resize(slot + 1, V::EMPTY);
        }
        if self.slots[slot].is_empty_slot() {
            self.count += 1;
        }
        self.slots[slot] = value;
        Ok(())
    }

    pub fn get(&self, id: ObjectId) -> Lookup<V> {
        let Ok(slot) = usize::try_from(id) else {
            return Lookup::NotFound;
        };
        self.slots
            .get(slot)
            .copied()
            .filter(|v| !v.is_empty_slot())
            .into()
    }

    /// Number of set slots
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Array length, one past the highest id set so far
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, V)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_empty_slot())
            .map(|(id, v)| (id as ObjectId, *v))
    }

    pub fn dump_as_array<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut buf = vec![0u8; self.slots.len() * V::SIZE];
        for (slot, chunk) in self.slots.iter().zip(buf.chunks_exact_mut(V::SIZE)) {
            slot.write_le(chunk);
        }
        out.write_all(&buf)
    }

    pub fn dump_as_list<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_list(out, self.iter())
    }
}

/// Dense index whose array is a writable mapping of its file
///
/// Every `set` lands directly in the page cache, so nothing is lost when the
/// process exits between batches. The file grows in steps of `GROW_SLOTS` and
/// is trimmed back to one past the highest id on `sync`.
pub struct DenseFileIndex<V: IndexValue> {
    path: PathBuf,
    file: File,
    mmap: Option<MmapMut>,
    /// Slots backed by the file
    capacity: usize,
    /// One past the highest id set
    used: usize,
    count: usize,
    _value: PhantomData<V>,
}

impl<V: IndexValue> DenseFileIndex<V> {
    /// Create a new empty index, truncating any existing file
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::io("Creating index file", path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            mmap: None,
            capacity: 0,
            used: 0,
            count: 0,
            _value: PhantomData,
        })
    }

    /// Open an existing index for further insertions, creating it if missing
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io("Opening index file", path, e))?;
        let len = file
            .metadata()
            .map_err(|e| Error::io("Getting length of index file", path, e))?
            .len() as usize;
        if len % V::SIZE != 0 {
            return Err(Error::corrupt(
                path,
                format!("length {} is not a multiple of {}", len, V::SIZE),
            ));
        }

        let mut index = Self {
            path: path.to_path_buf(),
            file,
            mmap: None,
            capacity: len / V::SIZE,
            used: len / V::SIZE,
            count: 0,
            _value: PhantomData,
        };
        index.remap()?;
        index.count = index.iter().count();
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remap(&mut self) -> Result<()> {
        self.mmap = None;
        if self.capacity == 0 {
            return Ok(());
        }
        // SAFETY: the index file is owned by this writer for its lifetime.
        let map = unsafe { MmapMut::map_mut(&self.file) }
            .map_err(|e| Error::io("Mapping of index file", &self.path, e))?;
        self.mmap = Some(map);
        Ok(())
    }

    fn slots(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    fn grow(&mut self, min_slots: usize) -> Result<()> {
        let new_capacity = min_slots.max(self.capacity.saturating_add(GROW_SLOTS));
        let new_len = dense_len::<V>(new_capacity)?;
        if let Some(map) = self.mmap.take() {
            map.flush()
                .map_err(|e| Error::io("Flushing index file", &self.path, e))?;
        }
        self.file
            .set_len(new_len as u64)
            .map_err(|e| Error::io("Resizing index file", &self.path, e))?;

        let old_capacity = self.capacity;
        self.capacity = new_capacity;
        self.remap()?;
        if let Some(map) = self.mmap.as_mut() {
            fill_empty::<V>(&mut map[old_capacity * V::SIZE..]);
        }
        Ok(())
    }

    pub fn set(&mut self, id: ObjectId, value: V) -> Result<()> {
        check_entry(id, &value)?;
        let slot = dense_slot(id)?;
        if slot >= self.capacity {
            self.grow(slot + 1)?;
        }
        if slot >= self.used {
            self.used = slot + 1;
        }

        let range = slot * V::SIZE..(slot + 1) * V::SIZE;
        let map = self
            .mmap
            .as_mut()
            .ok_or_else(|| Error::State(format!("index '{}' is not mapped", self.path.display())))?;
        if V::read_le(&map[range.clone()]).is_empty_slot() {
            self.count += 1;
        }
        value.write_le(&mut map[range]);
        Ok(())
    }

    pub fn get(&self, id: ObjectId) -> Lookup<V> {
        let slot = usize::try_from(id).unwrap_or(usize::MAX);
        if slot >= self.used {
            return Lookup::NotFound;
        }
        let value = V::read_le(&self.slots()[slot * V::SIZE..]);
        if value.is_empty_slot() {
            Lookup::NotFound
        } else {
            Lookup::Found(value)
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, V)> + '_ {
        let used = &self.slots()[..self.used * V::SIZE];
        used.chunks_exact(V::SIZE)
            .enumerate()
            .map(|(id, chunk)| (id as ObjectId, V::read_le(chunk)))
            .filter(|(_, v)| !v.is_empty_slot())
    }

    pub fn dump_as_array<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.slots()[..self.used * V::SIZE])
    }

    pub fn dump_as_list<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_list(out, self.iter())
    }

    /// Flush the mapping and trim the file to its used length
    pub fn sync(&mut self) -> Result<()> {
        if let Some(map) = self.mmap.as_ref() {
            map.flush()
                .map_err(|e| Error::io("Flushing index file", &self.path, e))?;
        }
        if self.capacity != self.used {
            self.mmap = None;
            self.file
                .set_len((self.used * V::SIZE) as u64)
                .map_err(|e| Error::io("Resizing index file", &self.path, e))?;
            self.capacity = self.used;
            self.remap()?;
        }
        Ok(())
    }
}

impl<V: IndexValue> Drop for DenseFileIndex<V> {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            tracing::warn!("{}", e);
        }
    }
}

/// Read-only view of a dense index file
pub struct DenseIndexView<V: IndexValue> {
    file: MappedFile,
    _value: PhantomData<V>,
}

impl<V: IndexValue> DenseIndexView<V> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = MappedFile::open(path)?;
        if file.len() % V::SIZE != 0 {
            return Err(Error::corrupt(
                path,
                format!("length {} is not a multiple of {}", file.len(), V::SIZE),
            ));
        }
        Ok(Self {
            file,
            _value: PhantomData,
        })
    }

    /// Number of slots, including empty ones
    pub fn slots(&self) -> usize {
        self.file.len() / V::SIZE
    }

    pub fn get(&self, id: ObjectId) -> Lookup<V> {
        let slot = usize::try_from(id).unwrap_or(usize::MAX);
        if slot >= self.slots() {
            return Lookup::NotFound;
        }
        let value = V::read_le(&self.file.data()[slot * V::SIZE..]);
        if value.is_empty_slot() {
            Lookup::NotFound
        } else {
            Lookup::Found(value)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, V)> + '_ {
        self.file
            .data()
            .chunks_exact(V::SIZE)
            .enumerate()
            .map(|(id, chunk)| (id as ObjectId, V::read_le(chunk)))
            .filter(|(_, v)| !v.is_empty_slot())
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn close(self) -> Result<()> {
        self.file.close()
    }
}
