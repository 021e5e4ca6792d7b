use crate::error::{Error, Result};
use crate::osm::{EntityKind, Location, ObjectId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Byte position of a record in the object log
pub type Offset = u64;

/// Fixed-width value stored in an index slot or record
///
/// `EMPTY` marks an absent slot in dense files and is never a storable value.
pub trait IndexValue: Copy + PartialEq + fmt::Debug + fmt::Display + 'static {
    const SIZE: usize;
    const EMPTY: Self;

    fn write_le(&self, out: &mut [u8]);
    fn read_le(buf: &[u8]) -> Self;

    fn is_empty_slot(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl IndexValue for u64 {
    const SIZE: usize = 8;
    const EMPTY: Self = u64::MAX;

    #[inline]
    fn write_le(&self, out: &mut [u8]) {
        out[..8].copy_from_slice(&self.to_le_bytes());
    }

    #[inline]
    fn read_le(buf: &[u8]) -> Self {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&buf[..8]);
        u64::from_le_bytes(bytes)
    }
}

impl IndexValue for Location {
    const SIZE: usize = 8;
    const EMPTY: Self = Location::UNDEFINED;

    #[inline]
    fn write_le(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.x.to_le_bytes());
        out[4..8].copy_from_slice(&self.y.to_le_bytes());
    }

    #[inline]
    fn read_le(buf: &[u8]) -> Self {
        let mut x = [0u8; 4];
        let mut y = [0u8; 4];
        x.copy_from_slice(&buf[..4]);
        y.copy_from_slice(&buf[4..8]);
        Location::new(i32::from_le_bytes(x), i32::from_le_bytes(y))
    }
}

/// Reject the reserved key and the empty sentinel before storing
pub(crate) fn check_entry<V: IndexValue>(id: ObjectId, value: &V) -> Result<()> {
    if id == 0 {
        return Err(Error::InvalidId);
    }
    if value.is_empty_slot() {
        return Err(Error::State(format!(
            "value {} for id {} is the empty-slot sentinel",
            value, id
        )));
    }
    Ok(())
}

/// Highest id a dense index accepts; 2^40 slots of 8 bytes are 8 TiB
pub const MAX_DENSE_ID: ObjectId = 1 << 40;

/// Slot of `id` in a dense array
pub(crate) fn dense_slot(id: ObjectId) -> Result<usize> {
    if id > MAX_DENSE_ID {
        return Err(Error::IdTooLarge {
            id,
            reason: format!("the limit is {}", MAX_DENSE_ID),
        });
    }
    usize::try_from(id).map_err(|_| Error::IdTooLarge {
        id,
        reason: "not addressable on this platform".to_string(),
    })
}

/// Byte length of `slots` dense slots of `V`
pub(crate) fn dense_len<V: IndexValue>(slots: usize) -> Result<usize> {
    slots.checked_mul(V::SIZE).ok_or_else(|| Error::IdTooLarge {
        id: slots as u64,
        reason: format!("{} slots overflow the address space", slots),
    })
}

/// Index implementations selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    /// In-memory array, written out at flush
    DenseMemArray,
    /// Array living in a writable mapping of the index file itself
    DenseFileArray,
    /// In-memory pair list, sorted and written out at flush
    #[default]
    SparseMemArray,
    /// In-memory ordered map, written out in the sparse format at flush
    SparseMemMap,
}

impl IndexType {
    pub const NAMES: [&'static str; 5] = [
        "dense_file_array",
        "dense_mem_array",
        "dense_mmap_array",
        "sparse_mem_array",
        "sparse_mem_map",
    ];

    pub fn is_dense(self) -> bool {
        matches!(self, IndexType::DenseMemArray | IndexType::DenseFileArray)
    }

    /// The index writes straight into its file while it is built
    pub fn is_file_based(self) -> bool {
        self == IndexType::DenseFileArray
    }

    pub fn name(self) -> &'static str {
        match self {
            IndexType::DenseMemArray => "dense_mem_array",
            IndexType::DenseFileArray => "dense_file_array",
            IndexType::SparseMemArray => "sparse_mem_array",
            IndexType::SparseMemMap => "sparse_mem_map",
        }
    }
}

impl FromStr for IndexType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dense" | "dense_mem_array" => Ok(IndexType::DenseMemArray),
            "dense_file_array" | "dense_mmap_array" => Ok(IndexType::DenseFileArray),
            "sparse" | "sparse_mem_array" => Ok(IndexType::SparseMemArray),
            "sparse_mem_map" => Ok(IndexType::SparseMemMap),
            other => Err(Error::Config(format!("Unknown index type: '{}'", other))),
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The four position indexes of a database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexName {
    Nodes,
    Ways,
    Relations,
    Locations,
}

impl IndexName {
    pub const ALL: [IndexName; 4] = [
        IndexName::Nodes,
        IndexName::Ways,
        IndexName::Relations,
        IndexName::Locations,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IndexName::Nodes => "nodes",
            IndexName::Ways => "ways",
            IndexName::Relations => "relations",
            IndexName::Locations => "locations",
        }
    }

    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Node => IndexName::Nodes,
            EntityKind::Way => IndexName::Ways,
            EntityKind::Relation => IndexName::Relations,
        }
    }
}

impl FromStr for IndexName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "n" | "nodes" => Ok(IndexName::Nodes),
            "w" | "ways" => Ok(IndexName::Ways),
            "r" | "relations" => Ok(IndexName::Relations),
            "l" | "locations" => Ok(IndexName::Locations),
            _ => Err(Error::Config(
                "Index must be one of: nodes, ways, relations, locations".to_string(),
            )),
        }
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four adjacency maps: referenced kind to referrer kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapName {
    NodeToWay,
    NodeToRelation,
    WayToRelation,
    RelationToRelation,
}

impl MapName {
    pub const ALL: [MapName; 4] = [
        MapName::NodeToWay,
        MapName::NodeToRelation,
        MapName::WayToRelation,
        MapName::RelationToRelation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MapName::NodeToWay => "node2way",
            MapName::NodeToRelation => "node2relation",
            MapName::WayToRelation => "way2relation",
            MapName::RelationToRelation => "relation2relation",
        }
    }

    /// Map that records relation members of the given kind
    pub fn for_member(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Node => MapName::NodeToRelation,
            EntityKind::Way => MapName::WayToRelation,
            EntityKind::Relation => MapName::RelationToRelation,
        }
    }

    pub fn slot(self) -> usize {
        self as usize
    }
}

impl FromStr for MapName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "n2w" | "node2way" => Ok(MapName::NodeToWay),
            "n2r" | "node2relation" => Ok(MapName::NodeToRelation),
            "w2r" | "way2relation" => Ok(MapName::WayToRelation),
            "r2r" | "relation2relation" => Ok(MapName::RelationToRelation),
            _ => Err(Error::Config(
                "Map must be one of: node2way, node2relation, way2relation, relation2relation"
                    .to_string(),
            )),
        }
    }
}

impl fmt::Display for MapName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
