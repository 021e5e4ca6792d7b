//! Adjacency multimaps: which ways and relations reference an entity.

use super::sparse::{SparseIndexView, SparseMemIndex};
use super::types::MapName;
use crate::error::{Error, Result};
use crate::osm::{Body, Entity, ObjectId};
use crate::utils::map_file_name;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Read view of a persisted multimap; same file format as a sparse index
pub type MultimapView = SparseIndexView<ObjectId>;

/// Every `(map, referenced, referrer)` triple an entity contributes
///
/// Ways reference their nodes, relations reference their members. Nodes
/// reference nothing.
pub fn references(entity: &Entity) -> Vec<(MapName, ObjectId, ObjectId)> {
    let referrer = entity.positive_id();
    match &entity.body {
        Body::Node { .. } => Vec::new(),
        Body::Way { nodes } => nodes
            .iter()
            .map(|node| (MapName::NodeToWay, node.unsigned_abs(), referrer))
            .collect(),
        Body::Relation { members } => members
            .iter()
            .map(|member| (MapName::for_member(member.kind), member.positive_id(), referrer))
            .collect(),
    }
}

/// Multimap accumulated as a pair list and sorted once before use
#[derive(Debug, Default)]
pub struct SparseMultimap {
    pairs: SparseMemIndex<ObjectId>,
}

impl SparseMultimap {
    pub fn new() -> Self {
        Self {
            pairs: SparseMemIndex::new(),
        }
    }

    pub fn insert(&mut self, referenced: ObjectId, referrer: ObjectId) -> Result<()> {
        self.pairs.set(referenced, referrer)
    }

    /// Stable sort by referenced id; idempotent, seals the map
    pub fn sort(&mut self) {
        self.pairs.sort()
    }

    /// Referrers of `referenced` in insertion order
    pub fn get_all(&self, referenced: ObjectId) -> Result<Vec<ObjectId>> {
        self.pairs.get_all(referenced)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn dump_as_list<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        self.pairs.dump_as_list(out)
    }
}

/// The four in-memory multimaps of an import run
#[derive(Debug, Default)]
pub struct RelationMaps {
    maps: [SparseMultimap; 4],
}

impl RelationMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&self, name: MapName) -> &SparseMultimap {
        &self.maps[name.slot()]
    }

    /// Record every reference `entity` makes
    pub fn record(&mut self, entity: &Entity) -> Result<()> {
        for (name, referenced, referrer) in references(entity) {
            self.maps[name.slot()].insert(referenced, referrer)?;
        }
        Ok(())
    }

    /// Sort every map and write it to `<database>/<map>.map`
    ///
    /// Empty maps still produce an empty file.
    pub fn flush(&mut self, database: &Path) -> Result<()> {
        for name in MapName::ALL {
            let path = map_file_name(database, name.as_str());
            let map = &mut self.maps[name.slot()];
            map.sort();

            let file = File::create(&path).map_err(|e| Error::io("Creating map file", &path, e))?;
            let mut out = BufWriter::new(file);
            map.dump_as_list(&mut out)
                .and_then(|_| out.flush())
                .map_err(|e| Error::io("Writing map file", &path, e))?;
            tracing::debug!(map = name.as_str(), pairs = map.len(), "wrote multimap");
        }
        Ok(())
    }
}
