//! Rebuild the location cache of a database by replaying its log.

use crate::error::{Error, Result};
use crate::index::{AnyIndex, IndexName, IndexType, PositionIndex};
use crate::log::LogReader;
use crate::osm::{Body, Location};
use crate::utils::{data_file_name, index_file_name, progress};
use std::fs;
use std::path::Path;
use tracing::info;

/// Build `locations.<dense|sparse>.idx` from every node in the log
///
/// Once the new cache is on disk, a stale cache of the other
/// representation is removed so readers never pick it up. If the log can
/// not be read the existing cache is left alone. Returns the number of
/// locations written.
pub fn rebuild_locations(database: &Path, dense: bool, show_progress: bool) -> Result<usize> {
    let name = IndexName::Locations.as_str();
    let path = index_file_name(database, name, dense);
    let other = index_file_name(database, name, !dense);

    let index_type = if dense {
        IndexType::DenseMemArray
    } else {
        IndexType::SparseMemArray
    };
    let mut index = AnyIndex::<Location>::create(index_type, &path)?;

    let spinner = progress::spinner("Reading nodes...", !show_progress);
    let log = LogReader::open(&data_file_name(database))?;
    let mut nodes = 0usize;
    for record in log.records_from(0)? {
        let record = record.map_err(|(offset, e)| {
            Error::corrupt(log.path(), format!("record at offset {}: {}", offset, e))
        })?;
        if let Body::Node { location } = record.entity.body {
            if location.is_defined() {
                index.set(record.entity.positive_id(), location)?;
                nodes += 1;
            }
        }
    }
    log.close()?;

    if let Some(spinner) = &spinner {
        spinner.set_message("Writing location cache...");
    }
    if let Err(e) = index.flush(&path) {
        let _ = fs::remove_file(&path);
        return Err(e);
    }
    if other.exists() {
        fs::remove_file(&other).map_err(|e| Error::io("Removing stale cache", &other, e))?;
    }
    if let Some(spinner) = spinner {
        spinner.finish_with_message(format!("Cached {} locations", nodes));
    }
    info!(path = %path.display(), nodes, "rebuilt location cache");
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::Lookup;
    use crate::index::IndexReader;
    use crate::osm::Entity;
    use crate::pipeline::import::Importer;
    use tempfile::tempdir;

    #[test]
    fn test_rebuild_switches_representation() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().join("db"));
        let mut importer = Importer::create(&config).unwrap();
        importer
            .add_batch(&[
                Entity::node(5, Location::from_degrees(1.0, 2.0)),
                Entity::node(6, Location::UNDEFINED),
                Entity::way(10, vec![5, 6]),
                Entity::node(5, Location::from_degrees(3.0, 4.0)),
            ])
            .unwrap();
        importer.finish().unwrap();

        assert_eq!(rebuild_locations(&config.database, true, false).unwrap(), 2);
        let cache = IndexReader::<Location>::open(&config.database, "locations").unwrap();
        assert!(cache.is_dense());
        assert_eq!(cache.get(5), Lookup::Found(Location::from_degrees(3.0, 4.0)));
        assert_eq!(cache.get(6), Lookup::NotFound);

        rebuild_locations(&config.database, false, false).unwrap();
        assert!(!index_file_name(&config.database, "locations", true).exists());
        let cache = IndexReader::<Location>::open(&config.database, "locations").unwrap();
        assert!(!cache.is_dense());
        assert_eq!(cache.get(5), Lookup::Found(Location::from_degrees(3.0, 4.0)));
        assert_eq!(cache.get_all(5).len(), 2);
    }

    #[test]
    fn test_failed_rebuild_keeps_existing_cache() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().join("db")).with_location_type(Some(IndexType::SparseMemArray));
        let mut importer = Importer::create(&config).unwrap();
        importer
            .add_batch(&[Entity::node(5, Location::from_degrees(1.0, 2.0))])
            .unwrap();
        importer.finish().unwrap();

        let data = data_file_name(&config.database);
        let mut bytes = fs::read(&data).unwrap();
        bytes.extend_from_slice(&[1, 2, 3]);
        fs::write(&data, bytes).unwrap();

        assert!(matches!(
            rebuild_locations(&config.database, true, false),
            Err(Error::Corrupt { .. })
        ));
        assert!(!index_file_name(&config.database, "locations", true).exists());
        let cache = IndexReader::<Location>::open(&config.database, "locations").unwrap();
        assert!(!cache.is_dense());
        assert_eq!(cache.get(5), Lookup::Found(Location::from_degrees(1.0, 2.0)));
    }
}
