use crate::config::DbMeta;
use crate::error::Error;
use crate::index::{IndexName, IndexReader, IndexValue, Offset};
use crate::osm::Location;
use crate::output::{print_field, print_heading};
use crate::utils::index_file_name;
use anyhow::{Context, Result};
use std::path::Path;
use termcolor::WriteColor;
use tracing::warn;

enum IndexStatus {
    Missing,
    Present { dense: bool, entries: usize },
    Unreadable(Error),
}

fn index_status<V: IndexValue>(database: &Path, name: IndexName) -> IndexStatus {
    let name = name.as_str();
    if !index_file_name(database, name, true).exists() && !index_file_name(database, name, false).exists() {
        return IndexStatus::Missing;
    }
    match IndexReader::<V>::open(database, name) {
        Ok(reader) => IndexStatus::Present {
            dense: reader.is_dense(),
            entries: reader.iter().count(),
        },
        Err(e) => IndexStatus::Unreadable(e),
    }
}

/// Display database statistics
pub fn show_stats<W: WriteColor>(database: &Path, out: &mut W) -> Result<()> {
    let meta = DbMeta::load(database)?
        .with_context(|| format!("No database metadata found in '{}'", database.display()))?;

    print_heading(out, "Database Statistics")?;
    writeln!(out)?;
    print_field(out, "Database", database.display())?;
    print_field(out, "Format version", meta.version)?;
    print_field(out, "Offset index", meta.index_type)?;
    print_field(
        out,
        "Location index",
        meta.location_type
            .map(|t| t.to_string())
            .unwrap_or_else(|| "none".to_string()),
    )?;
    print_field(out, "Maps", meta.maps)?;
    print_field(out, "Nodes", meta.counts.nodes)?;
    print_field(out, "Ways", meta.counts.ways)?;
    print_field(out, "Relations", meta.counts.relations)?;
    print_field(out, "Log length", human_size(meta.log_length))?;

    // Entries actually present in each index file
    writeln!(out)?;
    writeln!(out, "Index entries:")?;
    for name in IndexName::ALL {
        let status = match name {
            IndexName::Locations => index_status::<Location>(database, name),
            _ => index_status::<Offset>(database, name),
        };
        match status {
            IndexStatus::Missing => writeln!(out, "  {:15} -", name.as_str())?,
            IndexStatus::Present { dense, entries } => {
                let kind = if dense { "dense" } else { "sparse" };
                writeln!(out, "  {:15} {} ({})", name.as_str(), entries, kind)?;
            }
            IndexStatus::Unreadable(e) => {
                warn!(index = name.as_str(), error = %e, "index can not be read");
                writeln!(out, "  {:15} error: {}", name.as_str(), e)?;
            }
        }
    }

    writeln!(out)?;
    writeln!(out, "Files:")?;
    let mut files: Vec<(String, u64)> = Vec::new();
    let entries = std::fs::read_dir(database)
        .with_context(|| format!("Failed to read database directory '{}'", database.display()))?;
    for entry in entries.flatten() {
        match entry.metadata() {
            Ok(metadata) if metadata.is_file() => {
                files.push((entry.file_name().to_string_lossy().into_owned(), metadata.len()));
            }
            Ok(_) => {}
            Err(e) => warn!(path = %entry.path().display(), error = %e, "can not stat file"),
        }
    }
    files.sort();
    for (name, size) in &files {
        writeln!(out, "  {:24} {}", name, human_size(*size))?;
    }
    let total: u64 = files.iter().map(|(_, size)| size).sum();
    writeln!(out)?;
    print_field(out, "Total size", human_size(total))?;

    writeln!(out)?;
    print_field(out, "Created", utc_time(meta.created_at))?;
    print_field(out, "Updated", utc_time(meta.updated_at))?;

    Ok(())
}

/// Size in binary units, one decimal above a KiB
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// `YYYY-MM-DD hh:mm:ss UTC` for seconds since the epoch
fn utc_time(secs: u64) -> String {
    let days = (secs / 86_400) as i64;
    let rest = secs % 86_400;
    let (year, month, day) = civil_date(days);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        year,
        month,
        day,
        rest / 3600,
        rest % 3600 / 60,
        rest % 60
    )
}

/// Proleptic Gregorian date of a day count since 1970-01-01
fn civil_date(days: i64) -> (i64, u32, u32) {
    // Shift to a calendar starting on 0000-03-01 so leap days end each year
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let day_of_era = z.rem_euclid(146_097);
    let year_of_era = (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let mp = (5 * day_of_year + 2) / 153;
    let day = (day_of_year - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = year_of_era + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::osm::Entity;
    use crate::pipeline::Importer;
    use tempfile::tempdir;
    use termcolor::NoColor;

    fn small_database(dir: &Path) -> Config {
        let config = Config::new(dir.join("db"));
        let mut importer = Importer::create(&config).unwrap();
        importer
            .add_batch(&[Entity::node(1, Location::new(0, 0)), Entity::way(2, vec![1])])
            .unwrap();
        importer.finish().unwrap();
        config
    }

    fn stats_text(database: &Path) -> String {
        let mut out = NoColor::new(Vec::new());
        show_stats(database, &mut out).unwrap();
        String::from_utf8(out.into_inner()).unwrap()
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.5 KiB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MiB");
        assert_eq!(human_size(u64::MAX), "16777216.0 TiB");
    }

    #[test]
    fn test_utc_time() {
        assert_eq!(utc_time(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(utc_time(951_782_400 + 3661), "2000-02-29 01:01:01 UTC");
        assert_eq!(utc_time(1_704_067_199), "2023-12-31 23:59:59 UTC");
    }

    #[test]
    fn test_show_stats() {
        let dir = tempdir().unwrap();
        let config = small_database(dir.path());

        let text = stats_text(&config.database);
        assert!(text.contains("Nodes:           1"), "{}", text);
        assert!(text.contains("  ways            1 (sparse)"), "{}", text);
        assert!(text.contains("  locations       -"), "{}", text);
        assert!(text.contains("data.osr"), "{}", text);
        assert!(text.contains("Total size"), "{}", text);
    }

    #[test]
    fn test_stats_reports_unreadable_index() {
        let dir = tempdir().unwrap();
        let config = small_database(dir.path());
        std::fs::write(index_file_name(&config.database, "locations", false), [0u8; 5]).unwrap();

        let text = stats_text(&config.database);
        assert!(text.contains("  locations       error: "), "{}", text);
        assert!(text.contains("not a multiple"), "{}", text);
        assert!(text.contains("  nodes           1 (sparse)"), "{}", text);
    }

    #[test]
    fn test_stats_without_meta() {
        let dir = tempdir().unwrap();
        let mut out = NoColor::new(Vec::new());
        assert!(show_stats(dir.path(), &mut out).is_err());
    }
}
