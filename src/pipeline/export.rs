//! Export ranges of the log and convert input files into raw records or OPL.

use crate::error::{Error, Result};
use crate::index::Offset;
use crate::log::{LogReader, ObjectLog};
use crate::osm::{opl, EntityReader};
use crate::utils::data_file_name;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Raw log records
    Osr,
    Opl,
}

impl OutputFormat {
    /// `.osr` output is raw, everything else (including stdout) is OPL
    pub fn detect(output: &Path) -> Self {
        match output.extension().and_then(|e| e.to_str()) {
            Some("osr") => OutputFormat::Osr,
            _ => OutputFormat::Opl,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "osr" => Ok(OutputFormat::Osr),
            "opl" => Ok(OutputFormat::Opl),
            other => Err(Error::Config(format!("Unknown output format: '{}'", other))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Osr => "osr",
            OutputFormat::Opl => "opl",
        })
    }
}

/// Write `count` records of the log starting at byte `offset` (0 = to the end)
///
/// `offset` has to be the start of a record. Returns the number of records
/// written.
pub fn export_range(
    database: &Path,
    offset: Offset,
    count: usize,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<usize> {
    let log = LogReader::open(&data_file_name(database))?;
    let limit = if count == 0 { usize::MAX } else { count };
    let output = Path::new("<output>");

    let mut written = 0;
    for record in log.records_from(offset)?.take(limit) {
        let record = record.map_err(|(at, e)| {
            Error::corrupt(log.path(), format!("record at offset {}: {}", at, e))
        })?;
        let result = match format {
            OutputFormat::Osr => out.write_all(record.bytes),
            OutputFormat::Opl => opl::write_entity(out, &record.entity),
        };
        result.map_err(|e| Error::io("Writing output", output, e))?;
        written += 1;
    }
    out.flush().map_err(|e| Error::io("Writing output", output, e))?;

    info!(offset, records = written, format = %format, "exported log range");
    Ok(written)
}

/// How `convert` treats an existing output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Fail if the output exists
    #[default]
    CreateNew,
    Overwrite,
    Append,
}

impl WriteMode {
    pub fn from_flags(overwrite: bool, append: bool) -> Result<Self> {
        match (overwrite, append) {
            (true, true) => Err(Error::Config(
                "Can not use --overwrite and --append together".to_string(),
            )),
            (true, false) => Ok(WriteMode::Overwrite),
            (false, true) => Ok(WriteMode::Append),
            (false, false) => Ok(WriteMode::CreateNew),
        }
    }
}

/// Write every entity of `inputs` to `output` as raw records or OPL
pub fn convert(
    inputs: &[PathBuf],
    output: &Path,
    format: OutputFormat,
    mode: WriteMode,
    batch_size: usize,
) -> Result<u64> {
    if mode == WriteMode::CreateNew && output.exists() {
        return Err(Error::Config(format!(
            "Output file '{}' exists (use --overwrite or --append)",
            output.display()
        )));
    }
    let entities = match format {
        OutputFormat::Osr => convert_to_osr(inputs, output, mode, batch_size)?,
        OutputFormat::Opl => convert_to_opl(inputs, output, mode, batch_size)?,
    };
    info!(output = %output.display(), format = %format, entities, "converted input");
    Ok(entities)
}

fn convert_to_osr(inputs: &[PathBuf], output: &Path, mode: WriteMode, batch_size: usize) -> Result<u64> {
    let mut log = match mode {
        WriteMode::Append if output.exists() => ObjectLog::open_append(output)?,
        _ => ObjectLog::create(output)?,
    };

    let mut entities = 0u64;
    for input in inputs {
        for batch in EntityReader::open(input, batch_size)? {
            for entity in batch? {
                log.append(&entity)?;
                entities += 1;
            }
        }
    }
    log.finish()?;
    Ok(entities)
}

fn convert_to_opl(inputs: &[PathBuf], output: &Path, mode: WriteMode, batch_size: usize) -> Result<u64> {
    let mut options = OpenOptions::new();
    match mode {
        WriteMode::CreateNew => options.write(true).create_new(true),
        WriteMode::Overwrite => options.write(true).create(true).truncate(true),
        WriteMode::Append => options.append(true).create(true),
    };
    let file = options
        .open(output)
        .map_err(|e| Error::io("Creating output file", output, e))?;
    let mut out = BufWriter::new(file);

    let mut entities = 0u64;
    for input in inputs {
        for batch in EntityReader::open(input, batch_size)? {
            for entity in batch? {
                opl::write_entity(&mut out, &entity).map_err(|e| Error::io("Writing output", output, e))?;
                entities += 1;
            }
        }
    }
    let file = out
        .into_inner()
        .map_err(|e| Error::io("Writing output", output, e.into_error()))?;
    file.sync_all()
        .map_err(|e| Error::io("Syncing output file", output, e))?;
    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::osm::{Entity, EntityKind, Location, Member};
    use crate::pipeline::import::run_import;
    use tempfile::tempdir;

    fn sample() -> Vec<Entity> {
        vec![
            Entity::node(1, Location::from_degrees(1.0, 2.0)).with_tag("amenity", "cafe"),
            Entity::node(2, Location::UNDEFINED),
            Entity::way(10, vec![1, 2]),
            Entity::relation(20, vec![Member::new(EntityKind::Way, 10, "outer")]),
        ]
    }

    #[test]
    fn test_export_then_reimport_is_identical() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.osr");
        let mut log = ObjectLog::create(&input).unwrap();
        for entity in sample() {
            log.append(&entity).unwrap();
        }
        log.finish().unwrap();

        let first = Config::new(dir.path().join("first"));
        run_import(&first, &[input.clone()]).unwrap();

        let exported = dir.path().join("exported.osr");
        let mut out = std::fs::File::create(&exported).unwrap();
        assert_eq!(export_range(&first.database, 0, 0, OutputFormat::Osr, &mut out).unwrap(), 4);

        let second = Config::new(dir.path().join("second"));
        run_import(&second, &[exported]).unwrap();
        assert_eq!(
            std::fs::read(data_file_name(&first.database)).unwrap(),
            std::fs::read(data_file_name(&second.database)).unwrap()
        );
        assert_eq!(
            std::fs::read(data_file_name(&first.database)).unwrap(),
            std::fs::read(&input).unwrap()
        );
    }

    #[test]
    fn test_export_offset_and_count() {
        let dir = tempdir().unwrap();
        let database = dir.path().join("db");
        let input = dir.path().join("input.opl");
        std::fs::write(&input, "n1 x1 y1\nn2 x2 y2\nw10 Nn1,n2\n").unwrap();
        run_import(&Config::new(&database), &[input]).unwrap();

        let log = LogReader::open(&data_file_name(&database)).unwrap();
        let second = log.records_from(0).unwrap().nth(1).unwrap().unwrap().offset;

        let mut out = Vec::new();
        assert_eq!(export_range(&database, second, 1, OutputFormat::Opl, &mut out).unwrap(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), "n2 v0 dV T x2.0000000 y2.0000000\n");

        let mut out = Vec::new();
        assert!(matches!(
            export_range(&database, second + 8, 0, OutputFormat::Opl, &mut out),
            Err(Error::Corrupt { .. })
        ));
    }

    #[test]
    fn test_convert_modes() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.opl");
        std::fs::write(&input, "n1 x1 y1\n").unwrap();
        let output = dir.path().join("out.osr");

        assert!(WriteMode::from_flags(true, true).is_err());
        assert_eq!(convert(&[input.clone()], &output, OutputFormat::Osr, WriteMode::CreateNew, 100).unwrap(), 1);
        let one = std::fs::metadata(&output).unwrap().len();
        assert!(matches!(
            convert(&[input.clone()], &output, OutputFormat::Osr, WriteMode::CreateNew, 100),
            Err(Error::Config(_))
        ));

        convert(&[input.clone()], &output, OutputFormat::Osr, WriteMode::Append, 100).unwrap();
        assert_eq!(std::fs::metadata(&output).unwrap().len(), 2 * one);
        convert(&[input], &output, OutputFormat::Osr, WriteMode::Overwrite, 100).unwrap();
        assert_eq!(std::fs::metadata(&output).unwrap().len(), one);
    }

    #[test]
    fn test_convert_osr_to_opl_and_back() {
        let dir = tempdir().unwrap();
        let osr = dir.path().join("sample.osr");
        let mut log = ObjectLog::create(&osr).unwrap();
        for entity in sample() {
            log.append(&entity).unwrap();
        }
        log.finish().unwrap();

        let opl = dir.path().join("sample.opl");
        assert_eq!(convert(&[osr.clone()], &opl, OutputFormat::Opl, WriteMode::CreateNew, 2).unwrap(), 4);
        let text = std::fs::read_to_string(&opl).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.starts_with("n1 v0 dV Tamenity=cafe x1.0000000 y2.0000000\n"), "{}", text);
        assert!(matches!(
            convert(&[osr.clone()], &opl, OutputFormat::Opl, WriteMode::CreateNew, 2),
            Err(Error::Config(_))
        ));

        let back = dir.path().join("back.osr");
        convert(&[opl.clone()], &back, OutputFormat::Osr, WriteMode::CreateNew, 2).unwrap();
        assert_eq!(std::fs::read(&back).unwrap(), std::fs::read(&osr).unwrap());

        convert(&[osr.clone()], &opl, OutputFormat::Opl, WriteMode::Append, 2).unwrap();
        assert_eq!(std::fs::read_to_string(&opl).unwrap(), text.repeat(2));
        convert(&[osr], &opl, OutputFormat::Opl, WriteMode::Overwrite, 2).unwrap();
        assert_eq!(std::fs::read_to_string(&opl).unwrap(), text);
    }
}
