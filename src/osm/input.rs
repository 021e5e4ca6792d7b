//! Batched entity input from raw record files (`.osr`) or OPL text.

use super::opl;
use super::record;
use super::types::Entity;
use crate::error::{Error, Result};
use crate::utils::MappedFile;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Concatenated log records, as written by `convert` or `export -f osr`
    Osr,
    Opl,
}

impl InputFormat {
    /// `.osr` files are raw records, everything else (including stdin) is OPL
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("osr") => InputFormat::Osr,
            _ => InputFormat::Opl,
        }
    }
}

enum Source {
    Osr { file: MappedFile, pos: usize },
    Opl { reader: Box<dyn BufRead>, line_no: usize },
}

/// Reads entities from one input file in batches of at most `batch_size`
pub struct EntityReader {
    path: PathBuf,
    source: Source,
    batch_size: usize,
    done: bool,
}

impl EntityReader {
    /// Open `path`; `-` reads OPL from stdin
    pub fn open(path: &Path, batch_size: usize) -> Result<Self> {
        let source = if path == Path::new("-") {
            Source::Opl {
                reader: Box::new(BufReader::new(io::stdin())),
                line_no: 0,
            }
        } else {
            match InputFormat::detect(path) {
                InputFormat::Osr => Source::Osr {
                    file: MappedFile::open(path)?,
                    pos: 0,
                },
                InputFormat::Opl => {
                    let file = File::open(path).map_err(|e| Error::io("Opening input file", path, e))?;
                    Source::Opl {
                        reader: Box::new(BufReader::new(file)),
                        line_no: 0,
                    }
                }
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            source,
            batch_size: batch_size.max(1),
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next batch, `None` at end of input
    pub fn read_batch(&mut self) -> Result<Option<Vec<Entity>>> {
        if self.done {
            return Ok(None);
        }

        let mut batch = Vec::with_capacity(self.batch_size.min(4096));
        match &mut self.source {
            Source::Osr { file, pos } => {
                for item in record::Records::new(&file.data()[*pos..], *pos as u64) {
                    let raw = item.map_err(|(offset, e)| {
                        Error::corrupt(&self.path, format!("record at offset {}: {}", offset, e))
                    })?;
                    *pos += raw.bytes.len();
                    batch.push(raw.entity);
                    if batch.len() >= self.batch_size {
                        break;
                    }
                }
            }
            Source::Opl { reader, line_no } => {
                let mut line = String::new();
                while batch.len() < self.batch_size {
                    line.clear();
                    let n = reader
                        .read_line(&mut line)
                        .map_err(|e| Error::io("Reading input file", &self.path, e))?;
                    if n == 0 {
                        break;
                    }
                    *line_no += 1;
                    let parsed = opl::parse_line(&line)
                        .map_err(|e| Error::corrupt(&self.path, format!("line {}: {}", line_no, e)))?;
                    if let Some(entity) = parsed {
                        batch.push(entity);
                    }
                }
            }
        }

        if batch.is_empty() {
            self.done = true;
            return Ok(None);
        }
        Ok(Some(batch))
    }
}

impl Iterator for EntityReader {
    type Item = Result<Vec<Entity>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osm::types::Location;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_opl_batches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("input.opl");
        fs::write(&path, "# comment\nn1 x1.0 y1.0\nn2 x2.0 y2.0\n\nw10 Nn1,n2\n").unwrap();

        let batches: Vec<Vec<Entity>> = EntityReader::open(&path, 2)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1][0].id, 10);
    }

    #[test]
    fn test_osr_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("input.osr");
        let mut buf = Vec::new();
        for id in 1..=5 {
            record::encode(&Entity::node(id, Location::new(id as i32, 0)), &mut buf).unwrap();
        }
        fs::write(&path, &buf).unwrap();

        let mut reader = EntityReader::open(&path, 3).unwrap();
        assert_eq!(reader.read_batch().unwrap().unwrap().len(), 3);
        assert_eq!(reader.read_batch().unwrap().unwrap().len(), 2);
        assert!(reader.read_batch().unwrap().is_none());
    }

    #[test]
    fn test_parse_error_reports_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.opl");
        fs::write(&path, "n1 x1 y1\nq7\n").unwrap();

        let err = EntityReader::open(&path, 10).unwrap().read_batch().unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
    }
}
