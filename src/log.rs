//! The append-only object log (`data.osr`).
//!
//! Records are appended back to back; the offset of a record is the log
//! length just before it was written. Nothing is ever rewritten in place.

use crate::error::{Error, Result};
use crate::index::Offset;
use crate::osm::record::{self, Records, RECORD_ALIGN};
use crate::osm::Entity;
use crate::utils::MappedFile;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writing end of the object log
pub struct ObjectLog {
    path: PathBuf,
    out: BufWriter<File>,
    cursor: Offset,
    buf: Vec<u8>,
}

impl ObjectLog {
    /// Create an empty log, truncating an existing file
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| Error::io("Creating data file", path, e))?;
        Ok(Self::with_file(path, file, 0))
    }

    /// Open an existing log for appending; the cursor starts at its length
    pub fn open_append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| Error::io("Opening data file", path, e))?;
        let len = file
            .metadata()
            .map_err(|e| Error::io("Getting length of data file", path, e))?
            .len();
        if len % RECORD_ALIGN as u64 != 0 {
            return Err(Error::corrupt(
                path,
                format!("length {} is not a multiple of {}", len, RECORD_ALIGN),
            ));
        }
        Ok(Self::with_file(path, file, len))
    }

    fn with_file(path: &Path, file: File, cursor: Offset) -> Self {
        Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            cursor,
            buf: Vec::with_capacity(4096),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the log, which is the offset of the next record
    pub fn offset(&self) -> Offset {
        self.cursor
    }

    /// Append one entity, returning the offset its record starts at
    pub fn append(&mut self, entity: &Entity) -> Result<Offset> {
        self.buf.clear();
        record::encode(entity, &mut self.buf)?;
        self.write_buf()
    }

    /// Append an already encoded record
    pub fn append_record(&mut self, bytes: &[u8]) -> Result<Offset> {
        self.buf.clear();
        self.buf.extend_from_slice(bytes);
        self.write_buf()
    }

    fn write_buf(&mut self) -> Result<Offset> {
        let offset = self.cursor;
        self.out
            .write_all(&self.buf)
            .map_err(|e| Error::io("Writing data file", &self.path, e))?;
        self.cursor += self.buf.len() as u64;
        Ok(offset)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out
            .flush()
            .map_err(|e| Error::io("Writing data file", &self.path, e))
    }

    /// Flush buffered records and sync the file to disk
    pub fn finish(mut self) -> Result<Offset> {
        self.flush()?;
        self.out
            .get_ref()
            .sync_all()
            .map_err(|e| Error::io("Syncing data file", &self.path, e))?;
        Ok(self.cursor)
    }
}

/// Read-only view of the object log
pub struct LogReader {
    file: MappedFile,
}

impl LogReader {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            file: MappedFile::open(path)?,
        })
    }

    pub fn len(&self) -> u64 {
        self.file.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_empty()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    fn tail(&self, offset: Offset) -> Result<&[u8]> {
        if offset > self.len() {
            return Err(Error::corrupt(
                self.path(),
                format!("offset {} is past the end of the log ({})", offset, self.len()),
            ));
        }
        Ok(&self.file.data()[offset as usize..])
    }

    /// Raw bytes of the record starting at `offset`
    pub fn record_at(&self, offset: Offset) -> Result<&[u8]> {
        let tail = self.tail(offset)?;
        let header = record::peek_header(tail)
            .map_err(|e| Error::corrupt(self.path(), format!("record at offset {}: {}", offset, e)))?;
        tail.get(..header.length).ok_or_else(|| {
            Error::corrupt(self.path(), format!("record at offset {} is truncated", offset))
        })
    }

    /// Decode the record starting at `offset`
    pub fn entity_at(&self, offset: Offset) -> Result<Entity> {
        let tail = self.tail(offset)?;
        record::decode(tail)
            .map(|(entity, _)| entity)
            .map_err(|e| Error::corrupt(self.path(), format!("record at offset {}: {}", offset, e)))
    }

    /// Walk records from `offset` to the end of the log
    ///
    /// `offset` has to be a record boundary; the walk stops at the first
    /// record that fails to decode.
    pub fn records_from(&self, offset: Offset) -> Result<Records<'_>> {
        Ok(Records::new(self.tail(offset)?, offset))
    }

    pub fn close(self) -> Result<()> {
        self.file.close()
    }
}
