//! Binary record format of the object log.
//!
//! ```text
//! 0   u32  record length (header + body + tags + padding, multiple of 8)
//! 4   u8   kind
//! 5   u8   flags (bit 0: deleted)
//! 6   u16  tag count
//! 8   i64  id
//! 16  u32  version
//! 20  u32  item count (way nodes / relation members, 0 for nodes)
//! 24  ...  body, tags, zero padding
//! ```
//!
//! Decoding is strict so that `encode(decode(bytes)) == bytes` holds for
//! every record the decoder accepts.

use super::types::{Body, Entity, EntityKind, Location, Member, Tag};
use crate::error::{Error, Result};
use crate::utils::{get_i32_le, get_i64_le, get_u16_le, get_u32_le, pad_to, padded_len};
use thiserror::Error;

pub const RECORD_ALIGN: usize = 8;
pub const HEADER_SIZE: usize = 24;

const FLAG_DELETED: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("record truncated at byte {at}: need {need} bytes, {have} available")]
    Truncated { at: usize, need: usize, have: usize },
    #[error("invalid record length {0}")]
    BadLength(u32),
    #[error("unknown object kind {0}")]
    BadKind(u8),
    #[error("unknown flags {0:#04x}")]
    BadFlags(u8),
    #[error("invalid member kind {0}")]
    BadMemberKind(u8),
    #[error("non-zero reserved byte")]
    Reserved,
    #[error("string is not valid UTF-8")]
    Utf8,
    #[error("record content ends at {content} but length is {length}")]
    LengthMismatch { content: usize, length: usize },
}

/// Fixed part of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub length: usize,
    pub kind: EntityKind,
    pub id: i64,
}

/// Read the header of the record starting at `buf[0]`
pub fn peek_header(buf: &[u8]) -> std::result::Result<RecordHeader, DecodeError> {
    if buf.len() < HEADER_SIZE {
        return Err(DecodeError::Truncated {
            at: 0,
            need: HEADER_SIZE,
            have: buf.len(),
        });
    }
    let length = get_u32_le(buf, 0).unwrap_or(0);
    if (length as usize) < HEADER_SIZE || length as usize % RECORD_ALIGN != 0 {
        return Err(DecodeError::BadLength(length));
    }
    let kind = EntityKind::from_u8(buf[4]).ok_or(DecodeError::BadKind(buf[4]))?;
    let id = get_i64_le(buf, 8).unwrap_or(0);
    Ok(RecordHeader {
        length: length as usize,
        kind,
        id,
    })
}

/// Append the record for `entity` to `buf`, returning the record length
pub fn encode(entity: &Entity, buf: &mut Vec<u8>) -> Result<usize> {
    let start = buf.len();
    let invalid = |reason: &str| Error::InvalidEntity {
        kind: entity.kind().name(),
        id: entity.id,
        reason: reason.to_string(),
    };

    let item_count = match &entity.body {
        Body::Node { .. } => 0,
        Body::Way { nodes } => nodes.len(),
        Body::Relation { members } => members.len(),
    };
    let item_count = u32::try_from(item_count).map_err(|_| invalid("too many items"))?;
    let tag_count = u16::try_from(entity.tags.len()).map_err(|_| invalid("too many tags"))?;

    buf.extend_from_slice(&0u32.to_le_bytes()); // patched below
    buf.push(entity.kind() as u8);
    buf.push(if entity.deleted { FLAG_DELETED } else { 0 });
    buf.extend_from_slice(&tag_count.to_le_bytes());
    buf.extend_from_slice(&entity.id.to_le_bytes());
    buf.extend_from_slice(&entity.version.to_le_bytes());
    buf.extend_from_slice(&item_count.to_le_bytes());

    match &entity.body {
        Body::Node { location } => {
            buf.extend_from_slice(&location.x.to_le_bytes());
            buf.extend_from_slice(&location.y.to_le_bytes());
        }
        Body::Way { nodes } => {
            for node in nodes {
                buf.extend_from_slice(&node.to_le_bytes());
            }
        }
        Body::Relation { members } => {
            for member in members {
                let role_len =
                    u16::try_from(member.role.len()).map_err(|_| invalid("member role too long"))?;
                buf.extend_from_slice(&member.id.to_le_bytes());
                buf.push(member.kind as u8);
                buf.push(0);
                buf.extend_from_slice(&role_len.to_le_bytes());
                buf.extend_from_slice(member.role.as_bytes());
            }
        }
    }

    for tag in &entity.tags {
        let key_len = u16::try_from(tag.key.len()).map_err(|_| invalid("tag key too long"))?;
        let value_len = u16::try_from(tag.value.len()).map_err(|_| invalid("tag value too long"))?;
        buf.extend_from_slice(&key_len.to_le_bytes());
        buf.extend_from_slice(&value_len.to_le_bytes());
        buf.extend_from_slice(tag.key.as_bytes());
        buf.extend_from_slice(tag.value.as_bytes());
    }

    pad_to(buf, RECORD_ALIGN);
    let length = buf.len() - start;
    let length_u32 = match u32::try_from(length) {
        Ok(len) => len,
        Err(_) => {
            buf.truncate(start);
            return Err(invalid("record exceeds 4 GiB"));
        }
    };
    buf[start..start + 4].copy_from_slice(&length_u32.to_le_bytes());
    Ok(length)
}

/// Encoded size of `entity` without materializing the record
pub fn encoded_len(entity: &Entity) -> usize {
    let body = match &entity.body {
        Body::Node { .. } => 8,
        Body::Way { nodes } => nodes.len() * 8,
        Body::Relation { members } => members.iter().map(|m| 12 + m.role.len()).sum(),
    };
    let tags: usize = entity.tags.iter().map(|t| 4 + t.key.len() + t.value.len()).sum();
    padded_len(HEADER_SIZE + body + tags, RECORD_ALIGN)
}

/// Bounds-checked reader over one record
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> std::result::Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len()).ok_or(
            DecodeError::Truncated {
                at: self.pos,
                need: n,
                have: self.buf.len().saturating_sub(self.pos),
            },
        )?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> std::result::Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> std::result::Result<u16, DecodeError> {
        let at = self.pos;
        self.take(2)?;
        Ok(get_u16_le(self.buf, at).unwrap_or(0))
    }

    fn i32(&mut self) -> std::result::Result<i32, DecodeError> {
        let at = self.pos;
        self.take(4)?;
        Ok(get_i32_le(self.buf, at).unwrap_or(0))
    }

    fn i64(&mut self) -> std::result::Result<i64, DecodeError> {
        let at = self.pos;
        self.take(8)?;
        Ok(get_i64_le(self.buf, at).unwrap_or(0))
    }

    fn string(&mut self, len: usize) -> std::result::Result<String, DecodeError> {
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::Utf8)
    }
}

/// Decode the record at `buf[0]`; returns the entity and the record length
pub fn decode(buf: &[u8]) -> std::result::Result<(Entity, usize), DecodeError> {
    let header = peek_header(buf)?;
    if buf.len() < header.length {
        return Err(DecodeError::Truncated {
            at: 0,
            need: header.length,
            have: buf.len(),
        });
    }
    let record = &buf[..header.length];

    let flags = record[5];
    if flags & !FLAG_DELETED != 0 {
        return Err(DecodeError::BadFlags(flags));
    }
    let tag_count = get_u16_le(record, 6).unwrap_or(0) as usize;
    let version = get_u32_le(record, 16).unwrap_or(0);
    let item_count = get_u32_le(record, 20).unwrap_or(0) as usize;

    let mut cur = Cursor {
        buf: record,
        pos: HEADER_SIZE,
    };

    let body = match header.kind {
        EntityKind::Node => {
            if item_count != 0 {
                return Err(DecodeError::Reserved);
            }
            let x = cur.i32()?;
            let y = cur.i32()?;
            Body::Node {
                location: Location::new(x, y),
            }
        }
        EntityKind::Way => {
            let mut nodes = Vec::with_capacity(item_count.min(record.len() / 8));
            for _ in 0..item_count {
                nodes.push(cur.i64()?);
            }
            Body::Way { nodes }
        }
        EntityKind::Relation => {
            let mut members = Vec::with_capacity(item_count.min(record.len() / 12));
            for _ in 0..item_count {
                let id = cur.i64()?;
                let raw_kind = cur.u8()?;
                let kind = EntityKind::from_u8(raw_kind).ok_or(DecodeError::BadMemberKind(raw_kind))?;
                if cur.u8()? != 0 {
                    return Err(DecodeError::Reserved);
                }
                let role_len = cur.u16()? as usize;
                let role = cur.string(role_len)?;
                members.push(Member { kind, id, role });
            }
            Body::Relation { members }
        }
    };

    let mut tags = Vec::with_capacity(tag_count.min(record.len() / 4));
    for _ in 0..tag_count {
        let key_len = cur.u16()? as usize;
        let value_len = cur.u16()? as usize;
        let key = cur.string(key_len)?;
        let value = cur.string(value_len)?;
        tags.push(Tag { key, value });
    }

    if padded_len(cur.pos, RECORD_ALIGN) != header.length {
        return Err(DecodeError::LengthMismatch {
            content: cur.pos,
            length: header.length,
        });
    }
    if record[cur.pos..].iter().any(|&b| b != 0) {
        return Err(DecodeError::Reserved);
    }

    let entity = Entity {
        id: header.id,
        version,
        deleted: flags & FLAG_DELETED != 0,
        tags,
        body,
    };
    Ok((entity, header.length))
}

/// A record found while walking a buffer of concatenated records
#[derive(Debug)]
pub struct RawRecord<'a> {
    /// Byte position of the record relative to the walk origin
    pub offset: u64,
    pub bytes: &'a [u8],
    pub entity: Entity,
}

/// Iterator over concatenated records
///
/// Stops after the first decoding error, which it yields together with the
/// offending position.
pub struct Records<'a> {
    buf: &'a [u8],
    pos: usize,
    base: u64,
    failed: bool,
}

impl<'a> Records<'a> {
    /// Walk `buf`, reporting offsets as `base + position`
    pub fn new(buf: &'a [u8], base: u64) -> Self {
        Self {
            buf,
            pos: 0,
            base,
            failed: false,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = std::result::Result<RawRecord<'a>, (u64, DecodeError)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.buf.len() {
            return None;
        }
        let offset = self.base + self.pos as u64;
        match decode(&self.buf[self.pos..]) {
            Ok((entity, len)) => {
                let bytes = &self.buf[self.pos..self.pos + len];
                self.pos += len;
                Some(Ok(RawRecord {
                    offset,
                    bytes,
                    entity,
                }))
            }
            Err(err) => {
                self.failed = true;
                Some(Err((offset, err)))
            }
        }
    }
}
