//! Minimal OPL ("object per line") text format.
//!
//! ```text
//! n5 v1 dV Tname=Corner%20%shop x1.0000000 y2.0000000
//! w10 v1 dV Thighway=residential Nn1,n2,n3
//! r20 v1 dV Ttype=route Mn1@stop,w10@
//! ```
//!
//! Only the fields the database stores are interpreted (`v`, `d`, `T`, `x`,
//! `y`, `N`, `M`). Changeset, timestamp and user fields are accepted and
//! ignored. Blank lines and lines starting with `#` are skipped.

use super::types::{format_fixed, parse_fixed, Body, Entity, EntityKind, Location, Member, Tag};
use std::fmt::Write as _;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

fn err<T>(msg: impl Into<String>) -> Result<T, ParseError> {
    Err(ParseError(msg.into()))
}

/// Parse one line; `Ok(None)` for blank and comment lines
pub fn parse_line(line: &str) -> Result<Option<Entity>, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split(' ').filter(|f| !f.is_empty());
    let first = match fields.next() {
        Some(f) => f,
        None => return Ok(None),
    };

    let mut chars = first.chars();
    let kind = chars
        .next()
        .and_then(EntityKind::from_char)
        .ok_or_else(|| ParseError(format!("unknown object type in '{}'", first)))?;
    let id: i64 = chars
        .as_str()
        .parse()
        .map_err(|_| ParseError(format!("invalid id '{}'", chars.as_str())))?;

    let mut version = 0u32;
    let mut deleted = false;
    let mut tags = Vec::new();
    let mut x: Option<i32> = None;
    let mut y: Option<i32> = None;
    let mut nodes = Vec::new();
    let mut members = Vec::new();

    for field in fields {
        let mut field_chars = field.chars();
        let tag = field_chars.next().unwrap_or(' ');
        let value = field_chars.as_str();
        match tag {
            'v' => {
                version = value
                    .parse()
                    .map_err(|_| ParseError(format!("invalid version '{}'", value)))?
            }
            'd' => {
                deleted = match value {
                    "V" => false,
                    "D" => true,
                    _ => return err(format!("invalid visibility '{}'", value)),
                }
            }
            'c' | 't' | 'i' | 'u' => {}
            'T' => tags = parse_tags(value)?,
            'x' if kind == EntityKind::Node => x = parse_coordinate(value)?,
            'y' if kind == EntityKind::Node => y = parse_coordinate(value)?,
            'N' if kind == EntityKind::Way => nodes = parse_nodes(value)?,
            'M' if kind == EntityKind::Relation => members = parse_members(value)?,
            _ => return err(format!("unexpected field '{}' for {}", field, kind)),
        }
    }

    let body = match kind {
        EntityKind::Node => {
            let location = match (x, y) {
                (Some(x), Some(y)) => Location::new(x, y),
                (None, None) => Location::UNDEFINED,
                _ => return err("node needs both x and y or neither"),
            };
            Body::Node { location }
        }
        EntityKind::Way => Body::Way { nodes },
        EntityKind::Relation => Body::Relation { members },
    };

    Ok(Some(Entity {
        id,
        version,
        deleted,
        tags,
        body,
    }))
}

fn parse_coordinate(value: &str) -> Result<Option<i32>, ParseError> {
    if value.is_empty() {
        return Ok(None);
    }
    match parse_fixed(value) {
        Some(v) => Ok(Some(v)),
        None => err(format!("invalid coordinate '{}'", value)),
    }
}

fn parse_tags(value: &str) -> Result<Vec<Tag>, ParseError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(|pair| {
            let (k, v) = pair
                .split_once('=')
                .ok_or_else(|| ParseError(format!("tag without '=': '{}'", pair)))?;
            Ok(Tag::new(unescape(k)?, unescape(v)?))
        })
        .collect()
}

fn parse_nodes(value: &str) -> Result<Vec<i64>, ParseError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(|node| {
            node.strip_prefix('n')
                .and_then(|id| id.parse().ok())
                .ok_or_else(|| ParseError(format!("invalid node reference '{}'", node)))
        })
        .collect()
}

fn parse_members(value: &str) -> Result<Vec<Member>, ParseError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(|member| {
            let (reference, role) = member
                .split_once('@')
                .ok_or_else(|| ParseError(format!("member without '@': '{}'", member)))?;
            let mut chars = reference.chars();
            let kind = chars
                .next()
                .and_then(EntityKind::from_char)
                .ok_or_else(|| ParseError(format!("invalid member type in '{}'", member)))?;
            let id = chars
                .as_str()
                .parse()
                .map_err(|_| ParseError(format!("invalid member id in '{}'", member)))?;
            Ok(Member::new(kind, id, unescape(role)?))
        })
        .collect()
}

fn needs_escape(c: char) -> bool {
    c.is_whitespace() || c.is_control() || matches!(c, ',' | '=' | '@' | '%')
}

/// Escape `%`, separators and whitespace as `%<hex codepoint>%`
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if needs_escape(c) {
            let _ = write!(out, "%{:x}%", c as u32);
        } else {
            out.push(c);
        }
    }
    out
}

pub fn unescape(text: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('%')
            .ok_or_else(|| ParseError(format!("unterminated escape in '{}'", text)))?;
        let c = u32::from_str_radix(&after[..end], 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| ParseError(format!("invalid escape '%{}%'", &after[..end])))?;
        out.push(c);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Format one entity as an OPL line (without newline)
pub fn format_entity(entity: &Entity) -> String {
    let mut line = String::new();
    let _ = write!(
        line,
        "{}{} v{} d{} T",
        entity.kind().to_char(),
        entity.id,
        entity.version,
        if entity.deleted { 'D' } else { 'V' }
    );

    for (i, tag) in entity.tags.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        let _ = write!(line, "{}={}", escape(&tag.key), escape(&tag.value));
    }

    match &entity.body {
        Body::Node { location } => {
            if location.is_defined() {
                let _ = write!(line, " x{} y{}", format_fixed(location.x), format_fixed(location.y));
            } else {
                line.push_str(" x y");
            }
        }
        Body::Way { nodes } => {
            line.push_str(" N");
            for (i, node) in nodes.iter().enumerate() {
                if i > 0 {
                    line.push(',');
                }
                let _ = write!(line, "n{}", node);
            }
        }
        Body::Relation { members } => {
            line.push_str(" M");
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    line.push(',');
                }
                let _ = write!(line, "{}{}@{}", member.kind.to_char(), member.id, escape(&member.role));
            }
        }
    }

    line
}

pub fn write_entity<W: Write + ?Sized>(out: &mut W, entity: &Entity) -> io::Result<()> {
    writeln!(out, "{}", format_entity(entity))
}
