use serde::{Deserialize, Serialize};
use std::fmt;

/// Unsigned object identifier used as index key (absolute value of an OSM id)
pub type ObjectId = u64;

/// Signed identifier as it appears in input data
pub type SignedId = i64;

/// Fixed-point units per degree of longitude/latitude
pub const COORDINATE_PRECISION: i32 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityKind {
    Node = 1,
    Way = 2,
    Relation = 3,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Node, EntityKind::Way, EntityKind::Relation];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(EntityKind::Node),
            2 => Some(EntityKind::Way),
            3 => Some(EntityKind::Relation),
            _ => None,
        }
    }

    /// One-letter prefix used by the OPL text format
    pub fn to_char(self) -> char {
        match self {
            EntityKind::Node => 'n',
            EntityKind::Way => 'w',
            EntityKind::Relation => 'r',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'n' => Some(EntityKind::Node),
            'w' => Some(EntityKind::Way),
            'r' => Some(EntityKind::Relation),
            _ => None,
        }
    }

    /// Name of the offset index holding this kind
    pub fn index_name(self) -> &'static str {
        match self {
            EntityKind::Node => "nodes",
            EntityKind::Way => "ways",
            EntityKind::Relation => "relations",
        }
    }
}

impl EntityKind {
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Way => "way",
            EntityKind::Relation => "relation",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A coordinate as two fixed-point integers (1e-7 degree units)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub const UNDEFINED: Location = Location {
        x: i32::MAX,
        y: i32::MAX,
    };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn from_degrees(lon: f64, lat: f64) -> Self {
        Self {
            x: degrees_to_fixed(lon),
            y: degrees_to_fixed(lat),
        }
    }

    pub fn is_defined(&self) -> bool {
        *self != Location::UNDEFINED
    }

    /// Within the valid longitude/latitude ranges
    pub fn is_valid(&self) -> bool {
        (-180 * COORDINATE_PRECISION..=180 * COORDINATE_PRECISION).contains(&self.x)
            && (-90 * COORDINATE_PRECISION..=90 * COORDINATE_PRECISION).contains(&self.y)
    }

    pub fn lon(&self) -> f64 {
        fixed_to_degrees(self.x)
    }

    pub fn lat(&self) -> f64 {
        fixed_to_degrees(self.y)
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::UNDEFINED
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_defined() {
            write!(f, "({},{})", format_fixed(self.x), format_fixed(self.y))
        } else {
            f.write_str("(undefined,undefined)")
        }
    }
}

fn degrees_to_fixed(value: f64) -> i32 {
    (value * COORDINATE_PRECISION as f64).round() as i32
}

fn fixed_to_degrees(value: i32) -> f64 {
    value as f64 / COORDINATE_PRECISION as f64
}

/// Exact decimal rendering of a fixed-point coordinate with 7 fraction digits
pub fn format_fixed(value: i32) -> String {
    let abs = (value as i64).abs();
    let sign = if value < 0 { "-" } else { "" };
    let precision = COORDINATE_PRECISION as i64;
    format!("{}{}.{:07}", sign, abs / precision, abs % precision)
}

/// Parse a decimal coordinate without going through floating point
pub fn parse_fixed(text: &str) -> Option<i32> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if frac_part.len() > 7
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let int_value: i64 = if int_part.is_empty() { 0 } else { int_part.parse().ok()? };
    let mut frac_value: i64 = if frac_part.is_empty() { 0 } else { frac_part.parse().ok()? };
    for _ in frac_part.len()..7 {
        frac_value *= 10;
    }

    let magnitude = int_value.checked_mul(COORDINATE_PRECISION as i64)?.checked_add(frac_value)?;
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Relation member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub kind: EntityKind,
    pub id: SignedId,
    pub role: String,
}

impl Member {
    pub fn new(kind: EntityKind, id: SignedId, role: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            role: role.into(),
        }
    }

    pub fn positive_id(&self) -> ObjectId {
        self.id.unsigned_abs()
    }
}

/// Kind-specific content of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Node { location: Location },
    Way { nodes: Vec<SignedId> },
    Relation { members: Vec<Member> },
}

/// A node, way or relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: SignedId,
    pub version: u32,
    pub deleted: bool,
    pub tags: Vec<Tag>,
    pub body: Body,
}

impl Entity {
    pub fn node(id: SignedId, location: Location) -> Self {
        Self::with_body(id, Body::Node { location })
    }

    pub fn way(id: SignedId, nodes: Vec<SignedId>) -> Self {
        Self::with_body(id, Body::Way { nodes })
    }

    pub fn relation(id: SignedId, members: Vec<Member>) -> Self {
        Self::with_body(id, Body::Relation { members })
    }

    fn with_body(id: SignedId, body: Body) -> Self {
        Self {
            id,
            version: 0,
            deleted: false,
            tags: Vec::new(),
            body,
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    pub fn kind(&self) -> EntityKind {
        match self.body {
            Body::Node { .. } => EntityKind::Node,
            Body::Way { .. } => EntityKind::Way,
            Body::Relation { .. } => EntityKind::Relation,
        }
    }

    /// Identifier with the sign stripped, as used for index keys
    pub fn positive_id(&self) -> ObjectId {
        self.id.unsigned_abs()
    }

    pub fn location(&self) -> Option<Location> {
        match self.body {
            Body::Node { location } => Some(location),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_formatting() {
        assert_eq!(format_fixed(10_000_000), "1.0000000");
        assert_eq!(format_fixed(-5), "-0.0000005");
        assert_eq!(format_fixed(-1_234_567_890), "-123.4567890");
    }

    #[test]
    fn test_fixed_point_parsing() {
        assert_eq!(parse_fixed("1.0"), Some(10_000_000));
        assert_eq!(parse_fixed("-0.0000005"), Some(-5));
        assert_eq!(parse_fixed("2"), Some(20_000_000));
        assert_eq!(parse_fixed("1.23456789"), None);
        assert_eq!(parse_fixed("abc"), None);
        assert_eq!(parse_fixed("-"), None);
        // 300 degrees does not fit the fixed-point range
        assert_eq!(parse_fixed("300"), None);
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::from_degrees(1.0, 2.0).to_string(), "(1.0000000,2.0000000)");
        assert_eq!(Location::UNDEFINED.to_string(), "(undefined,undefined)");
        assert!(!Location::UNDEFINED.is_valid());
        assert!(Location::new(0, 0).is_valid());
    }

    #[test]
    fn test_positive_id() {
        assert_eq!(Entity::node(-42, Location::new(0, 0)).positive_id(), 42);
        assert_eq!(Entity::way(7, vec![1, 2]).kind(), EntityKind::Way);
    }
}
