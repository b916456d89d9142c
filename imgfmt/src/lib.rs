//! Writers for the subdivision tree and the MDR1 map index of the tiled IMG
//! map format.
//!
//! The subdivision tree divides a map into rectangles per zoom level. Each
//! rectangle is serialized as a fixed 14 or 16 byte record, see
//! [`encode_subdivision`]. MDR1 lists the maps of an index file and points
//! each one at a reverse index of its records in the shared MDR sections.

use std::fmt;

mod common;
mod consts;
mod decoder;
mod encoder;
mod mdr1;
mod subdivision;
mod tree;
mod writer;

pub use consts::{
    FULL_COORD_BITS, MAX_EXTENT, MAX_MAP_UNIT, MAX_RGN_POINTER, MIN_MAP_UNIT,
    SUBDIVISION_RECORD_LENGTH, SUBDIVISION_RECORD_WITH_CHILDREN_LENGTH,
};
pub use decoder::{decode_mdr1_records, decode_subdivision};
pub use encoder::encode_subdivision;
pub use mdr1::{Mdr1, Mdr1Record, Mdr1SubSection, MdrConfig, RecordList};
pub use subdivision::{FeatureKind, FeatureSet, Subdivision, SubdivisionRecord};
pub use tree::{SubdivisionId, SubdivisionTree};
pub use writer::{BufferWriter, ImgFileWriter, StreamWriter};

/// One layer of map detail.
///
/// Level numbers grow toward coarser detail. `bits_per_coord` is the
/// precision coordinates are stored with at this level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Zoom {
    level: u8,
    bits_per_coord: u8,
}

impl Zoom {
    pub fn new(level: u8, bits_per_coord: u8) -> Result<Self> {
        if bits_per_coord == 0 || bits_per_coord > FULL_COORD_BITS {
            return Err(ImgError::new(
                ImgErrorCode::InvalidZoomLevel,
                format!("bits_per_coord must be in 1..=24, got {bits_per_coord}."),
            ));
        }
        Ok(Self {
            level,
            bits_per_coord,
        })
    }

    pub fn level(self) -> u8 {
        self.level
    }

    pub fn bits_per_coord(self) -> u8 {
        self.bits_per_coord
    }

    /// Number of bits full-precision values are shifted right by at this level.
    pub fn shift(self) -> u8 {
        FULL_COORD_BITS - self.bits_per_coord
    }
}

/// The zoom levels used by one map, ordered from finest to coarsest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomCatalog {
    levels: Vec<Zoom>,
}

impl ZoomCatalog {
    pub fn new(levels: impl IntoIterator<Item = Zoom>) -> Result<Self> {
        let mut levels: Vec<Zoom> = levels.into_iter().collect();
        if levels.is_empty() {
            return Err(ImgError::new(
                ImgErrorCode::InvalidZoomLevel,
                "A map needs at least one zoom level.",
            ));
        }
        levels.sort_by_key(|zoom| zoom.level);

        for pair in levels.windows(2) {
            let (finer, coarser) = (pair[0], pair[1]);
            if finer.level == coarser.level {
                return Err(ImgError::new(
                    ImgErrorCode::InvalidZoomLevel,
                    format!("Zoom level {} is defined more than once.", finer.level),
                ));
            }
            if coarser.bits_per_coord > finer.bits_per_coord {
                return Err(ImgError::new(
                    ImgErrorCode::InvalidZoomLevel,
                    format!(
                        "Zoom level {} has more bits per coord ({}) than finer level {} ({}).",
                        coarser.level, coarser.bits_per_coord, finer.level, finer.bits_per_coord
                    ),
                ));
            }
        }

        Ok(Self { levels })
    }

    /// The least detailed level; top-level subdivisions live here.
    pub fn coarsest(&self) -> Zoom {
        self.levels[self.levels.len() - 1]
    }

    pub fn finest(&self) -> Zoom {
        self.levels[0]
    }

    pub fn get(&self, level: u8) -> Option<Zoom> {
        self.levels.iter().copied().find(|zoom| zoom.level == level)
    }

    pub fn contains(&self, zoom: Zoom) -> bool {
        self.levels.contains(&zoom)
    }

    pub fn iter(&self) -> impl Iterator<Item = Zoom> + '_ {
        self.levels.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Unshifted bounding rectangle in 24-bit map units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Area {
    pub min_lat: i32,
    pub min_long: i32,
    pub max_lat: i32,
    pub max_long: i32,
}

impl Area {
    pub fn new(min_lat: i32, min_long: i32, max_lat: i32, max_long: i32) -> Self {
        Self {
            min_lat,
            min_long,
            max_lat,
            max_long,
        }
    }

    fn validate(self) -> Result<()> {
        for (name, value) in [
            ("min_lat", self.min_lat),
            ("min_long", self.min_long),
            ("max_lat", self.max_lat),
            ("max_long", self.max_long),
        ] {
            common::validate_map_unit(name, value)?;
        }
        if self.min_lat > self.max_lat || self.min_long > self.max_long {
            return Err(ImgError::new(
                ImgErrorCode::InvalidFieldValue,
                format!("Area minimum exceeds maximum: {self:?}."),
            ));
        }
        Ok(())
    }

    pub fn center_lat(self) -> i32 {
        (self.min_lat + self.max_lat) / 2
    }

    pub fn center_long(self) -> i32 {
        (self.min_long + self.max_long) / 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImgErrorCode {
    InvalidZoomLevel,
    UnknownSubdivision,
    ExtentOverflow,
    InvalidFieldValue,
    TooManySubdivisions,
    NotNumbered,
    DuplicateMap,
    OffsetOverflow,
    TruncatedRecord,
    WriteFailed,
}

impl ImgErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidZoomLevel => "INVALID_ZOOM_LEVEL",
            Self::UnknownSubdivision => "UNKNOWN_SUBDIVISION",
            Self::ExtentOverflow => "EXTENT_OVERFLOW",
            Self::InvalidFieldValue => "INVALID_FIELD_VALUE",
            Self::TooManySubdivisions => "TOO_MANY_SUBDIVISIONS",
            Self::NotNumbered => "NOT_NUMBERED",
            Self::DuplicateMap => "DUPLICATE_MAP",
            Self::OffsetOverflow => "OFFSET_OVERFLOW",
            Self::TruncatedRecord => "TRUNCATED_RECORD",
            Self::WriteFailed => "WRITE_FAILED",
        }
    }
}

impl fmt::Display for ImgErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImgError {
    pub code: ImgErrorCode,
    pub message: String,
}

impl ImgError {
    pub fn new(code: ImgErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ImgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ImgError {}

pub type Result<T> = std::result::Result<T, ImgError>;
