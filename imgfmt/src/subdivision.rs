//! Subdivisions: the rectangular map areas that make up each zoom level.
//!
//! A subdivision cannot be interpreted without the bits per coordinate of
//! its zoom level, so every node carries its [`Zoom`]. Width and height are
//! stored already shifted down to that precision; the center is kept in
//! full 24-bit map units.

use crate::consts::{MAX_EXTENT, MAX_RGN_POINTER};
use crate::encoder::encode_subdivision;
use crate::tree::SubdivisionId;
use crate::{Area, ImgError, ImgErrorCode, ImgFileWriter, Result, Zoom};

/// Kinds of map element stored in the RGN section for a subdivision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Points,
    IndexedPoints,
    Polylines,
    Polygons,
}

impl FeatureKind {
    /// The order in which element kinds are laid out in the RGN section.
    pub const ORDER: [FeatureKind; 4] = [
        Self::Points,
        Self::IndexedPoints,
        Self::Polylines,
        Self::Polygons,
    ];

    /// Bit of this kind in the subdivision type byte.
    pub fn bit(self) -> u8 {
        match self {
            Self::Points => 0x10,
            Self::IndexedPoints => 0x20,
            Self::Polylines => 0x40,
            Self::Polygons => 0x80,
        }
    }
}

/// The set of element kinds present in a subdivision.
///
/// The bits are the ones written in the type byte, so the byte is simply
/// the set's value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FeatureSet(u8);

impl FeatureSet {
    pub const EMPTY: FeatureSet = FeatureSet(0);

    pub fn new(kinds: impl IntoIterator<Item = FeatureKind>) -> Self {
        kinds.into_iter().fold(Self::EMPTY, Self::with)
    }

    pub fn from_type_byte(value: u8) -> Result<Self> {
        if value & 0x0f != 0 {
            return Err(ImgError::new(
                ImgErrorCode::InvalidFieldValue,
                format!("Subdivision type byte {value:#04x} has reserved low bits set."),
            ));
        }
        Ok(Self(value))
    }

    pub fn with(self, kind: FeatureKind) -> Self {
        Self(self.0 | kind.bit())
    }

    pub fn contains(self, kind: FeatureKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn type_byte(self) -> u8 {
        self.0
    }

    pub fn iter(self) -> impl Iterator<Item = FeatureKind> {
        FeatureKind::ORDER
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }

    /// First present kind in RGN order. Its data starts at the subdivision's
    /// RGN pointer.
    pub fn first(self) -> Option<FeatureKind> {
        self.iter().next()
    }

    /// Whether the RGN section needs an explicit pointer to `kind`'s data.
    ///
    /// Every present kind except the first one needs a pointer.
    pub fn needs_pointer(self, kind: FeatureKind) -> bool {
        self.contains(kind) && self.first() != Some(kind)
    }
}

impl FromIterator<FeatureKind> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = FeatureKind>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// One node of the subdivision tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subdivision {
    zoom: Zoom,
    longitude: i32,
    latitude: i32,
    width: u16,
    height: u16,
    rgn_pointer: u32,
    contents: FeatureSet,
    number: u16,
    last: bool,
    children: Vec<SubdivisionId>,
}

impl Subdivision {
    /// Builds a detached node covering `area` at `zoom`.
    ///
    /// A zero-sized area is allowed and gives zero extents.
    pub(crate) fn new(area: Area, zoom: Zoom) -> Result<Self> {
        area.validate()?;

        let shift = zoom.shift();
        let width = shifted_half_extent("width", area.max_long - area.min_long, shift)?;
        let height = shifted_half_extent("height", area.max_lat - area.min_lat, shift)?;

        Ok(Self {
            zoom,
            longitude: area.center_long(),
            latitude: area.center_lat(),
            width,
            height,
            rgn_pointer: 0,
            contents: FeatureSet::EMPTY,
            number: 0,
            last: false,
            children: Vec::new(),
        })
    }

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn shift(&self) -> u8 {
        self.zoom.shift()
    }

    pub fn longitude(&self) -> i32 {
        self.longitude
    }

    pub fn latitude(&self) -> i32 {
        self.latitude
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn rgn_pointer(&self) -> u32 {
        self.rgn_pointer
    }

    pub fn contents(&self) -> FeatureSet {
        self.contents
    }

    /// Sequence number from the last numbering pass, 0 when unnumbered.
    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn is_last(&self) -> bool {
        self.last
    }

    pub fn children(&self) -> &[SubdivisionId] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn needs_point_ptr(&self) -> bool {
        self.contents.needs_pointer(FeatureKind::Points)
    }

    pub fn needs_ind_point_ptr(&self) -> bool {
        self.contents.needs_pointer(FeatureKind::IndexedPoints)
    }

    pub fn needs_polyline_ptr(&self) -> bool {
        self.contents.needs_pointer(FeatureKind::Polylines)
    }

    pub fn needs_polygon_ptr(&self) -> bool {
        self.contents.needs_pointer(FeatureKind::Polygons)
    }

    pub(crate) fn set_rgn_pointer(&mut self, rgn_pointer: u32) -> Result<()> {
        if rgn_pointer > MAX_RGN_POINTER {
            return Err(ImgError::new(
                ImgErrorCode::InvalidFieldValue,
                format!("RGN pointer {rgn_pointer:#x} does not fit in 24 bits."),
            ));
        }
        self.rgn_pointer = rgn_pointer;
        Ok(())
    }

    pub(crate) fn set_contents(&mut self, contents: FeatureSet) {
        self.contents = contents;
    }

    pub(crate) fn set_numbering(&mut self, number: u16, last: bool) {
        self.number = number;
        self.last = last;
    }

    pub(crate) fn clear_numbering(&mut self) {
        self.set_numbering(0, false);
    }

    pub(crate) fn attach_child(&mut self, child: SubdivisionId) {
        self.children.push(child);
    }

    /// Snapshot of the fields that go into the binary record.
    pub(crate) fn record(&self, next_level: Option<u16>) -> SubdivisionRecord {
        SubdivisionRecord {
            rgn_pointer: self.rgn_pointer,
            contents: self.contents,
            longitude: self.longitude,
            latitude: self.latitude,
            width: self.width,
            height: self.height,
            last: self.last,
            next_level,
        }
    }
}

fn shifted_half_extent(name: &str, span: i32, shift: u8) -> Result<u16> {
    let half = (span / 2) >> shift;
    u16::try_from(half)
        .ok()
        .filter(|value| *value <= MAX_EXTENT)
        .ok_or_else(|| {
            ImgError::new(
                ImgErrorCode::ExtentOverflow,
                format!("Subdivision half {name} {half} does not fit in 15 bits."),
            )
        })
}

/// The decoded form of one subdivision record.
///
/// `next_level` is the sequence number of the first child and is present
/// exactly when the subdivision has children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubdivisionRecord {
    pub rgn_pointer: u32,
    pub contents: FeatureSet,
    pub longitude: i32,
    pub latitude: i32,
    pub width: u16,
    pub height: u16,
    pub last: bool,
    pub next_level: Option<u16>,
}

impl SubdivisionRecord {
    pub fn encoded_len(&self) -> usize {
        crate::encoder::subdivision_record_length(self.next_level.is_some())
    }

    pub fn write<W: ImgFileWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let bytes = encode_subdivision(self)?;
        tracing::trace!(last = self.last, len = bytes.len(), "writing subdivision record");
        writer.put_bytes(&bytes)
    }
}
