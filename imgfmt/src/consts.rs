pub const SUBDIVISION_RECORD_LENGTH: usize = 14;
pub const SUBDIVISION_RECORD_WITH_CHILDREN_LENGTH: usize = 16;

/// Full-precision coordinates use 24 bits; a level's shift is this minus its bits per coordinate.
pub const FULL_COORD_BITS: u8 = 24;

pub const MAX_EXTENT: u16 = 0x7fff;
pub const MAX_RGN_POINTER: u32 = 0x00ff_ffff;
pub const MIN_MAP_UNIT: i32 = -0x0080_0000;
pub const MAX_MAP_UNIT: i32 = 0x007f_ffff;

pub(crate) const LAST_SIBLING_BIT: u16 = 0x8000;

pub(crate) const OFFSET_RGN_POINTER: usize = 0;
pub(crate) const OFFSET_TYPE: usize = 3;
pub(crate) const OFFSET_LONGITUDE: usize = 4;
pub(crate) const OFFSET_LATITUDE: usize = 7;
pub(crate) const OFFSET_WIDTH: usize = 10;
pub(crate) const OFFSET_HEIGHT: usize = 12;
pub(crate) const OFFSET_NEXT_LEVEL: usize = 14;

pub(crate) const MDR1_DEVICE_ITEM_SIZE: usize = 4;
pub(crate) const MDR1_ITEM_SIZE: usize = 8;
