use crate::common::validate_map_unit;
use crate::consts::{
    LAST_SIBLING_BIT, MAX_EXTENT, MAX_RGN_POINTER, OFFSET_HEIGHT, OFFSET_LATITUDE,
    OFFSET_LONGITUDE, OFFSET_NEXT_LEVEL, OFFSET_RGN_POINTER, OFFSET_TYPE, OFFSET_WIDTH,
    SUBDIVISION_RECORD_LENGTH, SUBDIVISION_RECORD_WITH_CHILDREN_LENGTH,
};
use crate::{ImgError, ImgErrorCode, Result, SubdivisionRecord};

pub(crate) fn subdivision_record_length(has_children: bool) -> usize {
    if has_children {
        SUBDIVISION_RECORD_WITH_CHILDREN_LENGTH
    } else {
        SUBDIVISION_RECORD_LENGTH
    }
}

/// Encodes one subdivision record.
///
/// Bit 15 of the width field carries the last-sibling flag, so width and
/// height are limited to 15 bits.
pub fn encode_subdivision(record: &SubdivisionRecord) -> Result<Vec<u8>> {
    if record.rgn_pointer > MAX_RGN_POINTER {
        return Err(ImgError::new(
            ImgErrorCode::InvalidFieldValue,
            format!(
                "RGN pointer {:#x} does not fit in 24 bits.",
                record.rgn_pointer
            ),
        ));
    }
    validate_map_unit("longitude", record.longitude)?;
    validate_map_unit("latitude", record.latitude)?;
    for (name, value) in [("width", record.width), ("height", record.height)] {
        if value > MAX_EXTENT {
            return Err(ImgError::new(
                ImgErrorCode::ExtentOverflow,
                format!("Subdivision {name} {value:#x} does not fit in 15 bits."),
            ));
        }
    }

    let width_field = if record.last {
        record.width | LAST_SIBLING_BIT
    } else {
        record.width
    };

    let mut bytes = vec![0_u8; subdivision_record_length(record.next_level.is_some())];
    bytes[OFFSET_RGN_POINTER..OFFSET_RGN_POINTER + 3]
        .copy_from_slice(&record.rgn_pointer.to_le_bytes()[..3]);
    bytes[OFFSET_TYPE] = record.contents.type_byte();
    bytes[OFFSET_LONGITUDE..OFFSET_LONGITUDE + 3]
        .copy_from_slice(&record.longitude.to_le_bytes()[..3]);
    bytes[OFFSET_LATITUDE..OFFSET_LATITUDE + 3]
        .copy_from_slice(&record.latitude.to_le_bytes()[..3]);
    bytes[OFFSET_WIDTH..OFFSET_WIDTH + 2].copy_from_slice(&width_field.to_le_bytes());
    bytes[OFFSET_HEIGHT..OFFSET_HEIGHT + 2].copy_from_slice(&record.height.to_le_bytes());
    if let Some(next_level) = record.next_level {
        bytes[OFFSET_NEXT_LEVEL..OFFSET_NEXT_LEVEL + 2].copy_from_slice(&next_level.to_le_bytes());
    }

    Ok(bytes)
}
