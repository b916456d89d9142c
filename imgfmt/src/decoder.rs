use crate::common::{read_i24_le, read_u16_le, read_u24_le, read_u32_le, read_u8};
use crate::consts::{
    LAST_SIBLING_BIT, OFFSET_HEIGHT, OFFSET_LATITUDE, OFFSET_LONGITUDE, OFFSET_NEXT_LEVEL,
    OFFSET_RGN_POINTER, OFFSET_TYPE, OFFSET_WIDTH,
};
use crate::encoder::subdivision_record_length;
use crate::{
    FeatureSet, ImgError, ImgErrorCode, Mdr1Record, MdrConfig, Result, SubdivisionRecord,
};

/// Decodes one subdivision record from the start of `bytes`.
///
/// Whether the record carries a next-level field is not stored in the record
/// itself; readers learn it from the zoom level layout.
pub fn decode_subdivision(bytes: &[u8], has_children: bool) -> Result<SubdivisionRecord> {
    let expected_len = subdivision_record_length(has_children);
    if bytes.len() < expected_len {
        return Err(ImgError::new(
            ImgErrorCode::TruncatedRecord,
            format!(
                "Subdivision record needs {expected_len} bytes, got {}.",
                bytes.len()
            ),
        ));
    }

    let width_field = read_u16_le(bytes, OFFSET_WIDTH)?;
    let next_level = if has_children {
        Some(read_u16_le(bytes, OFFSET_NEXT_LEVEL)?)
    } else {
        None
    };

    Ok(SubdivisionRecord {
        rgn_pointer: read_u24_le(bytes, OFFSET_RGN_POINTER)?,
        contents: FeatureSet::from_type_byte(read_u8(bytes, OFFSET_TYPE)?)?,
        longitude: read_i24_le(bytes, OFFSET_LONGITUDE)?,
        latitude: read_i24_le(bytes, OFFSET_LATITUDE)?,
        width: width_field & !LAST_SIBLING_BIT,
        height: read_u16_le(bytes, OFFSET_HEIGHT)?,
        last: width_field & LAST_SIBLING_BIT != 0,
        next_level,
    })
}

/// Decodes a run of MDR1 records written with `config`.
///
/// Device records carry no index offset; it decodes as zero.
pub fn decode_mdr1_records(bytes: &[u8], config: MdrConfig) -> Result<Vec<Mdr1Record>> {
    let item_size = config.item_size();
    if !bytes.len().is_multiple_of(item_size) {
        return Err(ImgError::new(
            ImgErrorCode::TruncatedRecord,
            format!(
                "MDR1 record data length {} is not a multiple of {item_size}.",
                bytes.len()
            ),
        ));
    }

    let mut records = Vec::with_capacity(bytes.len() / item_size);
    for chunk in bytes.chunks_exact(item_size) {
        let mut record = Mdr1Record::new(read_u32_le(chunk, 0)?);
        if !config.for_device {
            record.set_index_offset(read_u32_le(chunk, 4)?);
        }
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode_subdivision, FeatureKind};

    #[test]
    fn decodes_what_the_encoder_writes() {
        let record = SubdivisionRecord {
            rgn_pointer: 0x00ab_cdef,
            contents: FeatureSet::new([FeatureKind::IndexedPoints, FeatureKind::Polylines]),
            longitude: -0x0012_3456,
            latitude: 0x0065_4321,
            width: 0x7fff,
            height: 0x0001,
            last: true,
            next_level: Some(42),
        };
        let bytes = encode_subdivision(&record).expect("encode");
        assert_eq!(decode_subdivision(&bytes, true).expect("decode"), record);
    }

    #[test]
    fn rejects_short_records() {
        let err = decode_subdivision(&[0_u8; 14], true).expect_err("missing next level");
        assert_eq!(err.code, ImgErrorCode::TruncatedRecord);
        assert!(decode_subdivision(&[0_u8; 14], false).is_ok());
    }

    #[test]
    fn decodes_device_and_full_mdr1_records() {
        let full = [5, 0, 0, 0, 24, 0, 0, 0, 7, 0, 0, 0, 34, 0, 0, 0];
        let records = decode_mdr1_records(&full, MdrConfig::default()).expect("decode");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].map_number(), 7);
        assert_eq!(records[1].index_offset(), 34);

        let device = [5, 0, 0, 0, 7, 0, 0, 0];
        let records = decode_mdr1_records(&device, MdrConfig::device()).expect("decode");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].index_offset(), 0);

        let err = decode_mdr1_records(&full[..12], MdrConfig::default()).expect_err("short");
        assert_eq!(err.code, ImgErrorCode::TruncatedRecord);
    }
}
