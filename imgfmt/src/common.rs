use crate::consts::{MAX_MAP_UNIT, MIN_MAP_UNIT};
use crate::{ImgError, ImgErrorCode, Result};

pub(crate) fn validate_map_unit(name: &str, value: i32) -> Result<()> {
    if !(MIN_MAP_UNIT..=MAX_MAP_UNIT).contains(&value) {
        return Err(ImgError::new(
            ImgErrorCode::InvalidFieldValue,
            format!("{name} {value} does not fit in a signed 24-bit field."),
        ));
    }
    Ok(())
}

pub(crate) fn read_u8(bytes: &[u8], offset: usize) -> Result<u8> {
    bytes
        .get(offset)
        .copied()
        .ok_or_else(|| truncated("u8", offset, bytes.len()))
}

pub(crate) fn read_u16_le(bytes: &[u8], offset: usize) -> Result<u16> {
    let arr: [u8; 2] = read_array(bytes, offset, "u16")?;
    Ok(u16::from_le_bytes(arr))
}

pub(crate) fn read_u24_le(bytes: &[u8], offset: usize) -> Result<u32> {
    let [b0, b1, b2]: [u8; 3] = read_array(bytes, offset, "u24")?;
    Ok(u32::from_le_bytes([b0, b1, b2, 0]))
}

/// Reads a 24-bit two's complement value, sign-extending it to 32 bits.
pub(crate) fn read_i24_le(bytes: &[u8], offset: usize) -> Result<i32> {
    let raw = read_u24_le(bytes, offset)?;
    Ok(((raw << 8) as i32) >> 8)
}

pub(crate) fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32> {
    let arr: [u8; 4] = read_array(bytes, offset, "u32")?;
    Ok(u32::from_le_bytes(arr))
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize, kind: &str) -> Result<[u8; N]> {
    let value_bytes = offset
        .checked_add(N)
        .and_then(|end| bytes.get(offset..end))
        .ok_or_else(|| truncated(kind, offset, bytes.len()))?;
    value_bytes.try_into().map_err(|_| {
        ImgError::new(
            ImgErrorCode::TruncatedRecord,
            format!("Could not parse {kind} field bytes."),
        )
    })
}

fn truncated(kind: &str, offset: usize, available: usize) -> ImgError {
    ImgError::new(
        ImgErrorCode::TruncatedRecord,
        format!("Could not read {kind} field at offset {offset} from {available} bytes."),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extends_24_bit_values() {
        assert_eq!(read_i24_le(&[0xff, 0xff, 0xff], 0).expect("read"), -1);
        assert_eq!(read_i24_le(&[0x00, 0x00, 0x80], 0).expect("read"), MIN_MAP_UNIT);
        assert_eq!(read_i24_le(&[0xff, 0xff, 0x7f], 0).expect("read"), MAX_MAP_UNIT);
    }

    #[test]
    fn short_reads_are_truncation_errors() {
        let err = read_u16_le(&[1, 2, 3], 2).expect_err("short");
        assert_eq!(err.code, ImgErrorCode::TruncatedRecord);
        let err = read_u8(&[], 0).expect_err("empty");
        assert_eq!(err.code, ImgErrorCode::TruncatedRecord);
    }

    #[test]
    fn map_unit_bounds_are_inclusive() {
        assert!(validate_map_unit("lat", MAX_MAP_UNIT).is_ok());
        assert!(validate_map_unit("lat", MIN_MAP_UNIT).is_ok());
        assert_eq!(
            validate_map_unit("lat", MAX_MAP_UNIT + 1)
                .expect_err("too large")
                .code,
            ImgErrorCode::InvalidFieldValue
        );
    }
}
