//! Byte-string primitives shared by the covenant crates.
//!
//! Fixed-width integer codecs, the compact-size varint, and hex helpers.
//! Everything here is pure; decoders reject truncated or non-minimal input.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BytesError {
    #[error("short input: need {need} bytes, have {have}")]
    ShortInput { need: usize, have: usize },

    #[error("non-minimal varint encoding")]
    NonMinimalVarint,

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}

pub type Result<T> = std::result::Result<T, BytesError>;

// ---------------- fixed-width integers ---------------- //

pub fn u16_le(v: u16) -> [u8; 2] {
    v.to_le_bytes()
}

pub fn u32_le(v: u32) -> [u8; 4] {
    v.to_le_bytes()
}

pub fn u64_le(v: u64) -> [u8; 8] {
    v.to_le_bytes()
}

pub fn u32_be(v: u32) -> [u8; 4] {
    v.to_be_bytes()
}

pub fn u64_be(v: u64) -> [u8; 8] {
    v.to_be_bytes()
}

fn take<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N]> {
    let end = offset.saturating_add(N);
    if buf.len() < end {
        return Err(BytesError::ShortInput { need: end, have: buf.len() });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..end]);
    Ok(out)
}

pub fn read_u16_le(buf: &[u8], offset: usize) -> Result<u16> {
    Ok(u16::from_le_bytes(take(buf, offset)?))
}

pub fn read_u32_le(buf: &[u8], offset: usize) -> Result<u32> {
    Ok(u32::from_le_bytes(take(buf, offset)?))
}

pub fn read_u64_le(buf: &[u8], offset: usize) -> Result<u64> {
    Ok(u64::from_le_bytes(take(buf, offset)?))
}

pub fn read_u32_be(buf: &[u8], offset: usize) -> Result<u32> {
    Ok(u32::from_be_bytes(take(buf, offset)?))
}

pub fn read_u64_be(buf: &[u8], offset: usize) -> Result<u64> {
    Ok(u64::from_be_bytes(take(buf, offset)?))
}

/// Minimal big-endian encoding of an unsigned integer. Zero encodes as empty.
pub fn minimal_be(v: u64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    bytes[skip..].to_vec()
}

// ---------------- compact-size varint ---------------- //

pub fn write_varint(n: u64) -> Vec<u8> {
    if n < 253 {
        return vec![n as u8];
    }
    if n <= 0xffff {
        let mut out = vec![0xfd];
        out.extend_from_slice(&(n as u16).to_le_bytes());
        return out;
    }
    if n <= 0xffff_ffff {
        let mut out = vec![0xfe];
        out.extend_from_slice(&(n as u32).to_le_bytes());
        return out;
    }
    let mut out = vec![0xff];
    out.extend_from_slice(&n.to_le_bytes());
    out
}

/// Decodes a compact-size varint, returning the value and consumed length.
/// Non-minimal encodings are rejected.
pub fn read_varint(buf: &[u8]) -> Result<(u64, usize)> {
    let tag = *buf
        .first()
        .ok_or(BytesError::ShortInput { need: 1, have: 0 })?;
    if tag < 0xfd {
        return Ok((tag as u64, 1));
    }
    if tag == 0xfd {
        let n = read_u16_le(buf, 1)? as u64;
        if n < 253 {
            return Err(BytesError::NonMinimalVarint);
        }
        return Ok((n, 3));
    }
    if tag == 0xfe {
        let n = read_u32_le(buf, 1)? as u64;
        if n < 0x1_0000 {
            return Err(BytesError::NonMinimalVarint);
        }
        return Ok((n, 5));
    }
    let n = read_u64_le(buf, 1)?;
    if n < 0x1_0000_0000 {
        return Err(BytesError::NonMinimalVarint);
    }
    Ok((n, 9))
}

// ---------------- hex ---------------- //

pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

pub fn from_hex(s: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_roundtrip() {
        assert_eq!(read_u32_le(&u32_le(0xdead_beef), 0).unwrap(), 0xdead_beef);
        assert_eq!(read_u32_be(&u32_be(0xdead_beef), 0).unwrap(), 0xdead_beef);
        assert_eq!(read_u64_le(&u64_le(u64::MAX), 0).unwrap(), u64::MAX);
        assert_eq!(read_u16_le(&u16_le(517), 0).unwrap(), 517);
    }

    #[test]
    fn test_short_input() {
        assert!(matches!(
            read_u32_le(&[1, 2, 3], 0),
            Err(BytesError::ShortInput { need: 4, have: 3 })
        ));
        assert!(read_u32_le(&[1, 2, 3, 4], 1).is_err());
    }

    #[test]
    fn test_minimal_be() {
        assert_eq!(minimal_be(0), Vec::<u8>::new());
        assert_eq!(minimal_be(1), vec![1]);
        assert_eq!(minimal_be(0x0102), vec![1, 2]);
        assert_eq!(minimal_be(u64::MAX), vec![0xff; 8]);
    }

    #[test]
    fn test_varint_roundtrip() {
        for n in [0u64, 1, 252, 253, 0xffff, 0x1_0000, 0xffff_ffff, 0x1_0000_0000, u64::MAX] {
            let enc = write_varint(n);
            let (dec, used) = read_varint(&enc).unwrap();
            assert_eq!(dec, n);
            assert_eq!(used, enc.len());
        }
    }

    #[test]
    fn test_varint_rejects_non_minimal() {
        // 1 encoded with the 0xfd form
        assert!(matches!(
            read_varint(&[0xfd, 1, 0]),
            Err(BytesError::NonMinimalVarint)
        ));
        assert!(matches!(
            read_varint(&[0xfe, 1, 0, 0, 0]),
            Err(BytesError::NonMinimalVarint)
        ));
        assert!(matches!(
            read_varint(&[0xff, 1, 0, 0, 0, 0, 0, 0, 0]),
            Err(BytesError::NonMinimalVarint)
        ));
    }

    #[test]
    fn test_hex() {
        assert_eq!(to_hex(&[0xab, 0xcd]), "abcd");
        assert_eq!(from_hex("abcd").unwrap(), vec![0xab, 0xcd]);
        assert!(from_hex("xy").is_err());
    }
}
