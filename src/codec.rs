//! Big-endian wire primitives and random material.
//!
//! Every read is bounds-checked; an out-of-range access is reported as
//! [`Error::MalformedMessage`] rather than a panic, since all offsets
//! ultimately come from untrusted client messages.

use rsa::rand_core::{OsRng, RngCore};

use crate::error::{Error, Result};

/// Borrow `len` bytes of `buf` starting at `offset`.
pub fn take(buf: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = offset
        .checked_add(len)
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| {
            Error::MalformedMessage(format!(
                "read of {} bytes at offset {} exceeds buffer of {} bytes",
                len,
                offset,
                buf.len()
            ))
        })?;
    Ok(&buf[offset..end])
}

/// Read a big-endian u32 at `offset`.
pub fn be_u32(buf: &[u8], offset: usize) -> Result<u32> {
    let bytes = take(buf, offset, 4)?;
    Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
}

/// Read a big-endian u64 at `offset`.
pub fn be_u64(buf: &[u8], offset: usize) -> Result<u64> {
    let bytes = take(buf, offset, 8)?;
    Ok(u64::from_be_bytes(bytes.try_into().unwrap()))
}

/// Append a big-endian u32.
pub fn put_be_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Append a big-endian u64.
pub fn put_be_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Draw `len` bytes from the OS random source.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| Error::CryptoFailure(format!("RNG: {}", e)))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn be_reads_roundtrip() {
        let mut buf = Vec::new();
        put_be_u32(&mut buf, 0x0000_0001);
        put_be_u64(&mut buf, 0x3d1a_10b8_bffa_c2ec);

        assert_eq!(buf.len(), 12);
        assert_eq!(be_u32(&buf, 0).unwrap(), 0x0000_0001);
        assert_eq!(be_u64(&buf, 4).unwrap(), 0x3d1a_10b8_bffa_c2ec);
    }

    #[test]
    fn be_reads_are_big_endian() {
        let buf = [0x00, 0x00, 0x00, 0x30];
        assert_eq!(be_u32(&buf, 0).unwrap(), 0x30);
    }

    #[test]
    fn short_reads_are_rejected() {
        let buf = [0u8; 8];
        assert!(matches!(
            be_u32(&buf, 5),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            be_u64(&buf, 1),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            take(&buf, 8, 1),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn offset_overflow_is_rejected() {
        let buf = [0u8; 8];
        assert!(take(&buf, usize::MAX, 2).is_err());
    }

    #[test]
    fn random_bytes_has_requested_length() {
        let a = random_bytes(16).unwrap();
        let b = random_bytes(16).unwrap();
        assert_eq!(a.len(), 16);
        // Two consecutive draws colliding means the RNG is broken.
        assert_ne!(a, b);
    }
}
