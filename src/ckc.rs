//! Content Key Context (CKC) encoding.
//!
//! The CKC payload is assembled as cleartext TLLV blocks, encrypted under
//! the transformed anti-replay seed with a fresh random IV, and framed in
//! the fixed CKC container.

use crate::codec;
use crate::error::{Error, Result};
use crate::tllv::{self, TllvBlock};

/// Version written into every CKC container.
pub const CKC_VERSION: u32 = 0x0000_0001;

/// Byte length of the fixed CKC header, everything before the payload.
pub const CKC_HEADER_LENGTH: usize = 28;

// Content-key TLLV geometry: value = content IV (16) + wrapped CK (16),
// followed by 16 bytes of random padding, 64 bytes on the wire.
const CONTENT_KEY_BLOCK_LENGTH: u32 = 0x30;
const CONTENT_KEY_VALUE_LENGTH: u32 = 0x20;
const CONTENT_KEY_PADDING: usize = 16;

/// A CKC message: version, fresh IV, encrypted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CkcContainer {
    /// CKC version field.
    pub version: u32,
    /// Random 16-byte IV for the payload, generated per response.
    pub iv: [u8; 16],
    /// AES-CBC-encrypted payload bytes.
    pub payload: Vec<u8>,
}

impl CkcContainer {
    /// Frame an encrypted payload in a version-1 container.
    pub fn new(iv: [u8; 16], payload: Vec<u8>) -> Self {
        Self {
            version: CKC_VERSION,
            iv,
            payload,
        }
    }

    /// Serialize the container to wire bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CKC_HEADER_LENGTH + self.payload.len());
        codec::put_be_u32(&mut out, self.version);
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&self.iv);
        codec::put_be_u32(&mut out, self.payload.len() as u32);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse a serialized CKC container.
    pub fn parse(ckc: &[u8]) -> Result<Self> {
        if ckc.len() < CKC_HEADER_LENGTH {
            return Err(Error::MalformedMessage(format!(
                "CKC message of {} bytes is shorter than the {}-byte header",
                ckc.len(),
                CKC_HEADER_LENGTH
            )));
        }
        let version = codec::be_u32(ckc, 0)?;
        let iv: [u8; 16] = codec::take(ckc, 8, 16)?.try_into().unwrap();
        let payload_length = codec::be_u32(ckc, 24)?;
        let payload = codec::take(ckc, CKC_HEADER_LENGTH, payload_length as usize)?.to_vec();
        Ok(Self {
            version,
            iv,
            payload,
        })
    }
}

/// Assemble the cleartext CKC payload.
///
/// Block order: the content-key block, the R1 echo, then every
/// ReturnRequest reply in request order. The caller appends the optional
/// content-key-duration block before encrypting.
pub(crate) fn assemble_payload(
    content_iv: &[u8; 16],
    en_ck: &[u8],
    r1: &[u8; 44],
    return_blocks: &[TllvBlock],
) -> Result<Vec<u8>> {
    let mut payload = content_key_block(content_iv, en_ck)?;

    let r1_block = TllvBlock::new(tllv::TAG_R1, r1.to_vec());
    payload.extend_from_slice(&r1_block.serialize());

    // Replies keep their original block geometry; padding re-serializes
    // as zeros.
    for block in return_blocks {
        payload.extend_from_slice(&block.serialize());
    }

    Ok(payload)
}

fn content_key_block(content_iv: &[u8; 16], en_ck: &[u8]) -> Result<Vec<u8>> {
    if en_ck.len() != 16 {
        return Err(Error::CryptoFailure(format!(
            "wrapped content key must be 16 bytes, got {}",
            en_ck.len()
        )));
    }

    let mut block = Vec::with_capacity(64);
    codec::put_be_u64(&mut block, tllv::TAG_ENCRYPTED_CK);
    codec::put_be_u32(&mut block, CONTENT_KEY_BLOCK_LENGTH);
    codec::put_be_u32(&mut block, CONTENT_KEY_VALUE_LENGTH);
    block.extend_from_slice(content_iv);
    block.extend_from_slice(en_ck);
    block.extend_from_slice(&codec::random_bytes(CONTENT_KEY_PADDING)?);
    debug_assert_eq!(block.len(), 64);
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_roundtrip() {
        let container = CkcContainer::new([0x0fu8; 16], vec![0xaa; 48]);
        let wire = container.serialize();
        assert_eq!(CkcContainer::parse(&wire).unwrap(), container);
    }

    #[test]
    fn container_header_bytes() {
        let wire = CkcContainer::new([0x99u8; 16], vec![0x11; 32]).serialize();
        assert_eq!(&wire[0..4], &[0x00, 0x00, 0x00, 0x01]);
        assert_eq!(&wire[4..8], &[0x00, 0x00, 0x00, 0x00]);
        assert_eq!(&wire[8..24], &[0x99u8; 16]);
        assert_eq!(&wire[24..28], &32u32.to_be_bytes());
        assert_eq!(wire.len(), CKC_HEADER_LENGTH + 32);
    }

    #[test]
    fn truncated_container_is_malformed() {
        let wire = CkcContainer::new([0u8; 16], vec![0x11; 32]).serialize();
        assert!(matches!(
            CkcContainer::parse(&wire[..20]),
            Err(Error::MalformedMessage(_))
        ));
        // Declared payload length overruns the buffer.
        assert!(matches!(
            CkcContainer::parse(&wire[..40]),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn content_key_block_geometry() {
        let content_iv = [0x21u8; 16];
        let en_ck = [0x42u8; 16];
        let block = content_key_block(&content_iv, &en_ck).unwrap();

        assert_eq!(block.len(), 64);
        assert_eq!(&block[0..8], &tllv::TAG_ENCRYPTED_CK.to_be_bytes());
        assert_eq!(&block[8..12], &0x30u32.to_be_bytes());
        assert_eq!(&block[12..16], &0x20u32.to_be_bytes());
        assert_eq!(&block[16..32], &content_iv);
        assert_eq!(&block[32..48], &en_ck);
    }

    #[test]
    fn payload_order_is_ck_then_r1_then_replies() {
        let reply = TllvBlock::new(tllv::TAG_ASSET_ID, b"asset".to_vec());
        let payload =
            assemble_payload(&[0u8; 16], &[1u8; 16], &[2u8; 44], &[reply.clone()]).unwrap();

        assert_eq!(&payload[0..8], &tllv::TAG_ENCRYPTED_CK.to_be_bytes());
        assert_eq!(&payload[64..72], &tllv::TAG_R1.to_be_bytes());
        let reply_offset = 64 + 16 + 44;
        assert_eq!(&payload[reply_offset..], reply.serialize().as_slice());
    }

    #[test]
    fn oversized_wrapped_key_is_rejected() {
        assert!(content_key_block(&[0u8; 16], &[0u8; 32]).is_err());
    }
}
