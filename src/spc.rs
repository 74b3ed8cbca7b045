//! Server Playback Context (SPC) decoding.
//!
//! An SPC carries an RSA-OAEP-wrapped AES session key (SPCK), an IV, and
//! a payload encrypted under the SPCK. The decrypted payload is a TLLV
//! stream; the SessionKeyR1 block inside it holds the per-session key SK
//! and the client anti-replay nonce R1, encrypted once more under the
//! derived DASk.

use std::collections::HashMap;

use rsa::RsaPrivateKey;

use crate::codec;
use crate::crypto;
use crate::error::{Error, Result};
use crate::tllv::{self, TllvBlock};

/// The only SPC version this KSM speaks.
pub const SPC_VERSION: u32 = 0x0000_0001;

/// Byte length of the fixed SPC header, everything before the payload.
pub const SPC_HEADER_LENGTH: usize = 176;

/// Byte length of the RSA-OAEP-wrapped session key.
pub const WRAPPED_SPCK_LENGTH: usize = 128;

/// Byte length of a SessionKeyR1 TLLV value: IV plus ciphertext.
pub const SKR1_VALUE_LENGTH: usize = 112;

/// Byte length of the decrypted SK/R1 payload.
pub const SKR1_PAYLOAD_LENGTH: usize = 96;

/// A decoded SPC message.
#[derive(Debug)]
pub struct SpcContainer {
    /// SPC version field.
    pub version: u32,
    /// IV for the AES-CBC-encrypted payload.
    pub aes_key_iv: [u8; 16],
    /// RSA-OAEP-wrapped session key, 128 bytes.
    pub encrypted_aes_key: Vec<u8>,
    /// SHA-1 of the client certificate. Not verified here.
    pub certificate_hash: [u8; 20],
    /// Declared payload length.
    pub payload_length: u32,
    /// Decrypted TLLV payload bytes.
    pub payload: Vec<u8>,
    /// Payload blocks indexed by tag.
    pub tllvs: HashMap<u64, TllvBlock>,
}

impl SpcContainer {
    /// Parse and decrypt an SPC message.
    ///
    /// Walks the fixed-offset header, unwraps the SPCK with the server
    /// private key, decrypts the payload and collects its TLLV blocks.
    /// Trailing bytes beyond the declared payload length are ignored.
    pub fn parse(spc: &[u8], private_key: &RsaPrivateKey) -> Result<Self> {
        if spc.len() < SPC_HEADER_LENGTH {
            return Err(Error::MalformedMessage(format!(
                "SPC message of {} bytes is shorter than the {}-byte header",
                spc.len(),
                SPC_HEADER_LENGTH
            )));
        }

        let version = codec::be_u32(spc, 0)?;
        if version != SPC_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let aes_key_iv: [u8; 16] = codec::take(spc, 8, 16)?.try_into().unwrap();
        let encrypted_aes_key = codec::take(spc, 24, WRAPPED_SPCK_LENGTH)?.to_vec();
        let certificate_hash: [u8; 20] = codec::take(spc, 152, 20)?.try_into().unwrap();
        let payload_length = codec::be_u32(spc, 172)?;
        let encrypted_payload =
            codec::take(spc, SPC_HEADER_LENGTH, payload_length as usize)?.to_vec();

        if !encrypted_payload.len().is_multiple_of(crypto::AES_BLOCK_SIZE) {
            return Err(Error::MalformedMessage(format!(
                "SPC payload length {} is not a multiple of the AES block size",
                encrypted_payload.len()
            )));
        }

        let spck = decrypt_spck(private_key, &encrypted_aes_key)?;
        let payload = crypto::aes_cbc_decrypt_raw(&spck, &aes_key_iv, &encrypted_payload)?;
        debug!("SPC payload of {} bytes decrypted", payload.len());

        let tllvs = tllv::parse_tllvs(&payload)?;

        Ok(Self {
            version,
            aes_key_iv,
            encrypted_aes_key,
            certificate_hash,
            payload_length,
            payload,
            tllvs,
        })
    }

    /// Look up a block the protocol requires the client to send.
    pub fn required_block(&self, tag: u64) -> Result<&TllvBlock> {
        self.tllvs.get(&tag).ok_or_else(|| {
            Error::MalformedMessage(format!("required tag {:#018x} missing from SPC", tag))
        })
    }
}

// SPCK = RSA-OAEP-SHA1 decrypt of SPC bytes 24..152 under the server key.
fn decrypt_spck(private_key: &RsaPrivateKey, wrapped: &[u8]) -> Result<Vec<u8>> {
    if wrapped.len() != WRAPPED_SPCK_LENGTH {
        return Err(Error::MalformedMessage(format!(
            "wrapped SPCK must be {} bytes, got {}",
            WRAPPED_SPCK_LENGTH,
            wrapped.len()
        )));
    }
    crypto::rsa_oaep_sha1_decrypt(private_key, wrapped)
}

/// The SessionKeyR1 TLLV value split into IV and ciphertext.
#[derive(Debug)]
pub struct Skr1Block {
    /// CBC IV for the SK/R1 ciphertext.
    pub iv: [u8; 16],
    /// AES-CBC ciphertext of the 96-byte SK/R1 payload.
    pub payload: [u8; SKR1_PAYLOAD_LENGTH],
}

impl Skr1Block {
    /// Split a SessionKeyR1 block into IV and ciphertext.
    pub fn from_block(block: &TllvBlock) -> Result<Self> {
        if block.tag != tllv::TAG_SESSION_KEY_R1 {
            return Err(Error::MalformedMessage(format!(
                "tag {:#018x} is not a SessionKeyR1 block",
                block.tag
            )));
        }
        if block.value.len() != SKR1_VALUE_LENGTH {
            return Err(Error::MalformedMessage(format!(
                "SessionKeyR1 value must be {} bytes, got {}",
                SKR1_VALUE_LENGTH,
                block.value.len()
            )));
        }
        Ok(Self {
            iv: block.value[..16].try_into().unwrap(),
            payload: block.value[16..SKR1_VALUE_LENGTH].try_into().unwrap(),
        })
    }

    /// Decrypt the SK/R1 payload under the derived DASk.
    pub fn decrypt(&self, dask: &[u8; 16]) -> Result<DecryptedSkr1> {
        let plain = crypto::aes_cbc_decrypt_raw(dask, &self.iv, &self.payload)?;
        if plain.len() != SKR1_PAYLOAD_LENGTH {
            return Err(Error::MalformedMessage(format!(
                "decrypted SK/R1 payload must be {} bytes, got {}",
                SKR1_PAYLOAD_LENGTH,
                plain.len()
            )));
        }
        Ok(DecryptedSkr1 {
            sk: plain[0..16].try_into().unwrap(),
            hu: plain[16..36].try_into().unwrap(),
            r1: plain[36..80].try_into().unwrap(),
            integrity_bytes: plain[80..96].try_into().unwrap(),
        })
    }
}

/// The decrypted 96-byte SK/R1 payload.
pub struct DecryptedSkr1 {
    /// Per-session AES key; the content key is wrapped under it.
    pub sk: [u8; 16],
    /// Host/user identifier.
    pub hu: [u8; 20],
    /// Client anti-replay nonce, echoed back in the CKC.
    pub r1: [u8; 44],
    /// Must match the SessionKeyR1Integrity block value.
    pub integrity_bytes: [u8; 16],
}
