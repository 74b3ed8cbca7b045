//! Tag-Length-Length-Value codec.
//!
//! SPC and CKC payloads are a sequence of TLLV blocks:
//! `tag(8) || block_length(4) || value_length(4) || value || padding`,
//! all integers big-endian. `block_length` counts value plus padding and
//! is the authoritative step size when walking a payload.

use std::collections::HashMap;

use crate::codec;
use crate::error::{Error, Result};

/// Width of the tag field.
pub const FIELD_TAG_LENGTH: usize = 8;
/// Width of the block-length field.
pub const FIELD_BLOCK_LENGTH: usize = 4;
/// Width of the value-length field.
pub const FIELD_VALUE_LENGTH: usize = 4;

// Tags a client puts in an SPC.
pub const TAG_SESSION_KEY_R1: u64 = 0x3d1a10b8bffac2ec;
pub const TAG_SESSION_KEY_R1_INTEGRITY: u64 = 0xb349d4809e910687;
pub const TAG_ANTI_REPLAY_SEED: u64 = 0x89c90f12204106b2;
pub const TAG_R2: u64 = 0x71b5595ac1521133;
pub const TAG_RETURN_REQUEST: u64 = 0x19f9d4e5ab7609cb;
pub const TAG_ASSET_ID: u64 = 0x1bf7f53f5d5d5a1f;
pub const TAG_TRANSACTION_ID: u64 = 0x47aa7ad3440577de;
pub const TAG_PROTOCOL_VERSIONS_SUPPORTED: u64 = 0x67b8fb79ecce1a13;
pub const TAG_PROTOCOL_VERSION_USED: u64 = 0x5d81bcbcc7f61703;
pub const TAG_STREAMING_INDICATOR: u64 = 0xabb0256a31843974;
pub const TAG_MEDIA_PLAYBACK_STATE: u64 = 0xeb8efdf2b25ab3a0;

// Tags the KSM puts in a CKC.
pub const TAG_ENCRYPTED_CK: u64 = 0x58b38165af0e3d5a;
pub const TAG_R1: u64 = 0xea74c4645d5efee9;
pub const TAG_CONTENT_KEY_DURATION: u64 = 0x47acf6a418cd091a;

/// A single Tag-Length-Length-Value block.
///
/// Invariant: `value_length == value.len()` and
/// `value_length <= block_length`. The constructors maintain this; the
/// parser enforces it on untrusted input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TllvBlock {
    /// 64-bit block identifier.
    pub tag: u64,
    /// Bytes of value plus padding on the wire.
    pub block_length: u32,
    /// Bytes of semantic value.
    pub value_length: u32,
    /// The semantic value.
    pub value: Vec<u8>,
}

impl TllvBlock {
    /// Create a block with no padding (`block_length == value_length`).
    pub fn new(tag: u64, value: Vec<u8>) -> Self {
        Self::with_padding(tag, value, 0)
    }

    /// Create a block followed by `padding` bytes of padding.
    pub fn with_padding(tag: u64, value: Vec<u8>, padding: u32) -> Self {
        let value_length = value.len() as u32;
        Self {
            tag,
            block_length: value_length + padding,
            value_length,
            value,
        }
    }

    /// Serialize the block. Padding bytes are zero-filled.
    pub fn serialize(&self) -> Vec<u8> {
        let header = FIELD_TAG_LENGTH + FIELD_BLOCK_LENGTH + FIELD_VALUE_LENGTH;
        let mut out = Vec::with_capacity(header + self.block_length as usize);
        codec::put_be_u64(&mut out, self.tag);
        codec::put_be_u32(&mut out, self.block_length);
        codec::put_be_u32(&mut out, self.value_length);
        out.extend_from_slice(&self.value);
        out.resize(header + self.block_length as usize, 0);
        out
    }
}

/// Walk a decrypted payload and collect its blocks by tag.
///
/// A duplicate tag is rejected: the protocol never emits one, so seeing
/// it means the payload is corrupt.
pub fn parse_tllvs(payload: &[u8]) -> Result<HashMap<u64, TllvBlock>> {
    let mut blocks = HashMap::new();
    let mut offset = 0usize;

    while offset < payload.len() {
        let tag = codec::be_u64(payload, offset)?;
        offset += FIELD_TAG_LENGTH;
        let block_length = codec::be_u32(payload, offset)?;
        offset += FIELD_BLOCK_LENGTH;
        let value_length = codec::be_u32(payload, offset)?;
        offset += FIELD_VALUE_LENGTH;

        if value_length > block_length {
            return Err(Error::MalformedMessage(format!(
                "tag {:#018x}: value length {} exceeds block length {}",
                tag, value_length, block_length
            )));
        }
        let end = offset
            .checked_add(block_length as usize)
            .filter(|&end| end <= payload.len())
            .ok_or_else(|| {
                Error::MalformedMessage(format!(
                    "tag {:#018x}: block length {} overruns payload",
                    tag, block_length
                ))
            })?;
        let value = codec::take(payload, offset, value_length as usize)?.to_vec();

        trace!(
            "tllv tag {:#018x} block_length={} value_length={}",
            tag,
            block_length,
            value_length
        );

        let block = TllvBlock {
            tag,
            block_length,
            value_length,
            value,
        };
        if blocks.insert(tag, block).is_some() {
            return Err(Error::MalformedMessage(format!(
                "duplicate tag {:#018x}",
                tag
            )));
        }

        offset = end;
    }

    Ok(blocks)
}

/// Playback states a client reports in a MediaPlaybackState block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    ReadyToStart,
    PlayingOrPaused,
    Playing,
    Halted,
}

impl PlaybackState {
    /// Map a wire value to a known state, `None` for anything else.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0xf4dee5a2 => Some(PlaybackState::ReadyToStart),
            0xa5d6739e => Some(PlaybackState::PlayingOrPaused),
            0x4f834330 => Some(PlaybackState::Playing),
            0x5991bf20 => Some(PlaybackState::Halted),
            _ => None,
        }
    }
}

/// Decoded MediaPlaybackState TLLV value.
#[derive(Debug, Clone, Copy)]
pub struct MediaPlaybackState {
    /// SPC creation time, seconds since the epoch.
    pub creation_date: u32,
    /// Raw playback state; an unknown value is kept as-is.
    pub playback_state: u32,
    /// Client playback session id.
    pub session_id: u32,
}

impl MediaPlaybackState {
    /// Decode the 12-byte MediaPlaybackState value.
    pub fn parse(value: &[u8]) -> Result<Self> {
        if value.len() < 12 {
            return Err(Error::MalformedMessage(format!(
                "media playback state value must be 12 bytes, got {}",
                value.len()
            )));
        }
        Ok(Self {
            creation_date: codec::be_u32(value, 0)?,
            playback_state: codec::be_u32(value, 4)?,
            session_id: codec::be_u32(value, 8)?,
        })
    }

    /// The playback state, if it is one of the known enumerants.
    pub fn state(&self) -> Option<PlaybackState> {
        PlaybackState::from_raw(self.playback_state)
    }
}
