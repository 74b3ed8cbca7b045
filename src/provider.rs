//! Provider contracts injected into the KSM.
//!
//! The content-key provider and the D-function are licensee-supplied;
//! the core only sees these interfaces. Provider errors surface as
//! [`Error::ProviderFailure`](crate::error::Error::ProviderFailure).

use crate::codec;
use crate::tllv::{self, TllvBlock};

/// Error type providers may return.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Content keys valid for the lease duration.
pub const KEY_TYPE_LEASE: u32 = 0x1a4bde7e;
/// Content keys valid for the rental duration.
pub const KEY_TYPE_RENTAL: u32 = 0x3dfe45a0;
/// Content keys valid for both lease and rental durations.
pub const KEY_TYPE_LEASE_AND_RENTAL: u32 = 0x27b59bde;

const DURATION_RESERVED: u32 = 0x86d34a3a;

/// Source of content keys and playback-duration policy, keyed by asset id.
pub trait ContentKey: Send + Sync {
    /// Look up the 16-byte content key and content IV for an asset.
    fn fetch_content_key(
        &self,
        asset_id: &[u8],
    ) -> std::result::Result<([u8; 16], [u8; 16]), ProviderError>;

    /// Look up the playback-duration policy for an asset.
    fn fetch_content_key_duration(
        &self,
        asset_id: &[u8],
    ) -> std::result::Result<ContentKeyDurationBlock, ProviderError>;
}

/// The licensee-supplied key-derivation primitive.
///
/// Derives the 16-byte DASk from the client R2 nonce and the application
/// secret key. The computation is deliberately opaque to the core.
pub trait DFunction: Send + Sync {
    fn compute(&self, r2: &[u8], ask: &[u8; 16]) -> std::result::Result<[u8; 16], ProviderError>;
}

/// Playback-duration policy returned by the content-key provider.
///
/// Serializes to the ContentKeyDuration TLLV appended to a CKC when the
/// SPC carried a MediaPlaybackState block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentKeyDurationBlock {
    /// Lease duration in seconds.
    pub lease_duration: u32,
    /// Rental duration in seconds.
    pub rental_duration: u32,
    /// One of the `KEY_TYPE_*` enumerants.
    pub key_type: u32,
}

impl ContentKeyDurationBlock {
    /// Create a duration block.
    pub fn new(lease_duration: u32, rental_duration: u32, key_type: u32) -> Self {
        Self {
            lease_duration,
            rental_duration,
            key_type,
        }
    }

    /// Serialize to a ContentKeyDuration TLLV.
    pub fn serialize(&self) -> Vec<u8> {
        let mut value = Vec::with_capacity(16);
        codec::put_be_u32(&mut value, self.lease_duration);
        codec::put_be_u32(&mut value, self.rental_duration);
        codec::put_be_u32(&mut value, self.key_type);
        codec::put_be_u32(&mut value, DURATION_RESERVED);
        TllvBlock::new(tllv::TAG_CONTENT_KEY_DURATION, value).serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_block_serializes_to_a_tllv() {
        let wire = ContentKeyDurationBlock::new(3600, 86400, KEY_TYPE_LEASE_AND_RENTAL).serialize();

        assert_eq!(wire.len(), 32);
        assert_eq!(&wire[0..8], &tllv::TAG_CONTENT_KEY_DURATION.to_be_bytes());
        assert_eq!(&wire[8..12], &16u32.to_be_bytes());
        assert_eq!(&wire[12..16], &16u32.to_be_bytes());
        assert_eq!(&wire[16..20], &3600u32.to_be_bytes());
        assert_eq!(&wire[20..24], &86400u32.to_be_bytes());
        assert_eq!(&wire[24..28], &KEY_TYPE_LEASE_AND_RENTAL.to_be_bytes());
        assert_eq!(&wire[28..32], &DURATION_RESERVED.to_be_bytes());
    }
}
