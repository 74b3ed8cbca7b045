//! Core Key Server Module implementation.
//!
//! This module handles the full request transform: decode and decrypt the
//! SPC, derive the session keys, wrap the content key, and encode the
//! CKC. The KSM holds only immutable key material and injected providers,
//! so one instance may serve requests from many threads; every request
//! works on its own buffers.

use rsa::RsaPrivateKey;

use crate::ckc::{self, CkcContainer};
use crate::codec;
use crate::crypto;
use crate::error::{Error, Result};
use crate::provider::{ContentKey, DFunction};
use crate::spc::{Skr1Block, SpcContainer};
use crate::tllv::{self, MediaPlaybackState, TllvBlock};

/// FairPlay Streaming Key Server Module.
///
/// Construct one per licensee with the server RSA private key, the
/// 16-byte application secret key, and the licensee's D-function and
/// content-key providers.
pub struct Ksm {
    private_key: RsaPrivateKey,
    ask: [u8; 16],
    d_function: Box<dyn DFunction>,
    content_key: Box<dyn ContentKey>,
}

impl Ksm {
    /// Create a KSM instance from its key material and providers.
    pub fn new(
        private_key: RsaPrivateKey,
        ask: [u8; 16],
        d_function: Box<dyn DFunction>,
        content_key: Box<dyn ContentKey>,
    ) -> Self {
        Self {
            private_key,
            ask,
            d_function,
            content_key,
        }
    }

    /// Compute the CKC answering an incoming SPC message.
    ///
    /// This is the one entry point of the key exchange: it validates and
    /// decrypts the SPC, checks the SK/R1 integrity bytes, wraps the
    /// asset's content key under the session key, echoes R1 and every
    /// ReturnRequest block, and returns the serialized CKC container.
    pub fn gen_ckc(&self, spc: &[u8]) -> Result<Vec<u8>> {
        let spc = SpcContainer::parse(spc, &self.private_key)?;

        let skr1 = Skr1Block::from_block(spc.required_block(tllv::TAG_SESSION_KEY_R1)?)?;

        let r2 = spc.required_block(tllv::TAG_R2)?;
        let dask = self
            .d_function
            .compute(&r2.value, &self.ask)
            .map_err(Error::ProviderFailure)?;

        let skr1_payload = skr1.decrypt(&dask)?;

        let integrity = spc.required_block(tllv::TAG_SESSION_KEY_R1_INTEGRITY)?;
        if integrity.value[..] != skr1_payload.integrity_bytes[..] {
            return Err(Error::IntegrityCheckFailed);
        }

        let asset = spc.required_block(tllv::TAG_ASSET_ID)?;
        if asset.value_length < 2 || asset.value_length > 200 {
            return Err(Error::MalformedMessage(format!(
                "asset id length {} outside [2, 200]",
                asset.value_length
            )));
        }
        debug!("asset id {}", hex::encode(&asset.value));

        let (content_key, content_iv) = self
            .content_key
            .fetch_content_key(&asset.value)
            .map_err(Error::ProviderFailure)?;
        let en_ck = wrap_content_key(&skr1_payload.sk, &content_key)?;

        let return_blocks = find_return_request_blocks(&spc)?;

        let seed = spc.required_block(tllv::TAG_ANTI_REPLAY_SEED)?;
        if seed.value.len() != 16 {
            return Err(Error::MalformedMessage(format!(
                "anti-replay seed must be 16 bytes, got {}",
                seed.value.len()
            )));
        }
        let ckc_key = encrypted_ar_seed(&skr1_payload.r1, &seed.value)?;

        let mut payload =
            ckc::assemble_payload(&content_iv, &en_ck, &skr1_payload.r1, &return_blocks)?;

        // The duration block may be present only when the SPC carried a
        // MediaPlaybackState block.
        if let Some(state) = spc.tllvs.get(&tllv::TAG_MEDIA_PLAYBACK_STATE) {
            let state = MediaPlaybackState::parse(&state.value)?;
            debug!(
                "playback state {:?}, session id {}",
                state.state(),
                state.session_id
            );
            let duration = self
                .content_key
                .fetch_content_key_duration(&asset.value)
                .map_err(Error::ProviderFailure)?;
            payload.extend_from_slice(&duration.serialize());
        }

        let ckc_iv: [u8; 16] = codec::random_bytes(16)?.try_into().unwrap();
        let encrypted_payload = crypto::aes_cbc_encrypt(&ckc_key, &ckc_iv, &payload)?;

        Ok(CkcContainer::new(ckc_iv, encrypted_payload).serialize())
    }
}

// enCK = AES-CBC(SK, IV = zeros, CK): a single block, no padding. The
// zero IV is as long as the content key itself.
fn wrap_content_key(sk: &[u8; 16], content_key: &[u8; 16]) -> Result<Vec<u8>> {
    let iv = [0u8; 16];
    crypto::aes_cbc_encrypt_raw(sk, &iv, content_key)
}

// The CKC payload key: AES-ECB(SHA1(R1)[0..16], anti-replay seed).
fn encrypted_ar_seed(r1: &[u8], seed: &[u8]) -> Result<[u8; 16]> {
    let ar_key: [u8; 16] = crypto::sha1_digest(r1)[..16].try_into().unwrap();
    crypto::aes_ecb_encrypt_block(&ar_key, seed)
}

// Collect, in request order, every block the ReturnRequest names. A
// requested tag absent from the SPC is a protocol violation.
fn find_return_request_blocks(spc: &SpcContainer) -> Result<Vec<TllvBlock>> {
    let Some(request) = spc.tllvs.get(&tllv::TAG_RETURN_REQUEST) else {
        return Ok(Vec::new());
    };
    if !request.value.len().is_multiple_of(tllv::FIELD_TAG_LENGTH) {
        return Err(Error::MalformedMessage(format!(
            "return request value of {} bytes is not a whole number of tags",
            request.value.len()
        )));
    }

    let mut blocks = Vec::with_capacity(request.value.len() / tllv::FIELD_TAG_LENGTH);
    for chunk in request.value.chunks_exact(tllv::FIELD_TAG_LENGTH) {
        let tag = u64::from_be_bytes(chunk.try_into().unwrap());
        let block = spc.tllvs.get(&tag).ok_or_else(|| {
            Error::MalformedMessage(format!(
                "return request names tag {:#018x} not present in SPC",
                tag
            ))
        })?;
        trace!("returning tag {:#018x}", tag);
        blocks.push(block.clone());
    }
    Ok(blocks)
}
