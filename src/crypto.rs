//! Crypto façade over the RustCrypto primitives used by the key exchange.
//!
//! All AES variants use 128-bit keys. The SPC payload and the SK/R1
//! payload are block-aligned on the wire and carry no PKCS#7 padding, so
//! the CBC helpers come in both padded and raw flavors; callers pick the
//! mode the protocol expects at each site.

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::Aes128;
use rsa::{Oaep, RsaPrivateKey};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

fn check_key_iv(key: &[u8], iv: &[u8]) -> Result<([u8; 16], [u8; 16])> {
    if key.len() != 16 {
        return Err(Error::CryptoFailure(format!(
            "invalid AES key length: expected 16, got {}",
            key.len()
        )));
    }
    if iv.len() != 16 {
        return Err(Error::CryptoFailure(format!(
            "invalid IV length: expected 16, got {}",
            iv.len()
        )));
    }
    Ok((key.try_into().unwrap(), iv.try_into().unwrap()))
}

fn check_block_aligned(label: &str, len: usize) -> Result<()> {
    if !len.is_multiple_of(AES_BLOCK_SIZE) {
        return Err(Error::CryptoFailure(format!(
            "{} length {} is not a multiple of the AES block size",
            label, len
        )));
    }
    Ok(())
}

/// AES-128-CBC encrypt with PKCS#7 padding.
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let (key, iv) = check_key_iv(key, iv)?;
    Ok(Aes128CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// AES-128-CBC encrypt of an already block-aligned plaintext, no padding.
pub fn aes_cbc_encrypt_raw(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let (key, iv) = check_key_iv(key, iv)?;
    check_block_aligned("plaintext", plaintext.len())?;
    Ok(Aes128CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<NoPadding>(plaintext))
}

/// AES-128-CBC decrypt with PKCS#7 padding stripped.
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let (key, iv) = check_key_iv(key, iv)?;
    check_block_aligned("ciphertext", ciphertext.len())?;
    Aes128CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| Error::CryptoFailure(format!("AES-CBC unpad: {}", e)))
}

/// AES-128-CBC decrypt of a block-aligned ciphertext, no unpad.
pub fn aes_cbc_decrypt_raw(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let (key, iv) = check_key_iv(key, iv)?;
    check_block_aligned("ciphertext", ciphertext.len())?;
    Aes128CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|e| Error::CryptoFailure(format!("AES-CBC: {}", e)))
}

/// AES-128-ECB encrypt of a single 16-byte block.
pub fn aes_ecb_encrypt_block(key: &[u8], block: &[u8]) -> Result<[u8; 16]> {
    if key.len() != 16 {
        return Err(Error::CryptoFailure(format!(
            "invalid AES key length: expected 16, got {}",
            key.len()
        )));
    }
    if block.len() != AES_BLOCK_SIZE {
        return Err(Error::CryptoFailure(format!(
            "ECB input must be a single {}-byte block, got {}",
            AES_BLOCK_SIZE,
            block.len()
        )));
    }
    let key: [u8; 16] = key.try_into().unwrap();
    let cipher = Aes128::new(&key.into());
    let mut out = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut out);
    Ok(out.into())
}

/// RSA-OAEP decrypt with SHA-1 as both label hash and MGF1 hash.
pub fn rsa_oaep_sha1_decrypt(private_key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    Ok(private_key.decrypt(Oaep::new::<Sha1>(), ciphertext)?)
}

/// SHA-1 digest.
pub fn sha1_digest(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}

#[cfg(test)]
mod tests {
    use rsa::rand_core::OsRng;
    use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
    use sha1::Sha1;

    use super::*;

    #[test]
    fn ecb_matches_fips_197_vector() {
        let key = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let block = hex::decode("00112233445566778899aabbccddeeff").unwrap();
        let out = aes_ecb_encrypt_block(&key, &block).unwrap();
        assert_eq!(hex::encode(out), "69c4e0d86a7b0430d8cdb78070b4c55a");
    }

    #[test]
    fn cbc_raw_matches_sp800_38a_vector() {
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let iv = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
        let ciphertext = aes_cbc_encrypt_raw(&key, &iv, &plaintext).unwrap();
        assert_eq!(hex::encode(&ciphertext), "7649abac8119b246cee98e9b12e9197d");

        let decrypted = aes_cbc_decrypt_raw(&key, &iv, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn cbc_padded_roundtrip() {
        let key = [0x11u8; 16];
        let iv = [0x22u8; 16];
        let plaintext = b"not block aligned";

        let ciphertext = aes_cbc_encrypt(&key, &iv, plaintext).unwrap();
        assert_eq!(ciphertext.len() % AES_BLOCK_SIZE, 0);
        assert!(ciphertext.len() > plaintext.len());

        let decrypted = aes_cbc_decrypt(&key, &iv, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn cbc_raw_rejects_ragged_input() {
        let key = [0u8; 16];
        let iv = [0u8; 16];
        assert!(matches!(
            aes_cbc_encrypt_raw(&key, &iv, &[0u8; 15]),
            Err(Error::CryptoFailure(_))
        ));
        assert!(matches!(
            aes_cbc_decrypt_raw(&key, &iv, &[0u8; 17]),
            Err(Error::CryptoFailure(_))
        ));
    }

    #[test]
    fn bad_key_and_iv_lengths_are_rejected() {
        assert!(aes_cbc_encrypt(&[0u8; 8], &[0u8; 16], b"x").is_err());
        assert!(aes_cbc_encrypt(&[0u8; 16], &[0u8; 12], b"x").is_err());
        assert!(aes_ecb_encrypt_block(&[0u8; 16], &[0u8; 12]).is_err());
    }

    #[test]
    fn sha1_matches_known_vector() {
        assert_eq!(
            hex::encode(sha1_digest(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn oaep_roundtrips_a_session_key() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let public_key = RsaPublicKey::from(&private_key);

        let spck = [0xabu8; 16];
        let wrapped = public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha1>(), &spck)
            .unwrap();
        assert_eq!(wrapped.len(), 128);

        let unwrapped = rsa_oaep_sha1_decrypt(&private_key, &wrapped).unwrap();
        assert_eq!(unwrapped, spck);
    }

    #[test]
    fn oaep_garbage_is_a_crypto_failure() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let err = rsa_oaep_sha1_decrypt(&private_key, &[0x5au8; 128]).unwrap_err();
        assert!(matches!(err, Error::CryptoFailure(_)));
    }
}
