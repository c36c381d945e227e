//! Deterministic field-level encryption for stored clinical values.
//!
//! Every text field is independently enciphered with AES-256-ECB and
//! PKCS#7 padding, then base64-encoded. Identical normalized plaintext
//! always yields identical ciphertext, which is what makes equality
//! lookup by enciphered patient identifier possible without decrypting
//! the store, and it is a deliberate, documented tradeoff: duplicate
//! plaintext values are visible as duplicate ciphertexts. A production
//! redesign would pair a keyed blind index for equality search with a
//! non-deterministic cipher for the stored value itself.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, Key, KeyInit};
use aes::Aes256;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use super::FieldCodecError;
use crate::models::MISSING_TEXT;

const BLOCK_SIZE: usize = 16;
pub const KEY_LENGTH: usize = 32;

/// Key bytes, zeroed on drop to prevent memory leakage.
#[derive(Zeroize)]
#[zeroize(drop)]
struct FieldKey {
    bytes: [u8; KEY_LENGTH],
}

/// Deterministic symmetric codec for individual stored fields.
pub struct FieldCodec {
    key: FieldKey,
}

impl FieldCodec {
    /// Derive the codec key as SHA-256 of a passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut bytes = [0u8; KEY_LENGTH];
        bytes.copy_from_slice(&digest);
        Self {
            key: FieldKey { bytes },
        }
    }

    /// Build a codec from raw key bytes.
    pub fn from_key_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self {
            key: FieldKey { bytes },
        }
    }

    /// Canonical plaintext form: internal whitespace runs collapsed to a
    /// single space, ends trimmed. Encryption always normalizes first, so
    /// `decrypt(encrypt(s))` returns `normalize(s)`.
    pub fn normalize(value: &str) -> String {
        value.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Encrypt a plaintext field value. Deterministic: the same
    /// normalized input always produces the same output.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, FieldCodecError> {
        let normalized = Self::normalize(plaintext);
        let data = normalized.as_bytes();

        // Buffer: plaintext + up to one full block of PKCS#7 padding
        let mut buf = vec![0u8; data.len() + BLOCK_SIZE];
        buf[..data.len()].copy_from_slice(data);

        let key = Key::<Aes256>::from_slice(&self.key.bytes);
        let ciphertext = ecb::Encryptor::<Aes256>::new(key)
            .encrypt_padded_mut::<Pkcs7>(&mut buf, data.len())
            .map_err(|_| FieldCodecError::EncryptionFailed)?;

        Ok(BASE64.encode(ciphertext))
    }

    /// Encrypt the sentinel stored for a missing text value.
    pub fn encrypt_missing(&self) -> Result<String, FieldCodecError> {
        self.encrypt(MISSING_TEXT)
    }

    /// Decrypt a base64-encoded ciphertext back to plaintext.
    pub fn decrypt(&self, encoded: &str) -> Result<String, FieldCodecError> {
        let mut buf = BASE64
            .decode(encoded)
            .map_err(|_| FieldCodecError::Encoding)?;

        let key = Key::<Aes256>::from_slice(&self.key.bytes);
        let plaintext = ecb::Decryptor::<Aes256>::new(key)
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|_| FieldCodecError::Padding)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| FieldCodecError::Utf8)
    }

    /// Structural heuristic: does this stored value look like one of our
    /// ciphertexts? True when the value is strict base64 and its decoded
    /// length is a nonzero multiple of the cipher block size.
    ///
    /// Known imprecision: a plaintext that happens to be valid base64 of
    /// a block-aligned length sniffs as ciphertext, and decryption of it
    /// will fail (the assembler substitutes a visible sentinel). The
    /// reverse cannot happen for values this codec produced.
    pub fn looks_like_ciphertext(value: &str) -> bool {
        match BASE64.decode(value) {
            Ok(raw) => !raw.is_empty() && raw.len() % BLOCK_SIZE == 0,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_codec() -> FieldCodec {
        FieldCodec::from_passphrase("test-passphrase")
    }

    #[test]
    fn round_trip_returns_normalized_plaintext() {
        let codec = test_codec();
        for s in [
            "Glucose 95 mg/dL",
            "  leading and trailing  ",
            "internal\t\twhitespace\n runs",
            "plain",
            "",
        ] {
            let expected = FieldCodec::normalize(s);
            let ct = codec.encrypt(s).unwrap();
            assert_eq!(codec.decrypt(&ct).unwrap(), expected, "input: {s:?}");
        }
    }

    #[test]
    fn encryption_is_deterministic() {
        let codec = test_codec();
        let a = codec.encrypt("patient-123").unwrap();
        let b = codec.encrypt("patient-123").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn whitespace_variants_collide_after_normalization() {
        let codec = test_codec();
        let a = codec.encrypt("  patient   123 ").unwrap();
        let b = codec.encrypt("patient 123").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_plaintexts_produce_distinct_ciphertexts() {
        let codec = test_codec();
        let a = codec.encrypt("patient-1").unwrap();
        let b = codec.encrypt("patient-2").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let ct = test_codec().encrypt("secret value").unwrap();
        let other = FieldCodec::from_passphrase("different-passphrase");
        assert!(matches!(
            other.decrypt(&ct),
            Err(FieldCodecError::Padding) | Err(FieldCodecError::Utf8)
        ));
    }

    #[test]
    fn decrypt_rejects_malformed_base64() {
        let codec = test_codec();
        assert!(matches!(
            codec.decrypt("not base64 at all!!"),
            Err(FieldCodecError::Encoding)
        ));
    }

    #[test]
    fn decrypt_rejects_non_block_aligned_ciphertext() {
        let codec = test_codec();
        // Valid base64, decoded length 5, cannot be our ciphertext
        let bogus = BASE64.encode(b"hello");
        assert!(codec.decrypt(&bogus).is_err());
    }

    #[test]
    fn ciphertexts_sniff_as_ciphertext() {
        let codec = test_codec();
        for s in ["Data Unknown", "x", "a longer clinical note value"] {
            let ct = codec.encrypt(s).unwrap();
            assert!(FieldCodec::looks_like_ciphertext(&ct), "for {s:?}");
        }
    }

    #[test]
    fn plain_values_do_not_sniff_as_ciphertext() {
        for s in [
            "Data Unknown",
            "Glucose 95 mg/dL",
            "2021-03-04",
            "",
            "hello",
        ] {
            assert!(!FieldCodec::looks_like_ciphertext(s), "for {s:?}");
        }
    }

    #[test]
    fn missing_sentinel_encrypts_like_literal() {
        let codec = test_codec();
        assert_eq!(
            codec.encrypt_missing().unwrap(),
            codec.encrypt("Data Unknown").unwrap()
        );
    }

    #[test]
    fn key_derivation_is_stable() {
        let a = FieldCodec::from_passphrase("k").encrypt("v").unwrap();
        let b = FieldCodec::from_passphrase("k").encrypt("v").unwrap();
        assert_eq!(a, b);
    }
}
