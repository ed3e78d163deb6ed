//! Field-level RSA encryption.
//!
//! Bank transfers carry the account number and the account holder's name encrypted with
//! an RSA public key issued by the provider. Each field is encrypted on its own and
//! embedded base64-encoded in an otherwise plaintext payload.
//!
//! # Examples
//!
//! ```
//! use wechat_transfer::crypto::{EncryptionPadding, FieldEncryptor};
//!
//! # fn example() -> wechat_transfer::error::Result<()> {
//! let pem = "-----BEGIN PUBLIC KEY-----
//! MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAu1SU1LfVLPHCozMxH2Mo
//! 4lgOEePzNm0tRgeLezV6ffAt0gunVTLw7onLRnrq0/IzW7yWR7QkrmBL7jTKEn5u
//! +qKhbwKfBstIs+bMY2Zkp18gnTxKLxoS2tFczGkPLPgizskuemMghRniWaoLcyeh
//! kd3qqGElvW/VDL5AaWTg0nLVkjRo9z+40RQzuVaE8AkAFmxZzow3x+VJYKdjykkJ
//! 0iT9wCS0DRTXu269V264Vf/3jvredZiKRkgwlL9xNAwxXFg0x/XFw005UWVRIkdg
//! cKWTjpBP2dPwVZ4WWC+9aGVd+Gyn1o0CLelf4rEjGoXbAAEgAqeGUxrcIlbjXfbc
//! mwIDAQAB
//! -----END PUBLIC KEY-----";
//!
//! let encryptor = FieldEncryptor::from_pem(pem, EncryptionPadding::Oaep)?;
//! let enc_bank_no = encryptor.encrypt("6225760000000000")?;
//! assert!(!enc_bank_no.contains("6225"));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use base64::Engine;
use rsa::{
    Oaep, Pkcs1v15Encrypt, RsaPublicKey, pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey,
};
use serde::Deserialize;

use crate::error::{Result, TransferError};

/// RSA padding scheme used for field encryption.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionPadding {
    /// RSAES-OAEP with SHA-1 and MGF1-SHA-1 (`RSA_PKCS1_OAEP_PADDING`), what the provider
    /// documents for bank transfers.
    #[default]
    Oaep,
    /// RSAES-PKCS1-v1_5.
    Pkcs1v15,
}

/// Encrypts individual payload fields with a provider public key.
#[derive(Debug, Clone)]
pub struct FieldEncryptor {
    key: RsaPublicKey,
    padding: EncryptionPadding,
}

impl FieldEncryptor {
    /// Parses a PEM public key.
    ///
    /// Accepts PKCS#1 (`-----BEGIN RSA PUBLIC KEY-----`, the format the provider issues)
    /// and SubjectPublicKeyInfo (`-----BEGIN PUBLIC KEY-----`).
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::CryptoError`] if the PEM is neither format.
    pub fn from_pem(pem: &str, padding: EncryptionPadding) -> Result<Self> {
        let pem = pem.trim();
        let key = RsaPublicKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
            .map_err(|e| TransferError::CryptoError(format!("failed to load RSA public key: {e}")))?;

        Ok(Self { key, padding })
    }

    /// Creates an encryptor from an already parsed key.
    #[must_use]
    pub const fn from_key(key: RsaPublicKey, padding: EncryptionPadding) -> Self {
        Self { key, padding }
    }

    /// Encrypts `plaintext` and returns the ciphertext base64-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::CryptoError`] if the plaintext is too long for the key
    /// and padding.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut rng = rand::thread_rng();
        let ciphertext = match self.padding {
            EncryptionPadding::Oaep => {
                self.key.encrypt(&mut rng, Oaep::new::<sha1::Sha1>(), plaintext.as_bytes())
            }
            EncryptionPadding::Pkcs1v15 => {
                self.key.encrypt(&mut rng, Pkcs1v15Encrypt, plaintext.as_bytes())
            }
        }
        .map_err(|e| TransferError::CryptoError(format!("field encryption failed: {e}")))?;

        Ok(base64::engine::general_purpose::STANDARD.encode(ciphertext))
    }

    /// Returns the padding in use.
    #[must_use]
    pub const fn padding(&self) -> EncryptionPadding {
        self.padding
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use rsa::{
        RsaPrivateKey,
        pkcs1::{EncodeRsaPublicKey, LineEnding},
        pkcs8::EncodePublicKey,
    };

    use super::*;

    // Key generation is slow in debug builds; share one pair across tests.
    static KEY_PAIR: LazyLock<RsaPrivateKey> = LazyLock::new(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("key generation")
    });

    fn test_key_pair() -> (RsaPrivateKey, RsaPublicKey) {
        let private = KEY_PAIR.clone();
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    fn decode(ciphertext: &str) -> Vec<u8> {
        base64::engine::general_purpose::STANDARD.decode(ciphertext).expect("valid base64")
    }

    #[test]
    fn test_oaep_roundtrip_with_pkcs1_pem() {
        let (private, public) = test_key_pair();
        let pem = public.to_pkcs1_pem(LineEnding::LF).unwrap();
        assert!(pem.starts_with("-----BEGIN RSA PUBLIC KEY-----"));

        let encryptor = FieldEncryptor::from_pem(&pem, EncryptionPadding::Oaep).unwrap();
        let ciphertext = encryptor.encrypt("张三").unwrap();

        let plaintext = private.decrypt(Oaep::new::<sha1::Sha1>(), &decode(&ciphertext)).unwrap();
        assert_eq!(plaintext, "张三".as_bytes());
    }

    #[test]
    fn test_pkcs1v15_roundtrip_with_spki_pem() {
        let (private, public) = test_key_pair();
        let pem = public.to_public_key_pem(LineEnding::LF).unwrap();

        let encryptor = FieldEncryptor::from_pem(&pem, EncryptionPadding::Pkcs1v15).unwrap();
        assert_eq!(encryptor.padding(), EncryptionPadding::Pkcs1v15);
        let ciphertext = encryptor.encrypt("6225760000000000").unwrap();

        let plaintext = private.decrypt(Pkcs1v15Encrypt, &decode(&ciphertext)).unwrap();
        assert_eq!(plaintext, b"6225760000000000");
    }

    #[test]
    fn test_encryption_is_randomized() {
        let (_, public) = test_key_pair();
        let encryptor = FieldEncryptor::from_key(public, EncryptionPadding::Oaep);
        assert_ne!(encryptor.encrypt("same").unwrap(), encryptor.encrypt("same").unwrap());
    }

    #[test]
    fn test_ciphertext_length_matches_modulus() {
        let (_, public) = test_key_pair();
        let encryptor = FieldEncryptor::from_key(public, EncryptionPadding::Oaep);
        assert_eq!(decode(&encryptor.encrypt("x").unwrap()).len(), 128);
    }

    #[test]
    fn test_plaintext_too_long() {
        let (_, public) = test_key_pair();
        let encryptor = FieldEncryptor::from_key(public, EncryptionPadding::Oaep);
        // 1024-bit OAEP/SHA-1 fits at most 128 - 2 * 20 - 2 = 86 bytes.
        let err = encryptor.encrypt(&"9".repeat(87)).unwrap_err();
        assert!(matches!(err, TransferError::CryptoError(_)));
    }

    #[test]
    fn test_invalid_pem_rejected() {
        let pem = "-----BEGIN PUBLIC KEY-----\ngarbage\n-----END PUBLIC KEY-----";
        let err = FieldEncryptor::from_pem(pem, EncryptionPadding::Oaep).unwrap_err();
        assert!(err.to_string().contains("failed to load RSA public key"));
    }

    #[test]
    fn test_padding_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            encryption_padding: EncryptionPadding,
        }

        let wrapper: Wrapper = toml::from_str("encryption_padding = \"pkcs1v15\"").unwrap();
        assert_eq!(wrapper.encryption_padding, EncryptionPadding::Pkcs1v15);
        let wrapper: Wrapper = toml::from_str("encryption_padding = \"oaep\"").unwrap();
        assert_eq!(wrapper.encryption_padding, EncryptionPadding::Oaep);
    }
}
