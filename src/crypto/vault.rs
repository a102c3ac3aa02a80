use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use aes_gcm::aead::rand_core::RngCore;
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};
use crate::error::{AppError, Result};

/// The size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// The size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// The size of the AES-GCM authentication tag in bytes.
const TAG_SIZE: usize = 16;

/// A secure key wrapper that ensures the key is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecureKey([u8; KEY_SIZE]);

impl SecureKey {
    /// Creates a new `SecureKey` from a byte array.
    ///
    /// # Arguments
    ///
    /// * `key` - A 32-byte array representing the AES-256 key.
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self(key)
    }

    /// Returns a reference to the key as a byte slice.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Generates a new random AES-GCM nonce.
///
/// # Returns
///
/// A 12-byte array representing the nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypts a plaintext using AES-256-GCM.
///
/// # Arguments
///
/// * `key` - The AES-256 key.
/// * `plaintext` - The data to encrypt.
///
/// # Returns
///
/// A tuple containing the ciphertext and the nonce used for encryption.
fn encrypt_raw(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_SIZE])> {
    let cipher = Aes256Gcm::new(key.into());

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from(nonce_bytes);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| AppError::Encryption(format!("Encryption failed: {}", e)))?;

    Ok((ciphertext, nonce_bytes))
}

/// Decrypts a ciphertext using AES-256-GCM.
///
/// # Arguments
///
/// * `key` - The AES-256 key.
/// * `ciphertext` - The data to decrypt.
/// * `nonce` - The nonce used for encryption.
///
/// # Returns
///
/// The decrypted plaintext.
fn decrypt_raw(key: &[u8; KEY_SIZE], ciphertext: &[u8], nonce: &[u8; NONCE_SIZE]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.into());
    let nonce = Nonce::from(*nonce);

    cipher
        .decrypt(&nonce, ciphertext)
        .map_err(|e| AppError::Encryption(format!("Decryption failed: {}", e)))
}

/// Encrypts platform credentials and session blobs before they reach the
/// database, and decrypts them on the way back out.
///
/// Token format: URL-safe base64 over `nonce (12 bytes) || ciphertext`.
/// Tokens land in TEXT columns, so everything stays string-shaped.
#[derive(Clone)]
pub struct Vault {
    key: Arc<SecureKey>,
}

impl Vault {
    /// Creates a new `Vault` over the process master key.
    ///
    /// # Arguments
    ///
    /// * `master_key` - The 32-byte master key.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Vault`.
    pub fn new(master_key: &[u8]) -> Result<Self> {
        let key: [u8; KEY_SIZE] = master_key
            .try_into()
            .map_err(|_| AppError::Encryption("Master key must be exactly 32 bytes".to_string()))?;
        Ok(Self {
            key: Arc::new(SecureKey::new(key)),
        })
    }

    /// Encrypts a plaintext string into a vault token.
    ///
    /// # Arguments
    ///
    /// * `plaintext` - The value to protect.
    ///
    /// # Returns
    ///
    /// A `Result` containing the vault token.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let (ciphertext, nonce) = encrypt_raw(self.key.as_bytes(), plaintext.as_bytes())?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);

        Ok(general_purpose::URL_SAFE_NO_PAD.encode(combined))
    }

    /// Decrypts a vault token back into the plaintext string.
    ///
    /// # Arguments
    ///
    /// * `token` - A token produced by [`Vault::encrypt`].
    ///
    /// # Returns
    ///
    /// A `Result` containing the plaintext.
    pub fn decrypt(&self, token: &str) -> Result<String> {
        let combined = general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| AppError::Encryption(format!("Invalid vault token encoding: {}", e)))?;

        if combined.len() < NONCE_SIZE + TAG_SIZE {
            return Err(AppError::Encryption("Vault token too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        let nonce: [u8; NONCE_SIZE] = nonce_bytes
            .try_into()
            .map_err(|_| AppError::Encryption("Invalid vault token nonce".to_string()))?;

        let plaintext = decrypt_raw(self.key.as_bytes(), ciphertext, &nonce)?;

        String::from_utf8(plaintext)
            .map_err(|_| AppError::Encryption("Vault plaintext is not valid UTF-8".to_string()))
    }

    /// Encrypts an optional value, passing `None` through untouched.
    pub fn encrypt_opt(&self, plaintext: Option<&str>) -> Result<Option<String>> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }

    /// Decrypts an optional token, passing `None` through untouched.
    pub fn decrypt_opt(&self, token: Option<&str>) -> Result<Option<String>> {
        token.map(|t| self.decrypt(t)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vault() -> Vault {
        Vault::new(&[7u8; KEY_SIZE]).unwrap()
    }

    #[test]
    fn roundtrip_restores_plaintext() {
        let vault = test_vault();
        let token = vault.encrypt("insta_password_123").unwrap();
        assert_ne!(token, "insta_password_123");
        assert_eq!(vault.decrypt(&token).unwrap(), "insta_password_123");
    }

    #[test]
    fn same_plaintext_yields_distinct_tokens() {
        let vault = test_vault();
        let a = vault.encrypt("same").unwrap();
        let b = vault.encrypt("same").unwrap();
        assert_ne!(a, b);
        assert_eq!(vault.decrypt(&a).unwrap(), vault.decrypt(&b).unwrap());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let vault = test_vault();
        let token = vault.encrypt("secret session blob").unwrap();

        let mut bytes = general_purpose::URL_SAFE_NO_PAD.decode(&token).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = general_purpose::URL_SAFE_NO_PAD.encode(bytes);

        assert!(matches!(
            vault.decrypt(&tampered),
            Err(AppError::Encryption(_))
        ));
    }

    #[test]
    fn truncated_token_is_rejected() {
        let vault = test_vault();
        assert!(matches!(
            vault.decrypt("AAAA"),
            Err(AppError::Encryption(_))
        ));
        assert!(matches!(vault.decrypt("not base64!!"), Err(AppError::Encryption(_))));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = test_vault().encrypt("payload").unwrap();
        let other = Vault::new(&[8u8; KEY_SIZE]).unwrap();
        assert!(matches!(other.decrypt(&token), Err(AppError::Encryption(_))));
    }

    #[test]
    fn optional_values_pass_none_through() {
        let vault = test_vault();
        assert_eq!(vault.encrypt_opt(None).unwrap(), None);
        assert_eq!(vault.decrypt_opt(None).unwrap(), None);

        let token = vault.encrypt_opt(Some("creds")).unwrap().unwrap();
        assert_eq!(vault.decrypt_opt(Some(&token)).unwrap().as_deref(), Some("creds"));
    }

    #[test]
    fn master_key_must_be_32_bytes() {
        assert!(Vault::new(&[1u8; 16]).is_err());
        assert!(Vault::new(&[]).is_err());
    }
}
