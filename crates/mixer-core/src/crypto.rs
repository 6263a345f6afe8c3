use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{anyhow, Result};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

pub const KDF_ITERATIONS: u32 = 100_000;
pub const DERIVED_KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// PBKDF2-HMAC-SHA256 over (password, salt), 256-bit output.
pub fn derive_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; DERIVED_KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ITERATIONS, &mut key[..]);
    key
}

pub fn encrypt(key: &[u8], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("aes key: {e}"))?;
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| anyhow!("encrypt: {e}"))
}

pub fn decrypt(key: &[u8], nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("aes key: {e}"))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| anyhow!("decrypt: {e}"))
}

pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_is_deterministic_per_salt() {
        let salt = [7u8; SALT_LEN];
        let a = derive_key("pw", &salt);
        let b = derive_key("pw", &salt);
        let c = derive_key("pw", &[8u8; SALT_LEN]);
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let key = derive_key("pw", &generate_salt());
        let nonce = generate_nonce();
        let mut ct = encrypt(&key[..], &nonce, b"payload").unwrap();
        assert_eq!(decrypt(&key[..], &nonce, &ct).unwrap(), b"payload");
        ct[0] ^= 0x01;
        assert!(decrypt(&key[..], &nonce, &ct).is_err());
    }
}
