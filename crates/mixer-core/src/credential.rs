//! Local passphrase gate.
//!
//! Setup derives a key from the passphrase (PBKDF2-HMAC-SHA256, 100k rounds)
//! and seals an empty marker with AES-256-GCM. Verification re-derives the key
//! from the stored salt and succeeds iff the authentication tag checks out.
//! Nothing secret is stored: salt, nonce and the 16-byte tag only.
//!
//! On disk the record is `base64(json)` with the fields
//! `{salt: [u8; 32], nonce: [u8; 12], encryptedData: [u8]}`.

use crate::crypto::{decrypt, derive_key, encrypt, generate_nonce, generate_salt, NONCE_LEN, SALT_LEN};
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CREDENTIAL_FILE: &str = "credential.dat";
const MARKER: &[u8] = b"";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub encrypted_data: Vec<u8>,
}

impl CredentialRecord {
    pub fn seal(passphrase: &str) -> Result<Self> {
        let salt = generate_salt();
        let nonce = generate_nonce();
        let key = derive_key(passphrase, &salt);
        let encrypted_data = encrypt(&key[..], &nonce, MARKER)?;
        Ok(Self {
            salt,
            nonce,
            encrypted_data,
        })
    }

    pub fn opens_with(&self, passphrase: &str) -> bool {
        let key = derive_key(passphrase, &self.salt);
        decrypt(&key[..], &self.nonce, &self.encrypted_data).is_ok()
    }

    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(general_purpose::STANDARD.encode(json))
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let json = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| anyhow!("decode credential record: {e}"))?;
        serde_json::from_slice(&json).map_err(|e| anyhow!("parse credential record: {e}"))
    }
}

#[derive(Debug, Clone)]
pub struct CredentialGate {
    path: PathBuf,
}

impl CredentialGate {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn in_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self::new(data_dir.as_ref().join(CREDENTIAL_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_configured(&self) -> bool {
        self.path.exists()
    }

    /// Seals a fresh record for `passphrase`. Overwrites any existing record.
    pub fn setup(&self, passphrase: &str) -> Result<()> {
        let record = CredentialRecord::seal(passphrase)?;
        let encoded = record.encode()?;
        let dir = self
            .path
            .parent()
            .ok_or_else(|| anyhow!("credential path has no parent"))?;
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(encoded.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| anyhow!("persist credential record: {e}"))?;
        debug!(path = %self.path.display(), "credential record written");
        Ok(())
    }

    /// Fails closed: a missing or unreadable record is a wrong password.
    pub fn verify(&self, passphrase: &str) -> bool {
        match self.load() {
            Ok(Some(record)) => record.opens_with(passphrase),
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "credential record unreadable");
                false
            }
        }
    }

    pub fn load(&self) -> Result<Option<CredentialRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let encoded = fs::read_to_string(&self.path)?;
        Ok(Some(CredentialRecord::decode(&encoded)?))
    }
}
