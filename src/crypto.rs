use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, bail, Context, Result};
use argon2::password_hash::SaltString;
use argon2::Argon2;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::SystemTime;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::shamir::{RecoveredSecret, ShareKind};

/// Extension given to encrypted files
pub const ENCRYPTED_EXTENSION: &str = "splitsecret";

/// Encrypted data with metadata required for decryption
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EncryptedData {
    /// Base64-encoded ciphertext
    pub ciphertext: String,
    /// Base64-encoded nonce
    pub nonce: String,
    /// Salt used for key derivation
    pub salt: String,
}

/// Cipher used for an [`EncryptedFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CipherSuite {
    /// AES-256-GCM with a key derived by Argon2id
    Aes256GcmArgon2id,
}

/// A single encrypted file together with its original name and date
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EncryptedFile {
    pub cipher: CipherSuite,
    pub file_name: String,
    pub modified_at: DateTime<Utc>,
    pub payload: EncryptedData,
}

/// Wrapper for handling sensitive data like passphrases
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    pub fn new(value: String) -> Self {
        Self { inner: value }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Random master key of `bits` bits for encrypting a file
pub fn generate_master_key(bits: usize) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(vec![0u8; bits.div_ceil(8)]);
    ChaCha20Rng::from_entropy().fill_bytes(&mut key[..]);
    key
}

/// The passphrase protecting a file: the recovered master key as lowercase hex
pub fn file_passphrase(secret: &RecoveredSecret) -> Result<SecretString> {
    if secret.kind() != ShareKind::File {
        bail!("Secret must be of the file type to decrypt a file");
    }
    Ok(SecretString::new(secret.hex()))
}

fn derive_key(passphrase: &SecretString, salt: &SaltString) -> Result<Zeroizing<[u8; 32]>> {
    let mut key = Zeroizing::new([0u8; 32]); // AES-256 key
    Argon2::default()
        .hash_password_into(
            passphrase.as_bytes(),
            salt.as_salt().as_str().as_bytes(),
            &mut key[..],
        )
        .map_err(|e| anyhow!("Key derivation failed: {}", e))?;
    Ok(key)
}

/// Encrypt data using AES-GCM with a passphrase-derived key
pub fn encrypt(data: &[u8], passphrase: &SecretString) -> Result<EncryptedData> {
    let salt = SaltString::generate(&mut OsRng);
    let key = derive_key(passphrase, &salt)?;

    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, data)
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok(EncryptedData {
        ciphertext: general_purpose::STANDARD.encode(&ciphertext),
        nonce: general_purpose::STANDARD.encode(nonce),
        salt: salt.as_str().to_string(),
    })
}

/// Decrypt data using AES-GCM with a passphrase-derived key
pub fn decrypt(encrypted: &EncryptedData, passphrase: &SecretString) -> Result<Vec<u8>> {
    let ciphertext = general_purpose::STANDARD
        .decode(&encrypted.ciphertext)
        .context("Failed to decode ciphertext")?;
    let nonce_bytes = general_purpose::STANDARD
        .decode(&encrypted.nonce)
        .context("Failed to decode nonce")?;
    if nonce_bytes.len() != 12 {
        bail!("Invalid nonce length: {}", nonce_bytes.len());
    }

    let salt = SaltString::from_b64(&encrypted.salt).map_err(|e| anyhow!("Invalid salt: {}", e))?;
    let key = derive_key(passphrase, &salt)?;

    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| anyhow!("Decryption failed. Wrong shares?"))
}

/// Encrypt the file at `path`, keeping its name and modification date
pub fn encrypt_file(path: &Path, passphrase: &SecretString) -> Result<EncryptedFile> {
    let mut contents = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("File name is not valid UTF-8")?
        .to_string();
    let modified_at = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    let payload = encrypt(&contents, passphrase)?;
    contents.zeroize();

    Ok(EncryptedFile {
        cipher: CipherSuite::Aes256GcmArgon2id,
        file_name,
        modified_at,
        payload,
    })
}

/// Decrypt an [`EncryptedFile`] back into the original contents
pub fn decrypt_file(encrypted: &EncryptedFile, passphrase: &SecretString) -> Result<Vec<u8>> {
    match encrypted.cipher {
        CipherSuite::Aes256GcmArgon2id => decrypt(&encrypted.payload, passphrase),
    }
}

impl EncryptedFile {
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents).context("Failed to parse encrypted file")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize encrypted file")?;
        fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Write decrypted contents to `path` and restore the original modification date.
    /// Refuses to overwrite an existing file.
    pub fn restore_to(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut file = match fs::File::options().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                bail!("Refusing to overwrite {}", path.display())
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to create {}", path.display()))
            }
        };
        file.write_all(contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        file.set_modified(SystemTime::from(self.modified_at))
            .context("Failed to restore modification date")?;
        Ok(())
    }
}
