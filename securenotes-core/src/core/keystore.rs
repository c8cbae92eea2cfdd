//! On-disk store of per-name data keys, wrapped under a master key.
//!
//! Each name gets its own random 256-bit key. Keys are kept one per file,
//! named by the hex SHA-256 of the name so arbitrary names never reach the
//! file system, and sealed with XChaCha20-Poly1305 under a wrapping key that
//! is expanded from the [`MasterKey`] with HKDF-SHA256.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{NoteStoreError, Result};

/// Length in bytes of every key handled here.
pub const KEY_LEN: usize = 32;

const SALT_FILENAME: &str = "keystore.salt";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const WRAP_INFO: &[u8] = b"securenotes:key-wrap:v1";
const WRAP_AAD_PREFIX: &[u8] = b"securenotes:record-key:v1:";
const WRAPPED_KEY_VERSION: u8 = 1;

/// Raw key bytes, wiped on drop.
pub type KeyBytes = Zeroizing<[u8; KEY_LEN]>;

/// Root secret from which the key-wrapping key is derived.
pub struct MasterKey(KeyBytes);

impl MasterKey {
    /// Generates a random master key.
    pub fn generate() -> Self {
        Self(random_key())
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Derives a master key from `passphrase` with Argon2id.
    ///
    /// # Errors
    ///
    /// Returns [`NoteStoreError::KeyStore`] if `salt` is shorter than
    /// Argon2 accepts.
    pub fn derive(passphrase: &str, salt: &[u8]) -> Result<Self> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), salt, &mut *key)
            .map_err(|e| NoteStoreError::KeyStore(format!("argon2 derive: {e}")))?;
        Ok(Self(key))
    }

    fn wrapping_key(&self) -> Result<KeyBytes> {
        let mut okm = Zeroizing::new([0u8; KEY_LEN]);
        Hkdf::<Sha256>::new(None, &*self.0)
            .expand(WRAP_INFO, &mut *okm)
            .map_err(|e| NoteStoreError::KeyStore(format!("hkdf expand: {e}")))?;
        Ok(okm)
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// On-disk form of one wrapped key.
#[derive(Debug, Serialize, Deserialize)]
struct WrappedKey {
    version: u8,
    nonce: String,
    payload: String,
}

/// Directory of wrapped per-name keys.
pub struct KeyStore {
    dir: PathBuf,
    wrap: XChaCha20Poly1305,
}

impl KeyStore {
    /// Opens (creating if needed) a key store in `dir` under `master`.
    ///
    /// # Errors
    ///
    /// Returns [`NoteStoreError::Io`] if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(dir: P, master: &MasterKey) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
        }
        let wrapping_key = master.wrapping_key()?;
        let wrap = XChaCha20Poly1305::new(Key::from_slice(&*wrapping_key));
        Ok(Self { dir, wrap })
    }

    /// Opens a key store whose master key is derived from `passphrase`.
    ///
    /// The Argon2 salt lives next to the keys and is created on first use.
    /// A wrong passphrase is only detected when a key is first unwrapped.
    ///
    /// # Errors
    ///
    /// Returns [`NoteStoreError::Io`] for directory or salt-file failures and
    /// [`NoteStoreError::KeyStore`] if the stored salt is malformed.
    pub fn open_with_passphrase<P: AsRef<Path>>(dir: P, passphrase: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let salt = load_or_create_salt(&dir.join(SALT_FILENAME))?;
        let master = MasterKey::derive(passphrase, &salt)?;
        Self::open(dir, &master)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.key_path(name).is_file()
    }

    /// Returns the key for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NoteStoreError::KeyNotFound`] if no key exists, and
    /// [`NoteStoreError::Crypto`] if it cannot be unwrapped (wrong master
    /// key or a tampered file).
    pub fn load(&self, name: &str) -> Result<KeyBytes> {
        let raw = match fs::read(self.key_path(name)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(NoteStoreError::KeyNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let wrapped: WrappedKey = serde_json::from_slice(&raw)?;
        self.unwrap_key(name, &wrapped)
    }

    /// Returns the key for `name`, generating and storing one if absent.
    ///
    /// # Errors
    ///
    /// See [`KeyStore::load`]; also fails if a new key cannot be written.
    pub fn load_or_create(&self, name: &str) -> Result<KeyBytes> {
        match self.load(name) {
            Err(NoteStoreError::KeyNotFound(_)) => {
                let key = random_key();
                self.store(name, &key)?;
                log::debug!("created data key for {name:?}");
                Ok(key)
            }
            other => other,
        }
    }

    /// Overwrites and removes the key for `name`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`NoteStoreError::Io`] if the key file cannot be overwritten
    /// or unlinked.
    pub fn erase(&self, name: &str) -> Result<bool> {
        let path = self.key_path(name);
        let len = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        {
            let mut file = fs::OpenOptions::new().write(true).open(&path)?;
            file.write_all(&vec![0u8; len as usize])?;
            file.sync_all()?;
        }
        fs::remove_file(&path)?;
        Ok(true)
    }

    fn store(&self, name: &str, key: &KeyBytes) -> Result<()> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let aad = wrap_aad(name);
        let payload = self
            .wrap
            .encrypt(&nonce, Payload { msg: &**key, aad: &aad })
            .map_err(|e| NoteStoreError::Crypto(format!("wrap key: {e}")))?;
        let wrapped = WrappedKey {
            version: WRAPPED_KEY_VERSION,
            nonce: STANDARD.encode(nonce),
            payload: STANDARD.encode(payload),
        };

        let path = self.key_path(name);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(&wrapped)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn unwrap_key(&self, name: &str, wrapped: &WrappedKey) -> Result<KeyBytes> {
        if wrapped.version != WRAPPED_KEY_VERSION {
            return Err(NoteStoreError::KeyStore(format!(
                "unsupported key version {}",
                wrapped.version
            )));
        }
        let nonce = decode_b64(&wrapped.nonce)?;
        if nonce.len() != NONCE_LEN {
            return Err(NoteStoreError::KeyStore("bad key nonce".to_string()));
        }
        let payload = decode_b64(&wrapped.payload)?;
        let aad = wrap_aad(name);
        let plain = Zeroizing::new(
            self.wrap
                .decrypt(XNonce::from_slice(&nonce), Payload { msg: &payload, aad: &aad })
                .map_err(|_| NoteStoreError::Crypto(format!("cannot unwrap key for {name:?}")))?,
        );
        if plain.len() != KEY_LEN {
            return Err(NoteStoreError::KeyStore("bad key length".to_string()));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&plain);
        Ok(key)
    }

    fn key_path(&self, name: &str) -> PathBuf {
        let digest = Sha256::digest(name.as_bytes());
        self.dir.join(format!("{}.key", hex::encode(digest)))
    }
}

fn random_key() -> KeyBytes {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    rand::rng().fill_bytes(&mut *key);
    key
}

fn wrap_aad(name: &str) -> Vec<u8> {
    [WRAP_AAD_PREFIX, name.as_bytes()].concat()
}

fn decode_b64(s: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|e| NoteStoreError::KeyStore(format!("base64: {e}")))
}

fn load_or_create_salt(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(salt) if salt.len() == SALT_LEN => Ok(salt),
        Ok(_) => Err(NoteStoreError::KeyStore("malformed salt file".to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let mut salt = vec![0u8; SALT_LEN];
            rand::rng().fill_bytes(&mut salt);
            fs::write(path, &salt)?;
            Ok(salt)
        }
        Err(e) => Err(e.into()),
    }
}
