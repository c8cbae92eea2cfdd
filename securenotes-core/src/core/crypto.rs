//! The seam between the note store and whatever encrypts its bytes.
//!
//! The store only ever asks a [`CryptoGateway`] for three things: a sink that
//! seals what is written to it under the key for a name, a source that opens
//! what was sealed under that key, and erasure of the key. It never sees key
//! material.

use std::io::{self, Cursor, Read, Write};

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use zeroize::Zeroizing;

use crate::core::keystore::KeyStore;
use crate::{NoteStoreError, Result};

/// A writer whose bytes are only sealed and emitted on [`finish`](Self::finish).
///
/// Dropping a sink without finishing it writes nothing to the underlying
/// output.
pub trait SealingSink: Write {
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Per-name encryption and key lifecycle.
pub trait CryptoGateway {
    /// Wraps `out` so bytes written to the returned sink are encrypted under
    /// the key for `name`, creating the key on first use.
    fn encrypting_sink<'a>(
        &self,
        name: &str,
        out: Box<dyn Write + 'a>,
    ) -> Result<Box<dyn SealingSink + 'a>>;

    /// Wraps `input` so reads yield the plaintext sealed under `name`'s key.
    ///
    /// Fails if the key is missing or the ciphertext does not authenticate.
    fn decrypting_source<'a>(
        &self,
        name: &str,
        input: Box<dyn Read + 'a>,
    ) -> Result<Box<dyn Read + 'a>>;

    /// Irrecoverably forgets the key for `name`. Absent keys are not an error.
    fn erase_key(&self, name: &str) -> Result<()>;
}

const MAGIC: &[u8; 4] = b"SNE1";
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// [`CryptoGateway`] backed by a [`KeyStore`] and XChaCha20-Poly1305.
///
/// Sealed files are `MAGIC || nonce || ciphertext`, with the file name as
/// associated data so a ciphertext cannot be replayed under another name.
pub struct KeystoreGateway {
    keys: KeyStore,
}

impl KeystoreGateway {
    pub fn new(keys: KeyStore) -> Self {
        Self { keys }
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }
}

impl CryptoGateway for KeystoreGateway {
    fn encrypting_sink<'a>(
        &self,
        name: &str,
        out: Box<dyn Write + 'a>,
    ) -> Result<Box<dyn SealingSink + 'a>> {
        let key = self.keys.load_or_create(name)?;
        Ok(Box::new(SealingWriter {
            cipher: XChaCha20Poly1305::new(Key::from_slice(&*key)),
            name: name.to_string(),
            out,
            plaintext: Zeroizing::new(Vec::new()),
        }))
    }

    fn decrypting_source<'a>(
        &self,
        name: &str,
        mut input: Box<dyn Read + 'a>,
    ) -> Result<Box<dyn Read + 'a>> {
        let key = self.keys.load(name)?;
        let mut sealed = Vec::new();
        input.read_to_end(&mut sealed)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&*key));
        let plaintext = open(&cipher, name, &sealed)?;
        Ok(Box::new(Cursor::new(plaintext)))
    }

    fn erase_key(&self, name: &str) -> Result<()> {
        if self.keys.erase(name)? {
            log::info!("erased data key for {name:?}");
        }
        Ok(())
    }
}

struct SealingWriter<'a> {
    cipher: XChaCha20Poly1305,
    name: String,
    out: Box<dyn Write + 'a>,
    plaintext: Zeroizing<Vec<u8>>,
}

impl Write for SealingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.plaintext.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SealingSink for SealingWriter<'_> {
    fn finish(mut self: Box<Self>) -> Result<()> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: &self.plaintext,
                    aad: self.name.as_bytes(),
                },
            )
            .map_err(|e| NoteStoreError::Crypto(format!("encrypt {:?}: {e}", self.name)))?;
        self.out.write_all(MAGIC)?;
        self.out.write_all(&nonce)?;
        self.out.write_all(&ciphertext)?;
        self.out.flush()?;
        Ok(())
    }
}

fn open(cipher: &XChaCha20Poly1305, name: &str, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < MAGIC.len() + NONCE_LEN + TAG_LEN || &sealed[..MAGIC.len()] != MAGIC {
        return Err(NoteStoreError::Crypto(format!("{name:?} is not a sealed file")));
    }
    let (nonce, ciphertext) = sealed[MAGIC.len()..].split_at(NONCE_LEN);
    cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: name.as_bytes(),
            },
        )
        .map_err(|_| NoteStoreError::Crypto(format!("{name:?} failed authentication")))
}
