//! Encrypted file I/O for individual notes and for the index file.

use std::io::{Cursor, ErrorKind, Read, Write};

use crate::core::codec;
use crate::core::crypto::CryptoGateway;
use crate::core::filesystem::FileSystem;
use crate::{Note, NoteStoreError, Result};

/// Scratch file a sealed write goes to before it replaces `name`.
///
/// Starts with a dot, which no valid note id does.
pub fn staging_name(name: &str) -> String {
    format!(".{name}.tmp")
}

/// Files named by their note id, each sealed under the key of the same name.
pub struct RecordFiles<F, C> {
    fs: F,
    gateway: C,
}

impl<F: FileSystem, C: CryptoGateway> RecordFiles<F, C> {
    pub fn new(fs: F, gateway: C) -> Self {
        Self { fs, gateway }
    }

    pub fn file_system(&self) -> &F {
        &self.fs
    }

    pub fn gateway(&self) -> &C {
        &self.gateway
    }

    pub fn exists(&self, name: &str) -> bool {
        self.fs.exists(name)
    }

    /// Encrypts `bytes` under the key for `name` and writes them to file `name`,
    /// replacing any previous content.
    ///
    /// The ciphertext is sealed into [`staging_name`] first and renamed over
    /// `name` only once complete, so a failed or interrupted write leaves the
    /// previous file untouched.
    ///
    /// # Errors
    ///
    /// Propagates file system and gateway failures.
    pub fn write_encrypted(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let staging = staging_name(name);
        if let Err(e) = self.seal_into(name, &staging, bytes) {
            if self.fs.exists(&staging) {
                if let Err(cleanup) = self.fs.delete(&staging) {
                    log::warn!("could not remove {staging:?}: {cleanup}");
                }
            }
            return Err(e);
        }
        self.fs.rename(&staging, name)?;
        Ok(())
    }

    fn seal_into(&self, name: &str, staging: &str, bytes: &[u8]) -> Result<()> {
        self.fs.create(staging)?;
        let out = self.fs.open_for_write(staging)?;
        let mut sink = self.gateway.encrypting_sink(name, out)?;
        sink.write_all(bytes)?;
        sink.finish()
    }

    /// Reads file `name` and decrypts it under the key for `name`.
    ///
    /// An empty file holds no ciphertext and reads as empty plaintext without
    /// consulting the gateway.
    ///
    /// # Errors
    ///
    /// A missing file surfaces as [`NoteStoreError::Io`] with
    /// [`ErrorKind::NotFound`]; gateway failures propagate unchanged.
    pub fn read_decrypted(&self, name: &str) -> Result<Vec<u8>> {
        let mut sealed = Vec::new();
        self.fs.open_for_read(name)?.read_to_end(&mut sealed)?;
        if sealed.is_empty() {
            return Ok(Vec::new());
        }
        let mut source = self
            .gateway
            .decrypting_source(name, Box::new(Cursor::new(sealed)))?;
        let mut plaintext = Vec::new();
        source.read_to_end(&mut plaintext)?;
        Ok(plaintext)
    }

    /// Deletes file `name` if present.
    pub fn remove(&self, name: &str) -> Result<()> {
        if self.fs.exists(name) {
            self.fs.delete(name)?;
        }
        Ok(())
    }

    /// Writes the full form of `note` to the file named by its id.
    pub fn write_record(&self, note: &Note) -> Result<()> {
        let bytes = codec::encode_note(note)?;
        self.write_encrypted(&note.id, &bytes)?;
        log::debug!("wrote note {:?} ({} bytes)", note.id, bytes.len());
        Ok(())
    }

    /// Reads and parses the note stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`NoteStoreError::NoteNotFound`] if the file is absent; crypto
    /// and parse failures propagate.
    pub fn read_record(&self, id: &str) -> Result<Note> {
        let bytes = match self.read_decrypted(id) {
            Ok(bytes) => bytes,
            Err(NoteStoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(NoteStoreError::NoteNotFound(id.to_string()));
            }
            Err(e) => return Err(e),
        };
        codec::decode_note(&bytes)
    }

    pub fn delete_record_file(&self, id: &str) -> Result<()> {
        self.remove(id)
    }
}
