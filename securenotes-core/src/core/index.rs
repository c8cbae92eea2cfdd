//! The encrypted note index and its load-once latch.
//!
//! The index maps every stored note id to the note's metadata-only form and
//! lives in a single encrypted file, [`INDEX_FILENAME`]. It is read at most
//! once per [`NoteIndex`]: an absent or unreadable-as-JSON index counts as
//! empty and is never retried, so changes made to the file by anyone else
//! after the first load are not observed.

use std::io::ErrorKind;

use crate::core::codec::{self, IndexMap};
use crate::core::crypto::CryptoGateway;
use crate::core::filesystem::FileSystem;
use crate::core::record_io::RecordFiles;
use crate::{Note, NoteStoreError, Result};

/// Reserved file name of the index. Never a valid note id.
pub const INDEX_FILENAME: &str = "notes_meta.json";

/// Why a load produced an empty index instead of data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyReason {
    /// No index file exists yet.
    Missing,
    /// The decrypted index was empty or not a JSON object of notes.
    Unparseable(String),
}

/// Outcome of reading the index file once.
#[derive(Debug)]
pub enum IndexLoad {
    Loaded(IndexMap),
    EmptyBenign(EmptyReason),
    Fatal(NoteStoreError),
}

impl IndexLoad {
    /// Reads and decrypts the index file through `files`.
    pub fn read<F: FileSystem, C: CryptoGateway>(files: &RecordFiles<F, C>) -> Self {
        let bytes = match files.read_decrypted(INDEX_FILENAME) {
            Ok(bytes) => bytes,
            Err(NoteStoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                return Self::EmptyBenign(EmptyReason::Missing);
            }
            Err(e) => return Self::Fatal(e),
        };
        if !codec::looks_like_object(&bytes) {
            return Self::EmptyBenign(EmptyReason::Unparseable(
                "index is empty or not a JSON object".to_string(),
            ));
        }
        match codec::decode_index(&bytes) {
            Ok(map) => Self::Loaded(map),
            Err(e) => Self::EmptyBenign(EmptyReason::Unparseable(e.to_string())),
        }
    }
}

/// In-memory index plus the "already loaded" latch.
#[derive(Debug, Default)]
pub struct NoteIndex {
    entries: IndexMap,
    loaded: bool,
}

impl NoteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Loads the index on first call; later calls do nothing.
    ///
    /// # Errors
    ///
    /// Propagates I/O and crypto failures other than a missing file. These
    /// leave the latch unset, so the next call tries again. Earlier
    /// implementations latched on these too, which left the instance with an
    /// empty index that the next mutation would persist over the intact file.
    pub fn ensure_loaded<F: FileSystem, C: CryptoGateway>(
        &mut self,
        files: &RecordFiles<F, C>,
    ) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        self.entries = match IndexLoad::read(files) {
            IndexLoad::Loaded(map) => {
                log::debug!("loaded note index with {} entries", map.len());
                map
            }
            IndexLoad::EmptyBenign(EmptyReason::Missing) => {
                log::debug!("no note index yet; starting empty");
                IndexMap::new()
            }
            IndexLoad::EmptyBenign(EmptyReason::Unparseable(why)) => {
                log::warn!("discarding unreadable note index: {why}");
                IndexMap::new()
            }
            IndexLoad::Fatal(e) => return Err(e),
        };
        self.loaded = true;
        Ok(())
    }

    /// Stores the metadata-only form of `note`, replacing any entry with its id.
    pub fn upsert(&mut self, note: &Note) {
        debug_assert!(self.loaded, "index used before load");
        self.entries.insert(note.id.clone(), note.metadata());
    }

    /// Removes `id`; absent ids are ignored.
    pub fn remove(&mut self, id: &str) {
        debug_assert!(self.loaded, "index used before load");
        self.entries.remove(id);
    }

    /// Writes the whole index to [`INDEX_FILENAME`] through the encrypted path.
    ///
    /// # Errors
    ///
    /// Propagates serialization, file system and gateway failures.
    pub fn persist<F: FileSystem, C: CryptoGateway>(&self, files: &RecordFiles<F, C>) -> Result<()> {
        let bytes = codec::encode_index(&self.entries)?;
        files.write_encrypted(INDEX_FILENAME, &bytes)
    }

    pub fn list_metadata(&self) -> impl Iterator<Item = &Note> {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }
}
