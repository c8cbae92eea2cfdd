//! Core library for SecureNotes, a local store of individually encrypted notes.
//!
//! The primary entry point is [`SecureFileNoteStore`], which keeps every note
//! in its own encrypted file under its own key, alongside one encrypted index
//! used for listing and counting. All store backends implement [`NoteStore`].
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    crypto::{CryptoGateway, KeystoreGateway, SealingSink},
    error::{NoteStoreError, Result},
    filesystem::{DirFileSystem, FileSystem, MemoryFileSystem},
    index::{EmptyReason, IndexLoad, NoteIndex, INDEX_FILENAME},
    keystore::{KeyStore, MasterKey},
    note::{Note, StoreType},
    record_io::RecordFiles,
    settings::{load_settings, load_settings_from, save_settings, StoreSettings},
    store::{validate_id, NoteStore, SecureFileNoteStore},
};
