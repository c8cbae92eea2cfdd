//! Error types for the SecureNotes core library.

use thiserror::Error;

/// All errors that can occur within the SecureNotes core library.
#[derive(Debug, Error)]
pub enum NoteStoreError {
    /// A note is indexed but its record file does not exist.
    #[error("Note not found: {0}")]
    NoteNotFound(String),

    /// The id cannot be used as a record file name.
    #[error("Invalid note id: {0:?}")]
    InvalidNoteId(String),

    /// Encryption or decryption through the crypto gateway failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// No key exists for the given name.
    #[error("No key for {0:?}")]
    KeyNotFound(String),

    /// The key store could not be opened or a wrapped key is malformed.
    #[error("Key store error: {0}")]
    KeyStore(String),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Note data could not be serialized to or deserialized from JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias that pins the error type to [`NoteStoreError`].
pub type Result<T> = std::result::Result<T, NoteStoreError>;

impl NoteStoreError {
    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoteNotFound(_) => "Note no longer exists".to_string(),
            Self::InvalidNoteId(id) => format!("\"{id}\" cannot be used as a note id"),
            Self::Crypto(_) | Self::KeyNotFound(_) => {
                "The note could not be decrypted on this device".to_string()
            }
            Self::KeyStore(e) => format!("Key store unavailable: {e}"),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
        }
    }
}
