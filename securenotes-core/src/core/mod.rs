//! Internal domain modules for the SecureNotes core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod codec;
pub mod crypto;
pub mod error;
pub mod filesystem;
pub mod index;
pub mod keystore;
pub mod note;
pub mod record_io;
pub mod settings;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

#[doc(inline)]
pub use crypto::{CryptoGateway, KeystoreGateway, SealingSink};
#[doc(inline)]
pub use error::{NoteStoreError, Result};
#[doc(inline)]
pub use filesystem::{DirFileSystem, FileSystem, MemoryFileSystem};
#[doc(inline)]
pub use index::{EmptyReason, IndexLoad, NoteIndex, INDEX_FILENAME};
#[doc(inline)]
pub use keystore::{KeyStore, MasterKey};
#[doc(inline)]
pub use note::{Note, StoreType};
#[doc(inline)]
pub use record_io::RecordFiles;
#[doc(inline)]
pub use settings::StoreSettings;
#[doc(inline)]
pub use store::{NoteStore, SecureFileNoteStore};
