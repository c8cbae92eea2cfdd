//! The encrypted note store: one sealed file per note plus a sealed index.
//!
//! Every mutation updates the in-memory index, persists the index file, then
//! touches the note's own file. The two writes are not atomic: if the process
//! dies or the record write fails after the index was persisted, the index
//! names a note whose file is missing or stale. Nothing is rolled back;
//! [`SecureFileNoteStore::dangling_ids`] reports such entries.
//!
//! A store assumes it is the only writer of its directory. Callers sharing
//! one store between threads must serialize access themselves, e.g. behind
//! a `Mutex`.

use crate::core::crypto::{CryptoGateway, KeystoreGateway};
use crate::core::filesystem::{DirFileSystem, FileSystem};
use crate::core::index::{NoteIndex, INDEX_FILENAME};
use crate::core::keystore::KeyStore;
use crate::core::record_io::RecordFiles;
use crate::core::settings::StoreSettings;
use crate::{Note, NoteStoreError, Result, StoreType};

/// The contract every note store backend fulfils.
///
/// Reads take `&mut self` because a backend may hydrate caches lazily.
pub trait NoteStore {
    fn create(&mut self, note: Note) -> Result<Note>;

    fn update(&mut self, note: Note) -> Result<Note>;

    fn delete(&mut self, note: Note) -> Result<Note>;

    /// Returns the full note, or `None` if no note with `id` is stored.
    fn read(&mut self, id: &str) -> Result<Option<Note>>;

    /// Returns every stored note in metadata-only form.
    fn list(&mut self) -> Result<Vec<Note>>;

    fn count(&mut self) -> Result<u64>;

    fn store_type(&self) -> StoreType;
}

/// Note store keeping each note in its own encrypted file.
///
/// Each note is sealed under its own key, obtained from the
/// [`CryptoGateway`] by note id; deleting a note erases that key.
pub struct SecureFileNoteStore<F, C> {
    files: RecordFiles<F, C>,
    index: NoteIndex,
}

impl SecureFileNoteStore<DirFileSystem, KeystoreGateway> {
    /// Opens the on-disk store described by `settings`, deriving the key
    /// store's master key from `passphrase`.
    ///
    /// # Errors
    ///
    /// Returns [`NoteStoreError::Io`] if either directory cannot be created,
    /// or [`NoteStoreError::KeyStore`] if the key store is malformed.
    pub fn open(settings: &StoreSettings, passphrase: &str) -> Result<Self> {
        let fs = DirFileSystem::new(&settings.data_directory)?;
        let keys = KeyStore::open_with_passphrase(&settings.key_directory, passphrase)?;
        log::info!("opened note store at {}", fs.base().display());
        Ok(Self::new(fs, KeystoreGateway::new(keys)))
    }
}

impl<F: FileSystem, C: CryptoGateway> SecureFileNoteStore<F, C> {
    /// Creates a store over `fs`, encrypting through `gateway`.
    ///
    /// Nothing is read until the first operation.
    pub fn new(fs: F, gateway: C) -> Self {
        Self {
            files: RecordFiles::new(fs, gateway),
            index: NoteIndex::new(),
        }
    }

    pub fn file_system(&self) -> &F {
        self.files.file_system()
    }

    pub fn gateway(&self) -> &C {
        self.files.gateway()
    }

    /// Ids present in the index whose note file is missing.
    ///
    /// # Errors
    ///
    /// Fails only if the index cannot be loaded.
    pub fn dangling_ids(&mut self) -> Result<Vec<String>> {
        self.index.ensure_loaded(&self.files)?;
        Ok(self
            .index
            .ids()
            .filter(|id| !self.files.exists(id))
            .map(str::to_string)
            .collect())
    }

    fn save(&mut self, note: Note) -> Result<Note> {
        validate_id(&note.id)?;
        self.index.ensure_loaded(&self.files)?;
        self.index.upsert(&note);
        self.index.persist(&self.files)?;
        self.files.write_record(&note)?;
        Ok(note)
    }
}

impl<F: FileSystem, C: CryptoGateway> NoteStore for SecureFileNoteStore<F, C> {
    fn create(&mut self, note: Note) -> Result<Note> {
        self.save(note)
    }

    fn update(&mut self, note: Note) -> Result<Note> {
        self.save(note)
    }

    fn delete(&mut self, note: Note) -> Result<Note> {
        validate_id(&note.id)?;
        self.index.ensure_loaded(&self.files)?;
        self.index.remove(&note.id);
        self.index.persist(&self.files)?;
        self.files.delete_record_file(&note.id)?;
        self.files.gateway().erase_key(&note.id)?;
        log::info!("deleted note {:?}", note.id);
        Ok(note)
    }

    fn read(&mut self, id: &str) -> Result<Option<Note>> {
        validate_id(id)?;
        self.index.ensure_loaded(&self.files)?;
        if !self.index.contains(id) {
            return Ok(None);
        }
        let note = self.files.read_record(id)?;
        Ok(Some(note.with_store_type(self.store_type())))
    }

    fn list(&mut self) -> Result<Vec<Note>> {
        self.index.ensure_loaded(&self.files)?;
        let store = self.store_type();
        Ok(self
            .index
            .list_metadata()
            .map(|meta| meta.clone().with_store_type(store))
            .collect())
    }

    fn count(&mut self) -> Result<u64> {
        self.index.ensure_loaded(&self.files)?;
        Ok(self.index.count() as u64)
    }

    fn store_type(&self) -> StoreType {
        StoreType::SecureFile
    }
}

/// Rejects ids that cannot safely name a file next to the index.
///
/// Names starting with a dot are reserved for staging files.
pub fn validate_id(id: &str) -> Result<()> {
    let bad = id.is_empty()
        || id == INDEX_FILENAME
        || id.starts_with('.')
        || id.contains(['/', '\\', '\0']);
    if bad {
        return Err(NoteStoreError::InvalidNoteId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filesystem::MemoryFileSystem;
    use crate::core::keystore::MasterKey;
    use crate::core::testing::{GatewayCall, RecordingGateway};
    use chrono::Utc;
    use tempfile::TempDir;

    type TestStore = SecureFileNoteStore<MemoryFileSystem, RecordingGateway>;

    fn store() -> TestStore {
        SecureFileNoteStore::new(MemoryFileSystem::new(), RecordingGateway::new())
    }

    fn note(id: &str, content: &str) -> Note {
        Note {
            id: id.to_string(),
            title: format!("Title {id}"),
            content: Some(content.to_string()),
            created_at: Utc::now(),
            store_type: None,
        }
    }

    #[test]
    fn test_note_lifecycle_scenario() {
        let mut store = store();

        let created = store.create(note("n1", "hello")).unwrap();
        assert_eq!(created.content.as_deref(), Some("hello"));
        assert_eq!(store.count().unwrap(), 1);

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "n1");
        assert!(listed[0].content.is_none());

        let read = store.read("n1").unwrap().unwrap();
        assert_eq!(read.content.as_deref(), Some("hello"));

        store.delete(created).unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.read("n1").unwrap().is_none());
    }

    #[test]
    fn test_read_returns_equal_note() {
        let mut store = store();
        let original = note("n1", "body text");

        store.create(original.clone()).unwrap();
        assert_eq!(store.read("n1").unwrap(), Some(original));
    }

    #[test]
    fn test_read_and_list_tag_store_type() {
        let mut store = store();
        store.create(note("n1", "x")).unwrap();

        let read = store.read("n1").unwrap().unwrap();
        assert_eq!(read.store_type, Some(StoreType::SecureFile));
        assert!(store
            .list()
            .unwrap()
            .iter()
            .all(|n| n.store_type == Some(StoreType::SecureFile)));
        assert_eq!(store.store_type(), StoreType::SecureFile);
    }

    #[test]
    fn test_update_replaces_content() {
        let mut store = store();
        store.create(note("n1", "first")).unwrap();

        let mut changed = note("n1", "second");
        changed.title = "Renamed".to_string();
        store.update(changed).unwrap();

        let read = store.read("n1").unwrap().unwrap();
        assert_eq!(read.content.as_deref(), Some("second"));
        assert_eq!(read.title, "Renamed");
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.list().unwrap()[0].title, "Renamed");
    }

    #[test]
    fn test_list_never_reads_note_files() {
        let mut store = store();
        for i in 0..5 {
            store.create(note(&format!("n{i}"), "heavy body")).unwrap();
        }
        store.gateway().clear_calls();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 5);
        assert!(listed.iter().all(|n| n.content.is_none()));
        assert!(store.gateway().calls().is_empty());
    }

    #[test]
    fn test_count_tracks_mixed_operations() {
        let mut store = store();
        let a = store.create(note("a", "1")).unwrap();
        store.create(note("b", "2")).unwrap();
        store.create(note("c", "3")).unwrap();
        store.update(note("b", "22")).unwrap();
        store.delete(a).unwrap();
        store.delete(note("never-created", "")).unwrap();
        store.create(note("d", "4")).unwrap();

        assert_eq!(store.count().unwrap(), 3);
        let ids: Vec<String> = store.list().unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_read_unindexed_id_does_not_decrypt() {
        let mut store = store();
        store.create(note("n1", "x")).unwrap();
        // A stray file with no index entry stays invisible.
        store.file_system().put_raw("stray", b"{}".to_vec());
        store.gateway().clear_calls();

        assert!(store.read("stray").unwrap().is_none());
        assert!(store.read("missing").unwrap().is_none());
        assert!(store.gateway().calls().is_empty());
    }

    #[test]
    fn test_delete_erases_key_exactly_once() {
        let mut store = store();
        store.create(note("n1", "x")).unwrap();

        store.delete(note("n1", "x")).unwrap();
        store.delete(note("ghost", "")).unwrap();

        let erase_n1 = GatewayCall::Erase("n1".to_string());
        let erase_ghost = GatewayCall::Erase("ghost".to_string());
        assert_eq!(store.gateway().count(&erase_n1), 1);
        assert_eq!(store.gateway().count(&erase_ghost), 1);
        assert!(!store.file_system().exists("n1"));
    }

    #[test]
    fn test_mutation_order_is_index_then_record() {
        let mut store = store();
        store.create(note("n1", "x")).unwrap();
        store.delete(note("n1", "x")).unwrap();

        assert_eq!(
            store.gateway().calls(),
            vec![
                GatewayCall::Encrypt(INDEX_FILENAME.to_string()),
                GatewayCall::Encrypt("n1".to_string()),
                GatewayCall::Encrypt(INDEX_FILENAME.to_string()),
                GatewayCall::Erase("n1".to_string()),
            ]
        );
    }

    #[test]
    fn test_persisted_layout() {
        let mut store = store();
        store.create(note("n1", "x")).unwrap();
        store.create(note("n2", "y")).unwrap();

        assert_eq!(
            store.file_system().names(),
            vec!["n1".to_string(), "n2".to_string(), INDEX_FILENAME.to_string()]
        );
    }

    #[test]
    fn test_unparseable_index_behaves_as_empty() {
        let fs = MemoryFileSystem::new();
        fs.put_raw(INDEX_FILENAME, b"this is not json".to_vec());
        let mut store = SecureFileNoteStore::new(fs.clone(), RecordingGateway::new());

        assert_eq!(store.count().unwrap(), 0);
        store.create(note("n1", "fresh")).unwrap();

        let mut reopened = SecureFileNoteStore::new(fs, RecordingGateway::new());
        assert_eq!(reopened.count().unwrap(), 1);
        assert_eq!(
            reopened.read("n1").unwrap().unwrap().content.as_deref(),
            Some("fresh")
        );
    }

    #[test]
    fn test_index_not_reloaded_within_instance() {
        let fs = MemoryFileSystem::new();
        let mut first = SecureFileNoteStore::new(fs.clone(), RecordingGateway::new());
        let mut second = SecureFileNoteStore::new(fs, RecordingGateway::new());

        assert_eq!(second.count().unwrap(), 0);
        first.create(note("n1", "x")).unwrap();
        assert_eq!(second.count().unwrap(), 0);
    }

    #[test]
    fn test_record_write_failure_leaves_index_entry() {
        let mut store = store();
        store.gateway().fail_encrypt_for("n1");

        let err = store.create(note("n1", "x")).unwrap_err();
        assert!(matches!(err, NoteStoreError::Crypto(_)));
        assert_eq!(store.count().unwrap(), 1);
        assert!(matches!(
            store.read("n1"),
            Err(NoteStoreError::NoteNotFound(id)) if id == "n1"
        ));
        assert_eq!(store.dangling_ids().unwrap(), vec!["n1".to_string()]);
        assert_eq!(store.file_system().names(), vec![INDEX_FILENAME.to_string()]);
    }

    #[test]
    fn test_dangling_ids_reports_missing_files() {
        let mut store = store();
        store.create(note("n1", "x")).unwrap();
        store.create(note("n2", "y")).unwrap();
        store.file_system().delete("n2").unwrap();

        assert_eq!(store.dangling_ids().unwrap(), vec!["n2".to_string()]);
        assert!(matches!(
            store.read("n2"),
            Err(NoteStoreError::NoteNotFound(id)) if id == "n2"
        ));
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_index_write_failure_aborts_before_record() {
        let mut store = store();
        store.gateway().fail_encrypt_for(INDEX_FILENAME);

        assert!(store.create(note("n1", "x")).is_err());
        assert!(!store.file_system().exists("n1"));
    }

    #[test]
    fn test_failed_index_write_keeps_previous_index() {
        let fs = MemoryFileSystem::new();
        let mut store = SecureFileNoteStore::new(fs.clone(), RecordingGateway::new());
        store.create(note("n1", "x")).unwrap();

        store.gateway().fail_encrypt_for(INDEX_FILENAME);
        assert!(store.create(note("n2", "y")).is_err());
        assert!(!fs.names().iter().any(|name| name.ends_with(".tmp")));

        let mut reopened = SecureFileNoteStore::new(fs, RecordingGateway::new());
        assert_eq!(reopened.count().unwrap(), 1);
        assert_eq!(reopened.read("n1").unwrap().unwrap().content.as_deref(), Some("x"));
        assert_eq!(reopened.read("n2").unwrap(), None);
    }

    #[test]
    fn test_truncated_index_on_disk_is_recoverable() {
        let temp = TempDir::new().unwrap();
        let open = || {
            let fs = DirFileSystem::new(temp.path().join("notes")).unwrap();
            let keys =
                KeyStore::open(temp.path().join("keys"), &MasterKey::from_bytes([3u8; 32])).unwrap();
            SecureFileNoteStore::new(fs, KeystoreGateway::new(keys))
        };

        open().create(Note::new("Lost", "body")).unwrap();
        std::fs::write(temp.path().join("notes").join(INDEX_FILENAME), b"").unwrap();

        let mut store = open();
        assert_eq!(store.count().unwrap(), 0);
        store.create(Note::new("Fresh", "body")).unwrap();

        assert_eq!(open().count().unwrap(), 1);
    }

    #[test]
    fn test_fatal_index_load_propagates() {
        let fs = MemoryFileSystem::new();
        fs.put_raw(INDEX_FILENAME, b"{}".to_vec());
        let gateway = RecordingGateway::new();
        gateway.fail_decrypt_for(INDEX_FILENAME);
        let mut store = SecureFileNoteStore::new(fs, gateway);

        assert!(matches!(store.count(), Err(NoteStoreError::Crypto(_))));
        assert!(store.create(note("n1", "x")).is_err());
    }

    #[test]
    fn test_malformed_record_is_not_swallowed() {
        let mut store = store();
        store.create(note("n1", "x")).unwrap();
        store.file_system().put_raw("n1", b"{broken".to_vec());

        assert!(matches!(store.read("n1"), Err(NoteStoreError::Json(_))));
    }

    #[test]
    fn test_invalid_ids_are_rejected_before_io() {
        let mut store = store();
        for id in ["", ".", "..", ".hidden", "a/b", "a\\b", "nul\0", INDEX_FILENAME] {
            let err = store.create(note(id, "x")).unwrap_err();
            assert!(matches!(err, NoteStoreError::InvalidNoteId(_)), "{id:?}");
            assert!(store.read(id).is_err());
            assert!(store.delete(note(id, "x")).is_err());
        }
        assert!(store.gateway().calls().is_empty());
        assert!(store.file_system().names().is_empty());
    }

    #[test]
    fn test_on_disk_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let fs = DirFileSystem::new(temp.path().join("notes")).unwrap();
        let keys = KeyStore::open(temp.path().join("keys"), &MasterKey::from_bytes([7u8; 32])).unwrap();
        let mut store = SecureFileNoteStore::new(fs, KeystoreGateway::new(keys));

        let original = Note::new("Diary", "dear diary");
        let id = original.id.clone();
        store.create(original.clone()).unwrap();

        let raw = std::fs::read(temp.path().join("notes").join(&id)).unwrap();
        assert!(!raw.windows(10).any(|w| w == b"dear diary"));
        let raw_index = std::fs::read(temp.path().join("notes").join(INDEX_FILENAME)).unwrap();
        assert!(!raw_index.windows(5).any(|w| w == b"Diary"));

        let fs = DirFileSystem::new(temp.path().join("notes")).unwrap();
        let keys = KeyStore::open(temp.path().join("keys"), &MasterKey::from_bytes([7u8; 32])).unwrap();
        let mut reopened = SecureFileNoteStore::new(fs, KeystoreGateway::new(keys));
        assert_eq!(reopened.read(&id).unwrap(), Some(original.clone()));

        reopened.delete(original).unwrap();
        assert!(!reopened.gateway().key_store().contains(&id));
        assert!(!temp.path().join("notes").join(&id).exists());
        assert_eq!(reopened.count().unwrap(), 0);
    }

    #[test]
    fn test_open_from_settings() {
        let temp = TempDir::new().unwrap();
        let settings = StoreSettings {
            data_directory: temp.path().join("data"),
            key_directory: temp.path().join("keys"),
        };

        let id = {
            let mut store = SecureFileNoteStore::open(&settings, "passphrase").unwrap();
            store.create(Note::new("Title", "body")).unwrap().id
        };

        let mut store = SecureFileNoteStore::open(&settings, "passphrase").unwrap();
        let read = store.read(&id).unwrap().unwrap();
        assert_eq!(read.content.as_deref(), Some("body"));
    }
}
