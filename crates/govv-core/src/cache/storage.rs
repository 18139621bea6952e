// Cache generations: named stores mapping request keys to response snapshots.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::error::StorageError;
use super::request::{RequestKey, Response};

/// A value persisted to disk together with the time it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", (minutes + 30) / 60)
        } else {
            format!("{}d ago", (minutes + 720) / 1440)
        }
    }
}

/// The set of cache generations, keyed by version tag.
///
/// Writes are last-write-wins per key; there is no atomicity across keys.
pub trait CacheStorage: Send + Sync + 'static {
    /// Create the generation if it does not exist yet
    fn open(&self, generation: &str) -> Result<(), StorageError>;

    /// Names of all generations present
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Remove a generation; returns whether it existed
    fn delete(&self, generation: &str) -> Result<bool, StorageError>;

    fn get(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>, StorageError>;

    /// Store a response, creating the generation if needed
    fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<(), StorageError>;
}

type Entries = HashMap<RequestKey, Response>;

/// In-process storage. Generations are listed in creation order.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    generations: RwLock<Vec<(String, Entries)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a generation, if it exists
    pub fn len(&self, generation: &str) -> Option<usize> {
        let generations = self.generations.read().unwrap_or_else(PoisonError::into_inner);
        generations
            .iter()
            .find(|(name, _)| name == generation)
            .map(|(_, entries)| entries.len())
    }
}

impl CacheStorage for MemoryStorage {
    fn open(&self, generation: &str) -> Result<(), StorageError> {
        let mut generations = self.generations.write().unwrap_or_else(PoisonError::into_inner);
        if !generations.iter().any(|(name, _)| name == generation) {
            generations.push((generation.to_string(), Entries::new()));
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let generations = self.generations.read().unwrap_or_else(PoisonError::into_inner);
        Ok(generations.iter().map(|(name, _)| name.clone()).collect())
    }

    fn delete(&self, generation: &str) -> Result<bool, StorageError> {
        let mut generations = self.generations.write().unwrap_or_else(PoisonError::into_inner);
        let before = generations.len();
        generations.retain(|(name, _)| name != generation);
        Ok(generations.len() != before)
    }

    fn get(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>, StorageError> {
        let generations = self.generations.read().unwrap_or_else(PoisonError::into_inner);
        Ok(generations
            .iter()
            .find(|(name, _)| name == generation)
            .and_then(|(_, entries)| entries.get(key).cloned()))
    }

    fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<(), StorageError> {
        let mut generations = self.generations.write().unwrap_or_else(PoisonError::into_inner);
        match generations.iter_mut().find(|(name, _)| name == generation) {
            Some((_, entries)) => {
                entries.insert(key.clone(), response.clone());
            }
            None => {
                let mut entries = Entries::new();
                entries.insert(key.clone(), response.clone());
                generations.push((generation.to_string(), entries));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GenerationFile {
    name: String,
    #[serde(default)]
    entries: Entries,
}

impl GenerationFile {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Entries::new(),
        }
    }
}

/// Summary of one generation on disk.
#[derive(Debug, Clone)]
pub struct GenerationInfo {
    pub name: String,
    pub entries: usize,
    pub age: String,
    /// False when the file could not be parsed; it is replaced on next write
    pub readable: bool,
}

/// Extension of generation files; anything else in the directory is ignored
const GENERATION_EXT: &str = "json";

/// Generation names are stored in file names with every byte outside
/// `[A-Za-z0-9._-]` written as `%XX`, so listing needs no parsing.
fn encode_name(generation: &str) -> String {
    let mut encoded = String::with_capacity(generation.len());
    for byte in generation.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

fn decode_name(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

/// Disk-backed storage: one JSON file per generation in `cache_dir`.
/// Generations are listed in name order.
pub struct DiskStorage {
    cache_dir: PathBuf,
    // Serializes read-modify-write cycles on generation files.
    write_lock: Mutex<()>,
}

impl DiskStorage {
    pub fn new(cache_dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn generation_path(&self, generation: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", encode_name(generation), GENERATION_EXT))
    }

    fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<CachedData<T>>, StorageError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        let cached = serde_json::from_str(&contents).map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(cached))
    }

    /// Write through a temp file in the same directory and rename it into
    /// place, so a crash never leaves a half-written generation.
    fn save<T: Serialize>(&self, path: &Path, data: &T) -> Result<(), StorageError> {
        let mut file = NamedTempFile::new_in(&self.cache_dir)?;
        serde_json::to_writer(&mut file, &CachedData::new(data))?;
        file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn load_generation(&self, generation: &str) -> Result<Option<CachedData<GenerationFile>>, StorageError> {
        Self::load(&self.generation_path(generation))
    }

    /// Generation names and their files, sorted by name
    fn generation_files(&self) -> Result<Vec<(String, PathBuf)>, StorageError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == GENERATION_EXT) {
                continue;
            }
            match path.file_stem().and_then(|stem| stem.to_str()).and_then(decode_name) {
                Some(name) => files.push((name, path)),
                None => debug!(path = %path.display(), "Ignoring foreign file in cache directory"),
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Name, size and age of every generation on disk
    pub fn generations(&self) -> Result<Vec<GenerationInfo>, StorageError> {
        let mut infos = Vec::new();
        for (name, path) in self.generation_files()? {
            match Self::load::<GenerationFile>(&path) {
                Ok(Some(cached)) => infos.push(GenerationInfo {
                    name,
                    entries: cached.data.entries.len(),
                    age: cached.age_display(),
                    readable: true,
                }),
                Ok(None) => {}
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Unreadable cache file");
                    infos.push(GenerationInfo {
                        name,
                        entries: 0,
                        age: "unknown".to_string(),
                        readable: false,
                    });
                }
            }
        }
        Ok(infos)
    }
}

impl CacheStorage for DiskStorage {
    fn open(&self, generation: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.generation_path(generation);
        if !path.exists() {
            self.save(&path, &GenerationFile::empty(generation))?;
            debug!(generation, "Created cache generation");
        }
        Ok(())
    }

    /// Every generation file, readable or not, so corrupt ones can be deleted
    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.generation_files()?.into_iter().map(|(name, _)| name).collect())
    }

    fn delete(&self, generation: &str) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.generation_path(generation);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }

    fn get(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>, StorageError> {
        Ok(self
            .load_generation(generation)?
            .and_then(|mut cached| cached.data.entries.remove(key)))
    }

    /// A corrupt generation is discarded and rewritten with just this entry.
    fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = match self.load_generation(generation) {
            Ok(Some(cached)) => cached.data,
            Ok(None) => GenerationFile::empty(generation),
            Err(StorageError::Corrupt { path, source }) => {
                warn!(path = %path.display(), error = %source, "Replacing corrupt cache generation");
                GenerationFile::empty(generation)
            }
            Err(e) => return Err(e),
        };
        file.entries.insert(key.clone(), response.clone());
        self.save(&self.generation_path(generation), &file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use reqwest::{Method, Url};

    fn key(path: &str) -> RequestKey {
        let url = Url::parse("https://govv.app").unwrap().join(path).unwrap();
        RequestKey::new(&Method::GET, &url)
    }

    fn response(body: &str) -> Response {
        Response::new("https://govv.app/", 200, body)
    }

    fn exercise(storage: &dyn CacheStorage) {
        storage.open("govv-pwa-v1").unwrap();
        storage.open("govv-pwa-v1").unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["govv-pwa-v1".to_string()]);

        assert_eq!(storage.get("govv-pwa-v1", &key("/")).unwrap(), None);
        storage.put("govv-pwa-v1", &key("/"), &response("one")).unwrap();
        storage.put("govv-pwa-v1", &key("/"), &response("two")).unwrap();
        assert_eq!(storage.get("govv-pwa-v1", &key("/")).unwrap(), Some(response("two")));

        // put creates a missing generation
        storage.put("govv-pwa-v0", &key("/icon.svg"), &response("icon")).unwrap();
        let mut keys = storage.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["govv-pwa-v0".to_string(), "govv-pwa-v1".to_string()]);

        assert!(storage.delete("govv-pwa-v0").unwrap());
        assert!(!storage.delete("govv-pwa-v0").unwrap());
        assert_eq!(storage.get("govv-pwa-v0", &key("/icon.svg")).unwrap(), None);
        assert_eq!(storage.keys().unwrap(), vec!["govv-pwa-v1".to_string()]);
    }

    #[test]
    fn test_memory_storage_operations() {
        exercise(&MemoryStorage::new());
    }

    #[test]
    fn test_disk_storage_operations() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&DiskStorage::new(dir.path().join("offline")).unwrap());
    }

    #[test]
    fn test_memory_storage_keeps_creation_order() {
        let storage = MemoryStorage::new();
        storage.open("b").unwrap();
        storage.open("a").unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(storage.len("a"), Some(0));
        assert_eq!(storage.len("missing"), None);
    }

    #[test]
    fn test_disk_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
            storage.put("govv/pwa v1", &key("/manifest.json"), &response("{}")).unwrap();
        }

        let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["govv/pwa v1".to_string()]);
        assert_eq!(
            storage.get("govv/pwa v1", &key("/manifest.json")).unwrap(),
            Some(response("{}"))
        );

        let infos = storage.generations().unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].entries, 1);
        assert_eq!(infos[0].age, "just now");
    }

    #[test]
    fn test_disk_storage_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        std::fs::write(dir.path().join("broken.json"), "not json").unwrap();

        assert!(matches!(
            storage.get("broken", &key("/")),
            Err(StorageError::Corrupt { .. })
        ));
        // Listed by file name so it can still be deleted
        assert_eq!(storage.keys().unwrap(), vec!["broken".to_string()]);
        let infos = storage.generations().unwrap();
        assert!(!infos[0].readable);

        assert!(storage.delete("broken").unwrap());
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_disk_storage_put_replaces_corrupt_generation() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        std::fs::write(dir.path().join("govv-pwa-v1.json"), "{\"data\": {\"name\": \"govv-pwa-v1\", \"entr").unwrap();

        storage.put("govv-pwa-v1", &key("/"), &response("home")).unwrap();

        assert_eq!(storage.get("govv-pwa-v1", &key("/")).unwrap(), Some(response("home")));
        assert!(storage.generations().unwrap()[0].readable);
    }

    #[test]
    fn test_disk_storage_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        storage.open("govv-pwa-v1").unwrap();
        storage.put("govv-pwa-v1", &key("/"), &response("home")).unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(files, vec!["govv-pwa-v1.json".to_string()]);

        let contents = std::fs::read_to_string(dir.path().join("govv-pwa-v1.json")).unwrap();
        assert!(contents.contains("\"aG9tZQ==\""));
    }

    #[test]
    fn test_generation_names_round_trip_through_file_names() {
        for name in ["govv-pwa-v1", "govv/pwa v1", "ünïcode", "100%"] {
            assert_eq!(decode_name(&encode_name(name)).as_deref(), Some(name));
        }
        assert_eq!(encode_name("govv/pwa v1"), "govv%2Fpwa%20v1");
        assert_eq!(decode_name("bad%zz"), None);
    }

    #[test]
    fn test_cached_data_age_display() {
        let mut cached = CachedData::new(());
        assert_eq!(cached.age_display(), "just now");

        cached.cached_at = Utc::now() - Duration::minutes(5);
        assert_eq!(cached.age_display(), "5m ago");

        cached.cached_at = Utc::now() - Duration::minutes(95);
        assert_eq!(cached.age_display(), "2h ago");

        cached.cached_at = Utc::now() - Duration::hours(30);
        assert_eq!(cached.age_display(), "1d ago");

        cached.cached_at = Utc::now() + Duration::minutes(10);
        assert_eq!(cached.age_display(), "just now");
    }
}
