use dirview_common::{Blake3Hash, CacheKey, DirViewError};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

const CACHE_FILE: &str = "dirview_hashes.bin";

/// BLAKE3 content hashes keyed by path, size and modification time, kept in
/// memory and persisted with bincode
pub struct HashCache {
    cache_dir: PathBuf,
    memory_cache: Arc<RwLock<HashMap<CacheKey, Blake3Hash>>>,
}

impl HashCache {
    pub fn new(cache_dir: PathBuf) -> Result<Self, DirViewError> {
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }

        let mut memory_cache = HashMap::new();

        let cache_file = cache_dir.join(CACHE_FILE);
        if cache_file.exists() {
            match fs::read(&cache_file) {
                Ok(data) => match bincode::deserialize::<HashMap<CacheKey, Blake3Hash>>(&data) {
                    Ok(cached) => {
                        memory_cache = cached;
                        debug!("Loaded {} entries from hash cache", memory_cache.len());
                    }
                    Err(e) => warn!("Ignoring unreadable hash cache {:?}: {}", cache_file, e),
                },
                Err(e) => warn!("Failed to load hash cache: {}", e),
            }
        }

        Ok(Self {
            cache_dir,
            memory_cache: Arc::new(RwLock::new(memory_cache)),
        })
    }

    pub fn get(&self, key: &CacheKey) -> Option<Blake3Hash> {
        self.memory_cache.read().ok()?.get(key).copied()
    }

    pub fn put(&self, key: CacheKey, hash: Blake3Hash) {
        if let Ok(mut cache) = self.memory_cache.write() {
            cache.insert(key, hash);
        }
    }

    /// Hash a file, reusing the cached value while size and mtime match
    pub fn hash_file(&self, path: &Path) -> Result<Blake3Hash, DirViewError> {
        let metadata = fs::metadata(path)?;
        let key = CacheKey {
            path: path.to_path_buf(),
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        };

        if let Some(hash) = self.get(&key) {
            debug!("Cache hit for {:?}", path);
            return Ok(hash);
        }

        let mut file = fs::File::open(path)?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0; 64 * 1024];
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        let hash: Blake3Hash = hasher.finalize().into();
        self.put(key, hash);
        Ok(hash)
    }

    /// Write the cache to disk through a temporary file and a rename
    pub fn persist(&self) -> Result<(), DirViewError> {
        let cache_file = self.cache_dir.join(CACHE_FILE);
        let temp_file = self.cache_dir.join(format!("{}.tmp", CACHE_FILE));

        let cache = self
            .memory_cache
            .read()
            .map_err(|e| DirViewError::Cache(format!("Lock error: {}", e)))?;

        let data = bincode::serialize(&*cache).map_err(|e| DirViewError::Serialization(e.to_string()))?;

        fs::write(&temp_file, data)?;
        fs::rename(&temp_file, &cache_file)?;

        debug!("Persisted {} hash cache entries", cache.len());
        Ok(())
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.memory_cache.write() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.memory_cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use tempfile::TempDir;

    #[test]
    fn test_hash_cache_basic() {
        let temp = TempDir::new().unwrap();
        let cache = HashCache::new(temp.path().to_path_buf()).unwrap();

        let key = CacheKey {
            path: PathBuf::from("test.txt"),
            modified: SystemTime::now(),
            size: 100,
        };
        let hash = Blake3Hash([1; 32]);

        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), hash);
        assert_eq!(cache.get(&key), Some(hash));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hash_cache_persistence() {
        let temp = TempDir::new().unwrap();
        let data_file = temp.path().join("data.bin");
        fs::write(&data_file, b"payload").unwrap();

        let first = {
            let cache = HashCache::new(temp.path().join("cache")).unwrap();
            let hash = cache.hash_file(&data_file).unwrap();
            cache.persist().unwrap();
            hash
        };

        let cache = HashCache::new(temp.path().join("cache")).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hash_file(&data_file).unwrap(), first);
        assert_eq!(first, Blake3Hash::from(blake3::hash(b"payload")));
    }

    #[test]
    fn test_corrupt_cache_file_is_ignored() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CACHE_FILE), b"not bincode").unwrap();
        let cache = HashCache::new(temp.path().to_path_buf()).unwrap();
        assert!(cache.is_empty());
    }
}
