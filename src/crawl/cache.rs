use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// On-disk cache of successful page bodies, one file per URL.
///
/// File names are the hex SHA-256 of the URL, so any URL maps to a safe
/// path. Only GET page bodies are cached; enclosure probes always hit the
/// network.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the cached body for `url`, or `None` on a miss.
    pub async fn get(&self, url: &Url) -> io::Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(url)).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Stores `body` for `url`, replacing any previous entry.
    pub async fn put(&self, url: &Url, body: &str) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(url);
        let temp_path = path.with_extension(format!("tmp.{}", std::process::id()));
        tokio::fs::write(&temp_path, body).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }
        Ok(())
    }

    /// Deletes the cache directory. Returns `false` if it did not exist.
    pub fn purge(dir: &Path) -> io::Result<bool> {
        match std::fs::remove_dir_all(dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn path_for(&self, url: &Url) -> PathBuf {
        let digest = Sha256::digest(url.as_str().as_bytes());
        self.dir.join(format!("{:x}.html", digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache(name: &str) -> ResponseCache {
        let dir = std::env::temp_dir().join(format!("gadio_feed_cache_test_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        ResponseCache::new(dir)
    }

    fn url(path: &str) -> Url {
        Url::parse("https://www.gcores.com/").unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = temp_cache("miss_then_hit");
        assert_eq!(cache.get(&url("radios?page=1")).await.unwrap(), None);

        cache.put(&url("radios?page=1"), "<html>1</html>").await.unwrap();
        assert_eq!(
            cache.get(&url("radios?page=1")).await.unwrap().as_deref(),
            Some("<html>1</html>")
        );
        assert_eq!(cache.get(&url("radios?page=2")).await.unwrap(), None);

        ResponseCache::purge(cache.dir()).unwrap();
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = temp_cache("overwrite");
        cache.put(&url("radios/1"), "old").await.unwrap();
        cache.put(&url("radios/1"), "new").await.unwrap();
        assert_eq!(
            cache.get(&url("radios/1")).await.unwrap().as_deref(),
            Some("new")
        );
        ResponseCache::purge(cache.dir()).unwrap();
    }

    #[tokio::test]
    async fn test_purge() {
        let cache = temp_cache("purge");
        cache.put(&url("radios/1"), "body").await.unwrap();

        assert!(ResponseCache::purge(cache.dir()).unwrap());
        assert!(!cache.dir().exists());
        assert!(!ResponseCache::purge(cache.dir()).unwrap());
        assert_eq!(cache.get(&url("radios/1")).await.unwrap(), None);
    }
}
