//! The list of known artists, stored as one comma-joined line in `artists.txt`.

use crate::error::{ErrorType, IntoResult};
use crate::{utils, Result};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Persistent, insertion-ordered list of artist names. The whole file is read on every `read`
/// and rewritten on every `write`.
#[derive(Debug)]
pub struct ArtistRegistry {
    path: PathBuf,
    // Serializes read-modify-write cycles between conversations.
    lock: Mutex<()>,
}

impl ArtistRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The known names in insertion order. A missing file means no artists yet.
    pub async fn read(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        self.read_unlocked().await
    }

    /// Appends `name` unconditionally and persists the whole list.
    pub async fn write(&self, name: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_unlocked(name).await
    }

    /// Appends `name` unless it is already known. Returns whether it was added.
    pub async fn register(&self, name: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        if self.read_unlocked().await?.iter().any(|a| a == name) {
            return Ok(false);
        }
        self.write_unlocked(name).await?;
        Ok(true)
    }


    async fn read_unlocked(&self) -> Result<Vec<String>> {
        let content = utils::read_optional(&self.path)
            .await
            .pub_result(ErrorType::Io)?
            .unwrap_or_default();
        Ok(parse(&content))
    }

    async fn write_unlocked(&self, name: &str) -> Result<()> {
        let mut artists = self.read_unlocked().await?;
        artists.push(name.trim().to_string());
        debug!("Registering artist '{name}' in {}", self.path.display());
        // Write aside and move into place so a crash never leaves a truncated list.
        let staged = self.staged_path();
        utils::write(&staged, artists.join(","))
            .await
            .pub_result(ErrorType::Io)?;
        utils::rename(&staged, &self.path)
            .await
            .pub_result(ErrorType::Io)
    }

    fn staged_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn parse(content: &str) -> Vec<String> {
    content
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let registry = ArtistRegistry::new(dir.path().join("artists.txt"));
        assert!(registry.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_preserves_order() {
        let dir = TempDir::new().unwrap();
        let registry = ArtistRegistry::new(dir.path().join("artists.txt"));
        registry.write("HORUS").await.unwrap();
        registry.write("Кино").await.unwrap();
        registry.write("HORUS").await.unwrap();
        assert_eq!(
            registry.read().await.unwrap(),
            vec!["HORUS", "Кино", "HORUS"]
        );
        let raw = utils::read(registry.path()).await.unwrap();
        assert_eq!(raw, "HORUS,Кино,HORUS");
    }

    #[tokio::test]
    async fn test_write_replaces_file_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let registry = ArtistRegistry::new(dir.path().join("artists.txt"));
        // A staged file left by an interrupted write is replaced, not appended to.
        utils::write(dir.path().join("artists.txt.tmp"), "garbage")
            .await
            .unwrap();
        registry.write("HORUS").await.unwrap();
        registry.write("Кино").await.unwrap();

        assert_eq!(registry.read().await.unwrap(), vec!["HORUS", "Кино"]);
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["artists.txt"]);
    }

    #[tokio::test]
    async fn test_register_skips_known() {
        let dir = TempDir::new().unwrap();
        let registry = ArtistRegistry::new(dir.path().join("artists.txt"));
        assert!(registry.register("HORUS").await.unwrap());
        assert!(!registry.register("HORUS").await.unwrap());
        assert_eq!(registry.read().await.unwrap(), vec!["HORUS"]);
    }

    #[test]
    fn test_parse_ignores_empty_entries() {
        assert!(parse("").is_empty());
        assert_eq!(parse("A,,B,\n"), vec!["A", "B"]);
    }
}
