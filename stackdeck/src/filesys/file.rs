//! File operations

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::DeckError;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Size of the file in bytes, zero if it cannot be read
    pub async fn size(&self) -> u64 {
        fs::metadata(&self.path).await.map(|m| m.len()).unwrap_or(0)
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, DeckError> {
        Ok(fs::read_to_string(&self.path).await?)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, DeckError> {
        let contents = self.read_string().await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// Write string to file, creating parent directories as needed.
    ///
    /// Goes through a temporary file and a rename so a concurrent reader
    /// never observes a half-written document.
    pub async fn write_string(&self, contents: &str) -> Result<(), DeckError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    /// Write pretty-printed JSON (2-space indent) to file
    pub async fn write_json<T: Serialize>(&self, value: &T) -> Result<(), DeckError> {
        let contents = serde_json::to_string_pretty(value)?;
        self.write_string(&contents).await
    }
}

#[cfg(test)]
mod tests {
    use crate::filesys::dir::Dir;

    #[test]
    fn test_write_then_read_json() {
        tokio_test::block_on(async {
            let temp = Dir::create_temp("stackdeck-file").await.unwrap();
            let file = temp.file("doc.json");

            file.write_json(&serde_json::json!({"a": 1})).await.unwrap();
            let value: serde_json::Value = file.read_json().await.unwrap();
            assert_eq!(value["a"], 1);

            // The temp file used for the atomic rename is gone
            assert!(!file.path().with_extension("tmp").exists());

            temp.delete().await.unwrap();
        });
    }

    #[test]
    fn test_write_creates_parent_directories() {
        tokio_test::block_on(async {
            let temp = Dir::create_temp("stackdeck-file").await.unwrap();
            let file = temp.subdir("a").subdir("b").file("doc.txt");

            file.write_string("contents").await.unwrap();
            assert_eq!(file.read_string().await.unwrap(), "contents");

            temp.delete().await.unwrap();
        });
    }
}
