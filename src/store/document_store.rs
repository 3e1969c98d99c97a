use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::bot::error::Error;

/// JSON document store, one file per (namespace, key).
///
/// Namespaces partition unrelated feature data; within a namespace every key
/// maps to exactly one document and a save fully replaces the prior value.
/// Saves write to a temporary file and rename over the target, so a crash
/// mid-write never corrupts the previously stored document.
pub struct DocumentStore {
    base_path: PathBuf,
}

impl DocumentStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn document_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.base_path.join(namespace).join(format!("{}.json", key))
    }

    /// Check whether a document exists without reading it
    pub async fn exists(&self, namespace: &str, key: &str) -> bool {
        tokio::fs::try_exists(self.document_path(namespace, key))
            .await
            .unwrap_or(false)
    }

    /// Load a document, returning `None` when the key has never been saved.
    ///
    /// A document that exists but fails to parse is moved aside so the next
    /// save starts clean, and `None` is returned; callers fall back to their
    /// defaults instead of failing.
    pub async fn load<T: DeserializeOwned>(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<T>, Error> {
        let path = self.document_path(namespace, key);

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                return Err(Error::Io(e));
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                error!("Corrupt document at {}: {}", path.display(), e);
                self.quarantine(&path).await;
                Ok(None)
            }
        }
    }

    /// Load a document, materializing `T::default()` when the key is absent
    pub async fn load_or_default<T: DeserializeOwned + Default>(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<T, Error> {
        Ok(self.load(namespace, key).await?.unwrap_or_default())
    }

    /// Save a document, fully replacing any prior value under the key
    pub async fn save<T: Serialize>(
        &self,
        namespace: &str,
        key: &str,
        document: &T,
    ) -> Result<(), Error> {
        let path = self.document_path(namespace, key);
        let contents = serde_json::to_string_pretty(document)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a temporary file in the same directory, then atomically
        // rename it over the target.
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!("Saved document {}/{}", namespace, key);
        Ok(())
    }

    /// Remove a document; missing keys are not an error
    pub async fn delete(&self, namespace: &str, key: &str) -> Result<(), Error> {
        let path = self.document_path(namespace, key);
        match tokio::fs::remove_file(&path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Move an undecodable file aside so it can be inspected later
    async fn quarantine(&self, path: &Path) {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let aside = path.with_extension(format!("json.corrupt-{}", stamp));
        if let Err(e) = tokio::fs::rename(path, &aside).await {
            warn!("Failed to quarantine {}: {}", path.display(), e);
        } else {
            warn!("Quarantined corrupt document to {}", aside.display());
        }
    }
}
