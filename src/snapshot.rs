//! Durable storage for document snapshots.
//!
//! A snapshot is the whole [`Document`] serialised as pretty JSON. Every save
//! overwrites the previous one atomically (write a sibling `.tmp` file, then
//! rename over the target), so a reader, or a crash mid-write, only ever sees
//! the previous complete snapshot or the new one.

use crate::error::PipelineError;
use crate::output::{Document, PageRecord, Snapshot};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One snapshot file on disk.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot if the file exists.
    ///
    /// Returns `Ok(None)` when there is no file yet.
    pub async fn load<P: PageRecord>(&self) -> Result<Option<Document<P>>, PipelineError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PipelineError::SnapshotReadFailed {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let snapshot: Snapshot<P> =
            serde_json::from_slice(&bytes).map_err(|e| PipelineError::InvalidSnapshot {
                path: self.path.clone(),
                detail: e.to_string(),
            })?;

        Ok(Some(snapshot.document))
    }

    /// Overwrite the snapshot with `document`.
    pub async fn save<P: PageRecord>(&self, document: &Document<P>) -> Result<(), PipelineError> {
        let write_err = |source: std::io::Error| PipelineError::SnapshotWriteFailed {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
            }
        }

        let json = serde_json::to_string_pretty(&SnapshotRef { document })
            .map_err(|e| PipelineError::Internal(format!("snapshot serialisation: {e}")))?;

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, json.as_bytes())
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(write_err)?;

        debug!(
            "Saved snapshot {} ({}/{} pages)",
            self.path.display(),
            document.pages.len(),
            document.total_pages
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Borrowing twin of [`Snapshot`] so saving doesn't clone the document.
#[derive(serde::Serialize)]
struct SnapshotRef<'a, P> {
    document: &'a Document<P>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OcrPage;

    fn page(n: usize, text: &str) -> OcrPage {
        OcrPage {
            page_number: n,
            content: text.into(),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nope_ocr.json"));
        let loaded = store.load::<OcrPage>().await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("out").join("scan_ocr.json"));
        let doc = Document {
            total_pages: 2,
            pages: vec![page(1, "Zündkerze"), page(2, "Kupplung")],
        };
        store.save(&doc).await.unwrap();

        let loaded = store.load::<OcrPage>().await.unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert!(!store.tmp_path().exists(), "temp file must be renamed away");
    }

    #[tokio::test]
    async fn saved_json_is_pretty_and_keeps_umlauts() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("scan_ocr.json"));
        store
            .save(&Document {
                total_pages: 1,
                pages: vec![page(1, "Getriebeöl")],
            })
            .await
            .unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.starts_with("{\n  \"document\": {"), "got: {raw}");
        assert!(raw.contains("Getriebeöl"));
    }

    #[tokio::test]
    async fn garbage_is_invalid_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken_ocr.json");
        std::fs::write(&path, "{\"document\": ").unwrap();
        let err = SnapshotStore::new(&path)
            .load::<OcrPage>()
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSnapshot { .. }));
    }

    #[test]
    fn tmp_path_is_sibling() {
        let store = SnapshotStore::new("/data/output/scan_ocr.json");
        assert_eq!(
            store.tmp_path(),
            PathBuf::from("/data/output/scan_ocr.json.tmp")
        );
    }
}
