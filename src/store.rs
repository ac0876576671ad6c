//! Object-URL resources backing previews and downloads.
//!
//! The original surface handed image bytes to the display layer as opaque
//! URLs whose lifetime was easy to get wrong. Here the acquisition is an
//! explicit collaborator: the session asks its [`ObjectStore`] for a URL when
//! an upload is added or an output is produced, and revokes it when the item
//! is removed or the session resets. Failing to revoke is a leak, not a
//! crash, so tests inject a counting store and assert exactly one release
//! per resource.
//!
//! [`TempFileStore`] is the production implementation: each URL is a file in
//! a private temp directory, deleted on revoke and swept wholesale when the
//! store is dropped.

use crate::error::Scan2PdfError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Hands out opaque URLs for byte buffers and releases them on demand.
///
/// Implementations must be `Send + Sync`; the session shares its store with
/// whatever surface displays the URLs.
pub trait ObjectStore: Send + Sync {
    /// Materialise `bytes` behind a URL the display layer can open.
    fn create_url(&self, bytes: &[u8], mime_type: &str) -> Result<String, Scan2PdfError>;

    /// Release the resource behind a URL previously returned by
    /// [`ObjectStore::create_url`]. Unknown URLs are ignored.
    fn revoke_url(&self, url: &str);
}

/// File extension used for a stored object, chosen from its mime type.
fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

/// Backs each URL with a file in a private temp directory.
///
/// The directory (and any file whose URL was never revoked) is removed when
/// the store is dropped, so even a leaked URL cannot outlive the process.
pub struct TempFileStore {
    dir: TempDir,
    files: Mutex<HashMap<String, PathBuf>>,
    counter: AtomicU64,
}

impl TempFileStore {
    pub fn new() -> Result<Self, Scan2PdfError> {
        let dir = TempDir::new().map_err(|e| Scan2PdfError::Store(e.to_string()))?;
        Ok(Self {
            dir,
            files: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        })
    }
}

impl ObjectStore for TempFileStore {
    fn create_url(&self, bytes: &[u8], mime_type: &str) -> Result<String, Scan2PdfError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = self
            .dir
            .path()
            .join(format!("obj-{n}.{}", extension_for(mime_type)));
        std::fs::write(&path, bytes).map_err(|e| Scan2PdfError::Store(e.to_string()))?;

        let url = format!("file://{}", path.display());
        self.files
            .lock()
            .expect("store lock poisoned")
            .insert(url.clone(), path);
        debug!("Stored {} bytes as {}", bytes.len(), url);
        Ok(url)
    }

    fn revoke_url(&self, url: &str) {
        let path = self.files.lock().expect("store lock poisoned").remove(url);
        match path {
            Some(path) => {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
            None => warn!("Revoked unknown URL: {}", url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_writes_and_revoke_removes() {
        let store = TempFileStore::new().expect("store");
        let url = store.create_url(b"hello", "image/png").expect("url");
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".png"));

        let path = PathBuf::from(url.trim_start_matches("file://"));
        assert!(path.exists());

        store.revoke_url(&url);
        assert!(!path.exists());
    }

    #[test]
    fn urls_are_unique_per_object() {
        let store = TempFileStore::new().expect("store");
        let a = store.create_url(b"a", "image/jpeg").unwrap();
        let b = store.create_url(b"a", "image/jpeg").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn revoking_unknown_url_does_not_panic() {
        let store = TempFileStore::new().expect("store");
        store.revoke_url("file:///nope/missing.bin");
    }

    #[test]
    fn unknown_mime_falls_back_to_bin() {
        assert_eq!(extension_for("application/x-whatever"), "bin");
        assert_eq!(extension_for("application/pdf"), "pdf");
    }
}
