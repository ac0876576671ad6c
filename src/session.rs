//! The session: upload set, coarse status, and user-visible text.
//!
//! A [`Session`] is the full state of one document-assembly attempt. It is an
//! explicit object handed to the pipeline function and mutated only by it —
//! there is no ambient or shared global state. Exactly one session exists per
//! attempt; [`Session::reset`] destroys it in place, releasing every resource
//! it holds, and returns it to `Idle` with an empty upload sequence.
//!
//! ## State machine
//!
//! ```text
//! Idle ──assemble──▶ Processing ──▶ Complete
//!   ▲                    │
//!   │                    └────────▶ Error
//!   └──────── reset ◀── Complete | Error
//! ```
//!
//! Per-item progress is communicated through the mutable `progress` text, not
//! through state transitions; `Processing` is one opaque state from the
//! caller's point of view.
//!
//! ## Resource ownership
//!
//! Every upload's display URL and the final output URL are owned by the
//! session and acquired from its [`ObjectStore`]. They are revoked exactly
//! once: on item removal or on reset. Leaks are observable through a counting
//! store in tests.

use crate::error::Scan2PdfError;
use crate::pipeline::datauri::DataUri;
use crate::store::ObjectStore;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Coarse status of the one live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// Accepting uploads; assembly has not started (or was reset).
    #[default]
    Idle,
    /// The pipeline is running; the upload set is frozen.
    Processing,
    /// Assembly finished; the output document is available.
    Complete,
    /// Assembly aborted; the error text describes the failure.
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Processing => "processing",
            SessionStatus::Complete => "complete",
            SessionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// One user-provided image and its cleanup state.
#[derive(Debug, Clone)]
pub struct UploadItem {
    /// Stable identity derived from the file name and its modification time.
    pub id: String,
    /// Original file name, shown in listings.
    pub file_name: String,
    /// Declared mime type of the original bytes (`image/jpeg` or `image/png`).
    pub mime_type: String,
    /// Raw bytes of the original photograph.
    pub bytes: Vec<u8>,
    /// Display URL for the original, owned by the session's store.
    pub display_url: String,
    /// Cleaned result, `None` until the cleanup service has produced one.
    /// Written in place exactly once per assembly run.
    pub cleaned: Option<DataUri>,
}

/// The produced multi-page document, present only while status is `Complete`.
#[derive(Debug, Clone)]
pub struct OutputDocument {
    /// Resolved download name (user text with exactly one `.pdf` suffix).
    pub file_name: String,
    /// Store URL for the document, revoked on reset.
    pub url: String,
    /// The PDF bytes themselves.
    pub bytes: Vec<u8>,
}

/// The full state of one document-assembly attempt.
pub struct Session {
    items: Vec<UploadItem>,
    status: SessionStatus,
    output_name: String,
    output: Option<OutputDocument>,
    progress: String,
    error: String,
    store: Arc<dyn ObjectStore>,
}

impl Session {
    /// Create an empty `Idle` session whose URL resources live in `store`.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            items: Vec::new(),
            status: SessionStatus::Idle,
            output_name: String::new(),
            output: None,
            progress: String::new(),
            error: String::new(),
            store,
        }
    }

    // ── Upload set ───────────────────────────────────────────────────────

    /// Add one photographed page to the upload sequence.
    ///
    /// `modified_ms` is the file's modification time in milliseconds since
    /// the epoch; together with the name it forms the item's stable id.
    /// A display URL is acquired from the store immediately.
    ///
    /// # Errors
    /// [`Scan2PdfError::SessionBusy`] while the pipeline is running — the
    /// upload set is frozen during `Processing`.
    pub fn add_upload(
        &mut self,
        file_name: &str,
        modified_ms: u64,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<&UploadItem, Scan2PdfError> {
        self.ensure_not_processing("add an upload")?;

        let id = format!("{file_name}-{modified_ms}");
        let display_url = self.store.create_url(&bytes, mime_type)?;
        debug!("Added upload '{}' ({} bytes) as {}", file_name, bytes.len(), display_url);

        self.items.push(UploadItem {
            id,
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
            display_url,
            cleaned: None,
        });
        Ok(self.items.last().expect("just pushed"))
    }

    /// Remove one upload by id, revoking its display URL.
    ///
    /// Returns `true` if an item was removed.
    ///
    /// # Errors
    /// [`Scan2PdfError::SessionBusy`] while the pipeline is running.
    pub fn remove_upload(&mut self, id: &str) -> Result<bool, Scan2PdfError> {
        self.ensure_not_processing("remove an upload")?;

        match self.items.iter().position(|it| it.id == id) {
            Some(pos) => {
                let item = self.items.remove(pos);
                self.store.revoke_url(&item.display_url);
                debug!("Removed upload '{}'", item.file_name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The upload sequence in upload order (= page order of the output).
    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    // ── Status and user-visible text ─────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Progress text for the running pipeline (e.g. "Cleaning item 2 of 5…").
    pub fn progress(&self) -> &str {
        &self.progress
    }

    /// Error or inline-validation text; empty when nothing is wrong.
    pub fn error(&self) -> &str {
        &self.error
    }

    // ── Output naming ────────────────────────────────────────────────────

    /// Set the desired output file name (free text).
    pub fn set_output_name(&mut self, name: &str) {
        self.output_name = name.to_string();
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// The download name: the user's text with exactly one `.pdf` suffix
    /// appended if absent. Blank input falls back to `document.pdf`.
    pub fn resolved_file_name(&self) -> String {
        let name = self.output_name.trim();
        if name.is_empty() {
            "document.pdf".to_string()
        } else if name.ends_with(".pdf") {
            name.to_string()
        } else {
            format!("{name}.pdf")
        }
    }

    /// The produced document. `Some` if and only if status is `Complete`.
    pub fn output(&self) -> Option<&OutputDocument> {
        self.output.as_ref()
    }

    // ── Reset ────────────────────────────────────────────────────────────

    /// Start over: revoke every display URL and the output URL, clear the
    /// upload sequence and all text, and return to `Idle`.
    pub fn reset(&mut self) {
        for item in self.items.drain(..) {
            self.store.revoke_url(&item.display_url);
        }
        if let Some(output) = self.output.take() {
            self.store.revoke_url(&output.url);
        }
        self.status = SessionStatus::Idle;
        self.progress.clear();
        self.error.clear();
        debug!("Session reset to idle");
    }

    // ── Pipeline-internal mutators ───────────────────────────────────────
    // Only the assembly driver touches these; callers observe the session
    // through the getters above.

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    pub(crate) fn set_progress(&mut self, text: &str) {
        self.progress = text.to_string();
    }

    pub(crate) fn set_error(&mut self, text: &str) {
        self.error = text.to_string();
    }

    pub(crate) fn item_mut(&mut self, index: usize) -> &mut UploadItem {
        &mut self.items[index]
    }

    /// Discard all cleaned results (used when a run aborts mid-way).
    pub(crate) fn clear_cleaned(&mut self) {
        for item in &mut self.items {
            item.cleaned = None;
        }
    }

    /// Register the produced PDF with the store and move to `Complete`.
    ///
    /// Coupling the output slot and the `Complete` transition here keeps the
    /// "output exists iff Complete" invariant in one place.
    pub(crate) fn install_output(&mut self, bytes: Vec<u8>) -> Result<(), Scan2PdfError> {
        let file_name = self.resolved_file_name();
        let url = self.store.create_url(&bytes, "application/pdf")?;
        self.output = Some(OutputDocument {
            file_name,
            url,
            bytes,
        });
        self.status = SessionStatus::Complete;
        Ok(())
    }

    fn ensure_not_processing(&self, action: &'static str) -> Result<(), Scan2PdfError> {
        if self.status == SessionStatus::Processing {
            return Err(Scan2PdfError::SessionBusy {
                action,
                status: self.status,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("items", &self.items.len())
            .field("status", &self.status)
            .field("output_name", &self.output_name)
            .field("output", &self.output.as_ref().map(|o| o.file_name.as_str()))
            .field("progress", &self.progress)
            .field("error", &self.error)
            .finish()
    }
}
