//! Observer trait for assembly-run events.
//!
//! The session's mutable progress text is the source of truth for what the
//! user sees; this trait only mirrors each update outward so a host surface
//! (terminal progress bar, web socket, test recorder) can react without the
//! library knowing how it renders. Inject an `Arc<dyn AssemblyObserver>` via
//! [`crate::config::AssemblyConfigBuilder::observer`].
//!
//! All methods have default no-op implementations so callers only override
//! what they care about. Events arrive strictly in item order: the pipeline
//! is a single sequential task.

use std::sync::Arc;

/// Called by the assembly pipeline as it works through the upload sequence.
pub trait AssemblyObserver: Send + Sync {
    /// Called once, after validation, before any cleanup call.
    fn on_assembly_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called with the exact progress text just stored on the session.
    ///
    /// For item i of n this fires immediately before the remote call and the
    /// text contains "item i of n" (1-indexed).
    fn on_progress(&self, text: &str) {
        let _ = text;
    }

    /// Called when item `index` (1-indexed) has been cleaned successfully.
    fn on_item_cleaned(&self, index: usize, total_items: usize) {
        let _ = (index, total_items);
    }

    /// Called once when the output document has been produced.
    fn on_assembly_complete(&self, page_count: usize) {
        let _ = page_count;
    }

    /// Called once if the run aborts, with the session's error text.
    fn on_assembly_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl AssemblyObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::AssemblyConfig`].
pub type Observer = Arc<dyn AssemblyObserver>;
