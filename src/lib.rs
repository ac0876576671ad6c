//! # scan2pdf
//!
//! Turn photographs of paper documents into a clean, multi-page PDF.
//!
//! ## Why this crate?
//!
//! Phone photos of documents come out skewed, shadowed and framed by the
//! desk they were taken on. Classical filters handle each defect in
//! isolation; an image model handles all of them at once. This crate sends
//! each photo to a remote image model for cleanup (deskew, shadow removal,
//! background whitening, crop) and lays the cleaned results onto fixed-size
//! pages, one photo per page, in upload order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photos
//!  │
//!  ├─ 1. Session  collect uploads, own display/output URL resources
//!  ├─ 2. Cleanup  one remote call per image, strictly sequential
//!  ├─ 3. Layout   fit each image to the 190×277 content rectangle, center on page
//!  └─ 4. Compose  embed images as raster XObjects via lopdf → one PDF
//! ```
//!
//! The session is an explicit four-state machine
//! (`Idle → Processing → Complete | Error`) that freezes the upload set
//! while the pipeline runs and releases every held resource on reset.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scan2pdf::{assemble, AssemblyConfig, GeminiCleaner, Session, TempFileStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AssemblyConfig::default();
//!     // Reads GEMINI_API_KEY; absence is a fatal startup error.
//!     let cleaner = GeminiCleaner::from_env(&config)?;
//!
//!     let mut session = Session::new(Arc::new(TempFileStore::new()?));
//!     session.add_upload("page1.jpg", 0, std::fs::read("page1.jpg")?, "image/jpeg")?;
//!     session.set_output_name("report");
//!
//!     assemble(&mut session, &cleaner, &config).await?;
//!     let output = session.output().expect("complete");
//!     std::fs::write(&output.file_name, &output.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scan2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! scan2pdf = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::assemble;
pub use config::{AssemblyConfig, AssemblyConfigBuilder};
pub use error::{CleanupError, Scan2PdfError};
pub use pipeline::cleanup::{GeminiCleaner, ImageCleaner, API_KEY_VAR};
pub use pipeline::datauri::DataUri;
pub use pipeline::layout::{fit_to_page, PageFormat, Placement};
pub use progress::{AssemblyObserver, NoopObserver, Observer};
pub use session::{OutputDocument, Session, SessionStatus, UploadItem};
pub use store::{ObjectStore, TempFileStore};
