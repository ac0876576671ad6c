//! Error types for the scan2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Scan2PdfError`] — returned by the top-level session and assembly
//!   operations: validation failures, state-machine misuse, layout and
//!   composition failures, and missing startup configuration.
//!
//! * [`CleanupError`] — everything the remote image-cleanup service can do
//!   wrong, enumerated separately so a scripted test double can produce each
//!   failure shape and so the assembly driver can copy the exact description
//!   into the session's error text.
//!
//! There are no retries anywhere: the first failure is terminal for the
//! current assembly attempt, and the driver normalises whatever went wrong
//! into one human-readable string held by the session.

use crate::session::SessionStatus;
use thiserror::Error;

/// All fatal errors returned by the scan2pdf library.
#[derive(Debug, Error)]
pub enum Scan2PdfError {
    // ── Validation / state machine ───────────────────────────────────────
    /// Assembly was requested with no uploads in the session.
    ///
    /// This is a validation error, not a state transition: the session stays
    /// `Idle` and an inline message is placed in its error text.
    #[error("No images have been added. Add at least one JPEG or PNG before assembling.")]
    EmptyUploads,

    /// The session is in a state that does not permit the requested action.
    #[error("Cannot {action} while the session is {status}")]
    SessionBusy {
        action: &'static str,
        status: SessionStatus,
    },

    // ── Remote cleanup ───────────────────────────────────────────────────
    /// The cleanup collaborator failed for one upload; the whole run aborts.
    #[error("Cleanup failed for item {item}: {source}")]
    Cleanup {
        /// 1-indexed position of the failing upload.
        item: usize,
        #[source]
        source: CleanupError,
    },

    // ── Layout / composition ─────────────────────────────────────────────
    /// A cleaned result could not be decoded as an image.
    #[error("Failed to decode cleaned image {index}: {detail}")]
    ImageDecode { index: usize, detail: String },

    /// The string is not a `data:<mime>;base64,<payload>` URI.
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// lopdf failed to serialise the assembled document.
    #[error("Failed to write PDF document: {0}")]
    PdfWrite(String),

    // ── Resources ────────────────────────────────────────────────────────
    /// The object store could not materialise a display/output URL.
    #[error("Failed to create object URL: {0}")]
    Store(String),

    // ── Startup configuration ────────────────────────────────────────────
    /// The required API credential is absent from the environment.
    ///
    /// Fatal at startup: the application never becomes usable without it,
    /// so it is not modelled as a runtime cleanup failure.
    #[error("{var} is not set. Get an API key from https://ai.google.dev/ and export it.")]
    MissingApiKey { var: &'static str },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure from the remote image-cleanup service.
///
/// The first four variants reproduce the service's enumerated failure shapes;
/// the rest cover transport and payload problems any real HTTP client has.
#[derive(Debug, Clone, Error)]
pub enum CleanupError {
    /// The response carried no result candidate at all.
    #[error("Image cleanup returned no result candidate")]
    NoCandidate,

    /// The candidate finished for a reason other than a normal stop.
    ///
    /// `safety` carries the candidate's safety annotations verbatim,
    /// pre-formatted (empty when none were present).
    #[error("Image cleanup stopped before completion: {reason}{safety}")]
    Stopped { reason: String, safety: String },

    /// The model answered with text instead of an image.
    #[error("Image cleanup returned text instead of an image: \"{text}\"")]
    TextOnly { text: String },

    /// The response contained neither an image nor text.
    #[error("Image cleanup returned a malformed response with neither image nor text")]
    Malformed,

    /// The service rejected the request at the HTTP level.
    #[error("Cleanup service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The service reported a structured error of its own.
    #[error("Cleanup service error: {0}")]
    Api(String),

    /// The request never completed (connect, TLS, timeout).
    #[error("Cleanup request failed: {0}")]
    Network(String),

    /// The response body was not valid JSON for the expected schema.
    #[error("Cleanup response could not be parsed: {0}")]
    Decode(String),
}
