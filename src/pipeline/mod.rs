//! Pipeline stages for photographed-document assembly.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable and the remote collaborator can be swapped for a
//! scripted double without touching geometry or composition code.
//!
//! ## Data Flow
//!
//! ```text
//! uploads ──▶ cleanup ──▶ layout ──▶ compose
//! (bytes)    (remote)    (fit/center) (lopdf)
//! ```
//!
//! 1. [`cleanup`] — send each original to the remote image model and get a
//!    cleaned [`datauri::DataUri`] back; the only stage with network I/O
//! 2. [`layout`]  — pure geometry: fit each image into the page's content
//!    rectangle and center it on the full page
//! 3. [`compose`] — decode the cleaned images and emit one multi-page PDF;
//!    CPU-bound, driven through `spawn_blocking` by the assembly driver

pub mod cleanup;
pub mod compose;
pub mod datauri;
pub mod layout;
