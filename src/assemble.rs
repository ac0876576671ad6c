//! The assembly pipeline: clean every upload, then compose the PDF.
//!
//! One logical task runs the whole pipeline; the caller's surface stays
//! responsive because every remote call is an await point. Remote calls are
//! strictly sequential and in upload order — the order doubles as the page
//! order of the output, and the per-item progress messages are part of the
//! observable contract, so cleanup must not be parallelised.
//!
//! All mutable session state is touched only here while the session is
//! `Processing` (its mutators reject other actors during that state), so no
//! further synchronisation is needed.
//!
//! Error policy: the first failure is terminal. Whatever went wrong is
//! normalised to a human-readable string on the session, cleaned results
//! produced so far are discarded, and no partial output is ever installed.

use crate::config::AssemblyConfig;
use crate::error::Scan2PdfError;
use crate::pipeline::cleanup::ImageCleaner;
use crate::pipeline::compose;
use crate::pipeline::datauri::DataUri;
use crate::session::{Session, SessionStatus, UploadItem};
use tracing::{info, warn};

/// Run the full pipeline for the session's current upload sequence.
///
/// On success the session is `Complete` with its output installed; on any
/// failure it is `Error` with the failure's description as its error text.
/// An empty upload sequence is a validation failure: the session stays
/// `Idle`, the message lands in its error text, and no collaborator is
/// invoked.
///
/// # Errors
/// * [`Scan2PdfError::EmptyUploads`] — nothing to assemble (no transition)
/// * [`Scan2PdfError::SessionBusy`] — the session is not `Idle`; a finished
///   session must be reset before assembling again
/// * [`Scan2PdfError::Cleanup`] — a remote cleanup call failed
/// * decode/compose/store errors from the layout step
pub async fn assemble(
    session: &mut Session,
    cleaner: &dyn ImageCleaner,
    config: &AssemblyConfig,
) -> Result<(), Scan2PdfError> {
    if session.status() != SessionStatus::Idle {
        return Err(Scan2PdfError::SessionBusy {
            action: "start assembly",
            status: session.status(),
        });
    }

    let total = session.items().len();
    if total == 0 {
        let err = Scan2PdfError::EmptyUploads;
        session.set_error(&err.to_string());
        return Err(err);
    }

    session.set_error("");
    session.set_status(SessionStatus::Processing);
    info!("Starting assembly of {} items", total);
    if let Some(obs) = &config.observer {
        obs.on_assembly_start(total);
    }

    // ── Step 1: clean each item, in upload order ─────────────────────────
    for i in 0..total {
        let text = format!("Cleaning item {} of {}…", i + 1, total);
        session.set_progress(&text);
        if let Some(obs) = &config.observer {
            obs.on_progress(&text);
        }

        let result = {
            let item = &session.items()[i];
            cleaner.clean(&item.bytes, &item.mime_type).await
        };

        match result {
            Ok(cleaned) => {
                session.item_mut(i).cleaned = Some(cleaned);
                if let Some(obs) = &config.observer {
                    obs.on_item_cleaned(i + 1, total);
                }
            }
            Err(source) => {
                let detail = source.to_string();
                warn!("Cleanup failed on item {}/{}: {}", i + 1, total, detail);
                session.clear_cleaned();
                session.set_status(SessionStatus::Error);
                session.set_error(&detail);
                if let Some(obs) = &config.observer {
                    obs.on_assembly_error(&detail);
                }
                return Err(Scan2PdfError::Cleanup {
                    item: i + 1,
                    source,
                });
            }
        }
    }

    // ── Step 2: lay the cleaned images onto pages ────────────────────────
    let text = "Assembling PDF…";
    session.set_progress(text);
    if let Some(obs) = &config.observer {
        obs.on_progress(text);
    }

    let cleaned = cleaned_results(session.items());
    let page_count = cleaned.len();
    let page = config.page;

    // Composition decodes every image; keep it off the async hot path.
    let composed = tokio::task::spawn_blocking(move || compose::compose_document(&cleaned, &page))
        .await
        .map_err(|e| Scan2PdfError::Internal(format!("compose task failed: {e}")));

    let pdf = match composed.and_then(|r| r) {
        Ok(pdf) => pdf,
        Err(e) => return Err(fail(session, config, e)),
    };

    // ── Step 3: install the output and finish ────────────────────────────
    if let Err(e) = session.install_output(pdf) {
        return Err(fail(session, config, e));
    }

    let file_name = session
        .output()
        .map(|o| o.file_name.clone())
        .unwrap_or_default();
    let text = format!("Done. {file_name} is ready to download.");
    session.set_progress(&text);
    info!("Assembly complete: {} pages as {}", page_count, file_name);
    if let Some(obs) = &config.observer {
        obs.on_assembly_complete(page_count);
    }
    Ok(())
}

/// Move the session to `Error` with the failure's description.
fn fail(session: &mut Session, config: &AssemblyConfig, err: Scan2PdfError) -> Scan2PdfError {
    let detail = err.to_string();
    warn!("Assembly failed: {}", detail);
    session.set_status(SessionStatus::Error);
    session.set_error(&detail);
    if let Some(obs) = &config.observer {
        obs.on_assembly_error(&detail);
    }
    err
}

/// The cleaned results that will become pages, in sequence order.
///
/// An item whose cleaned result is still `None` is skipped without emitting
/// a page. After a successful cleanup loop every item has a result, so the
/// skip can only be observed through internal misuse; it mirrors the legacy
/// surface, which dropped null results instead of failing.
pub(crate) fn cleaned_results(items: &[UploadItem]) -> Vec<DataUri> {
    items.iter().filter_map(|it| it.cleaned.clone()).collect()
}
