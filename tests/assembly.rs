//! End-to-end tests for the session state machine and the assembly pipeline.
//!
//! No network and no live model: the cleanup collaborator is a scripted
//! double that replays canned results, and the object store counts every
//! create/revoke so resource leaks are observable. The doubles share one
//! event log, which makes the ordering contract checkable: the progress text
//! for item i is recorded strictly before cleanup call i.

use async_trait::async_trait;
use scan2pdf::{
    assemble, AssemblyConfig, AssemblyObserver, CleanupError, DataUri, ImageCleaner, ObjectStore,
    Scan2PdfError, Session, SessionStatus,
};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// ── Test doubles ─────────────────────────────────────────────────────────────

/// One entry in the shared event log.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    /// Progress text as stored on the session.
    Progress(String),
    /// A cleanup call; the payload is the first byte of the image, which the
    /// tests use to tag uploads.
    Clean(u8),
}

type EventLog = Arc<Mutex<Vec<Event>>>;

/// Observer that mirrors every progress update into the event log.
struct RecordingObserver {
    log: EventLog,
}

impl AssemblyObserver for RecordingObserver {
    fn on_progress(&self, text: &str) {
        self.log.lock().unwrap().push(Event::Progress(text.to_string()));
    }
}

/// Cleaner that replays a script of canned results.
struct ScriptedCleaner {
    script: Mutex<VecDeque<Result<DataUri, CleanupError>>>,
    log: EventLog,
}

impl ScriptedCleaner {
    fn new(script: Vec<Result<DataUri, CleanupError>>, log: EventLog) -> Self {
        Self {
            script: Mutex::new(script.into()),
            log,
        }
    }

    fn calls(&self) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, Event::Clean(_)))
            .count()
    }
}

#[async_trait]
impl ImageCleaner for ScriptedCleaner {
    async fn clean(&self, image: &[u8], _mime_type: &str) -> Result<DataUri, CleanupError> {
        self.log.lock().unwrap().push(Event::Clean(image[0]));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("cleaner called more often than scripted")
    }
}

/// Store that hands out in-memory URLs and counts every create and revoke.
#[derive(Default)]
struct CountingStore {
    counter: AtomicU64,
    created: Mutex<Vec<String>>,
    revoked: Mutex<HashMap<String, usize>>,
}

impl CountingStore {
    fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    fn revocations_of(&self, url: &str) -> usize {
        *self.revoked.lock().unwrap().get(url).unwrap_or(&0)
    }
}

impl ObjectStore for CountingStore {
    fn create_url(&self, _bytes: &[u8], _mime_type: &str) -> Result<String, Scan2PdfError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let url = format!("mem://obj-{n}");
        self.created.lock().unwrap().push(url.clone());
        Ok(url)
    }

    fn revoke_url(&self, url: &str) {
        *self
            .revoked
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// A real PNG of the given dimensions, used as a cleaned result.
fn cleaned_png(width: u32, height: u32) -> DataUri {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([230, 230, 230]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("png encode");
    DataUri::from_bytes("image/png", &buf)
}

fn config_with(log: &EventLog) -> AssemblyConfig {
    AssemblyConfig::builder()
        .observer(Arc::new(RecordingObserver { log: log.clone() }))
        .build()
        .expect("valid config")
}

/// Session with `n` uploads whose first byte tags their position (1-based).
fn session_with_uploads(store: Arc<CountingStore>, n: u8) -> Session {
    let mut session = Session::new(store);
    for i in 1..=n {
        session
            .add_upload(&format!("page{i}.jpg"), u64::from(i), vec![i, 0, 0], "image/jpeg")
            .expect("add upload");
    }
    session
}

// ── Ordering and progress ────────────────────────────────────────────────────

#[tokio::test]
async fn cleans_every_item_sequentially_in_upload_order() {
    let log: EventLog = Arc::default();
    let store = Arc::new(CountingStore::default());
    let mut session = session_with_uploads(store, 3);
    session.set_output_name("report");

    // Aspects 1.5, 0.5, 1.5: pages 1 and 3 fit to content width, page 2 to
    // content height (content aspect is 190/277 ≈ 0.686).
    let cleaner = ScriptedCleaner::new(
        vec![
            Ok(cleaned_png(300, 200)),
            Ok(cleaned_png(200, 400)),
            Ok(cleaned_png(450, 300)),
        ],
        log.clone(),
    );
    let config = config_with(&log);

    assemble(&mut session, &cleaner, &config)
        .await
        .expect("assembly must succeed");

    assert_eq!(session.status(), SessionStatus::Complete);
    assert_eq!(cleaner.calls(), 3);

    // Progress text for item i is recorded strictly before cleanup call i,
    // and the calls arrive in upload order.
    let events = log.lock().unwrap().clone();
    let mut expected_call = 1u8;
    for pair in events.windows(2) {
        if let Event::Clean(tag) = pair[1] {
            assert_eq!(tag, expected_call, "calls out of upload order");
            match &pair[0] {
                Event::Progress(text) => assert!(
                    text.contains(&format!("item {expected_call} of 3")),
                    "progress before call {expected_call} was: {text}"
                ),
                other => panic!("expected progress before call {expected_call}, got {other:?}"),
            }
            expected_call += 1;
        }
    }
    assert_eq!(expected_call, 4, "all three calls must appear in the log");

    // Every item was cleaned in place.
    assert!(session.items().iter().all(|it| it.cleaned.is_some()));

    let output = session.output().expect("output iff complete");
    assert_eq!(output.file_name, "report.pdf");
    assert!(session.progress().contains("ready to download"));

    // One page per cleaned item, in order.
    let doc = lopdf::Document::load_mem(&output.bytes).expect("output must be a valid PDF");
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 3);

    // Width-fit pages place at content width (190 units = 538.58 pt); the
    // tall page is fit to the content height (277 units = 785.20 pt).
    let contents: Vec<String> = pages
        .values()
        .map(|&id| String::from_utf8_lossy(&doc.get_page_content(id).expect("content")).into_owned())
        .collect();
    assert!(contents[0].contains("538.58 0 0"), "page 1: {}", contents[0]);
    assert!(contents[1].contains("0 0 785.20"), "page 2: {}", contents[1]);
    assert!(contents[2].contains("538.58 0 0"), "page 3: {}", contents[2]);
}

// ── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_upload_set_never_reaches_the_collaborators() {
    let log: EventLog = Arc::default();
    let store = Arc::new(CountingStore::default());
    let mut session = Session::new(store);
    let cleaner = ScriptedCleaner::new(vec![], log.clone());
    let config = config_with(&log);

    let err = assemble(&mut session, &cleaner, &config)
        .await
        .expect_err("empty sequence must fail validation");

    assert!(matches!(err, Scan2PdfError::EmptyUploads));
    assert_eq!(session.status(), SessionStatus::Idle, "no state transition");
    assert_eq!(session.error(), Scan2PdfError::EmptyUploads.to_string());
    assert_eq!(cleaner.calls(), 0);
    assert!(session.output().is_none());
}

// ── Failure handling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn first_failure_aborts_and_discards_cleaned_results() {
    let log: EventLog = Arc::default();
    let store = Arc::new(CountingStore::default());
    let mut session = session_with_uploads(store, 3);

    let failure = CleanupError::TextOnly {
        text: "I cannot see a document here.".into(),
    };
    let cleaner = ScriptedCleaner::new(
        vec![Ok(cleaned_png(300, 200)), Err(failure.clone())],
        log.clone(),
    );
    let config = config_with(&log);

    let err = assemble(&mut session, &cleaner, &config)
        .await
        .expect_err("run must abort on call 2");

    match &err {
        Scan2PdfError::Cleanup { item, .. } => assert_eq!(*item, 2),
        other => panic!("expected Cleanup, got {other}"),
    }

    // Calls 3..n never happen.
    assert_eq!(cleaner.calls(), 2);

    // The session holds the failure's own description, verbatim.
    assert_eq!(session.status(), SessionStatus::Error);
    assert_eq!(session.error(), failure.to_string());

    // Already-cleaned results are discarded; no partial output exists.
    assert!(session.items().iter().all(|it| it.cleaned.is_none()));
    assert!(session.output().is_none());
}

#[tokio::test]
async fn stopped_failure_surfaces_reason_and_safety_text() {
    let log: EventLog = Arc::default();
    let store = Arc::new(CountingStore::default());
    let mut session = session_with_uploads(store, 1);

    let cleaner = ScriptedCleaner::new(
        vec![Err(CleanupError::Stopped {
            reason: "SAFETY".into(),
            safety: "; safety ratings: [{\"category\":\"HARM_CATEGORY_X\",\"probability\":\"HIGH\"}]"
                .into(),
        })],
        log.clone(),
    );
    let config = config_with(&log);

    assemble(&mut session, &cleaner, &config)
        .await
        .expect_err("must abort");

    assert!(session.error().contains("SAFETY"));
    assert!(session.error().contains("HARM_CATEGORY_X"));
}

// ── State machine guards ─────────────────────────────────────────────────────

#[tokio::test]
async fn finished_session_requires_reset_before_assembling_again() {
    let log: EventLog = Arc::default();
    let store = Arc::new(CountingStore::default());
    let mut session = session_with_uploads(store, 1);

    let cleaner = ScriptedCleaner::new(vec![Ok(cleaned_png(100, 100))], log.clone());
    let config = config_with(&log);

    assemble(&mut session, &cleaner, &config).await.expect("first run");
    assert_eq!(session.status(), SessionStatus::Complete);

    let err = assemble(&mut session, &cleaner, &config)
        .await
        .expect_err("second run without reset must be rejected");
    assert!(matches!(err, Scan2PdfError::SessionBusy { .. }));
    assert_eq!(session.status(), SessionStatus::Complete, "state untouched");
    assert_eq!(cleaner.calls(), 1, "collaborator not invoked again");
}

// ── Resource lifetimes ───────────────────────────────────────────────────────

#[tokio::test]
async fn reset_releases_every_resource_exactly_once() {
    let log: EventLog = Arc::default();
    let store = Arc::new(CountingStore::default());
    let mut session = session_with_uploads(store.clone(), 2);

    let cleaner = ScriptedCleaner::new(
        vec![Ok(cleaned_png(120, 80)), Ok(cleaned_png(80, 120))],
        log.clone(),
    );
    let config = config_with(&log);

    assemble(&mut session, &cleaner, &config).await.expect("run");

    // Two display URLs plus the output document.
    let created = store.created();
    assert_eq!(created.len(), 3);
    for url in &created {
        assert_eq!(store.revocations_of(url), 0, "{url} released too early");
    }

    session.reset();

    assert_eq!(session.status(), SessionStatus::Idle);
    assert!(session.items().is_empty());
    assert!(session.output().is_none());
    for url in &created {
        assert_eq!(store.revocations_of(url), 1, "{url} not released exactly once");
    }

    // A second reset must not double-release anything.
    session.reset();
    for url in &created {
        assert_eq!(store.revocations_of(url), 1, "{url} double-released");
    }
}

#[tokio::test]
async fn reset_after_error_releases_display_urls() {
    let log: EventLog = Arc::default();
    let store = Arc::new(CountingStore::default());
    let mut session = session_with_uploads(store.clone(), 2);

    let cleaner = ScriptedCleaner::new(vec![Err(CleanupError::NoCandidate)], log.clone());
    let config = config_with(&log);

    assemble(&mut session, &cleaner, &config).await.expect_err("abort");
    assert_eq!(session.status(), SessionStatus::Error);

    session.reset();
    let created = store.created();
    assert_eq!(created.len(), 2, "only display URLs were created");
    for url in &created {
        assert_eq!(store.revocations_of(url), 1);
    }
    assert_eq!(session.status(), SessionStatus::Idle);
}

#[test]
fn removing_an_upload_releases_its_display_url_once() {
    let store = Arc::new(CountingStore::default());
    let mut session = session_with_uploads(store.clone(), 2);

    let id = session.items()[0].id.clone();
    let url = session.items()[0].display_url.clone();
    assert!(session.remove_upload(&id).expect("remove"));

    assert_eq!(store.revocations_of(&url), 1);
    assert_eq!(session.items().len(), 1);
    // The surviving item's URL is untouched.
    assert_eq!(store.revocations_of(&session.items()[0].display_url), 0);
}
