//! End-to-end tests for the capture session.
//!
//! Drives full scan flows against the synthetic camera:
//! - Live capture through handoff
//! - Upload ingestion and rejection
//! - Orientation switching, timeouts and cancellation
//! - History retention

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use waste_scanner::camera::{
    CameraBackend, CameraError, CameraInfo, Orientation, PermissionOutcome, Resolution,
    StreamRequest, SyntheticCamera, VideoStream,
};
use waste_scanner::capture::{
    DeviceNegotiator, NegotiatorSettings, UploadAdapter, DEFAULT_ACQUIRE_TIMEOUT,
};
use waste_scanner::{
    CaptureError, CaptureSession, CapturedImage, Classification, ClassificationError, Classifier,
    SessionState, SourceKind, HISTORY_CAPACITY,
};

/// Small frames keep the JPEG encoder fast.
fn small_camera() -> SyntheticCamera {
    SyntheticCamera::builder()
        .native_resolution(Resolution::new(64, 48))
        .build()
}

fn session_for(camera: &SyntheticCamera) -> CaptureSession {
    CaptureSession::with_backend(Arc::new(camera.clone()))
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 140, 60]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// Classifier that records calls and either succeeds or fails.
struct StubClassifier {
    fail: bool,
    calls: AtomicUsize,
}

impl StubClassifier {
    fn new(fail: bool) -> Self {
        Self {
            fail,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, image: &CapturedImage) -> Result<Classification, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ClassificationError::new("model offline"));
        }
        Ok(Classification {
            category: "recyclable".to_string(),
            confidence: 0.9,
            suggested_action: format!("Recycle item {}", image.digest()),
        })
    }
}

/// Backend that works on its first open and refuses every open after that.
struct OneShotBackend {
    inner: SyntheticCamera,
    opens: AtomicUsize,
}

#[async_trait]
impl CameraBackend for OneShotBackend {
    fn list_devices(&self) -> Result<Vec<CameraInfo>, CameraError> {
        self.inner.list_devices()
    }

    async fn open_stream(&self, request: StreamRequest) -> Result<Box<dyn VideoStream>, CameraError> {
        if self.opens.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(CameraError::OpenFailed("device busy".to_string()));
        }
        self.inner.open_stream(request).await
    }
}

#[tokio::test]
async fn test_front_capture_flow() {
    let camera = small_camera();
    let mut session = session_for(&camera);

    let effective = session.start(Orientation::Front).await.unwrap();
    assert_eq!(effective, Orientation::Front);
    assert_eq!(session.state(), SessionState::Live);
    assert_eq!(camera.live_streams(), 1);

    let image = session.capture().await.unwrap();
    assert_eq!(session.state(), SessionState::Captured);
    assert_eq!(camera.live_streams(), 0);
    assert!(session.device().is_none());
    assert_eq!(image.media_type(), "image/jpeg");
    assert_eq!(image.source(), SourceKind::LiveCapture);
    assert_eq!((image.width(), image.height()), (64, 48));
    assert_eq!(&image.encoded()[..2], &[0xFF, 0xD8]);
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.pending().map(|p| p.digest()), Some(image.digest()));
}

#[tokio::test]
async fn test_capture_then_handoff() {
    let camera = small_camera();
    let mut session = session_for(&camera);
    let classifier = StubClassifier::new(false);

    session.start(Orientation::Back).await.unwrap();
    let image = session.capture().await.unwrap();

    let outcome = session.handoff(&classifier).await.unwrap();
    assert_eq!(outcome.classification.category, "recyclable");
    assert_eq!(outcome.image.digest(), image.digest());
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.pending().is_none());
    assert_eq!(session.history().len(), 1);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_handoff_keeps_image_for_retry() {
    let mut session = session_for(&small_camera());
    session.ingest(png_bytes(4, 4), "image/png").await.unwrap();

    let err = session.handoff(&StubClassifier::new(true)).await.unwrap_err();
    assert!(matches!(err, CaptureError::Classification(_)));
    assert_eq!(session.state(), SessionState::Captured);
    assert!(session.pending().is_some());
    assert!(session.last_error().is_some());

    session.handoff(&StubClassifier::new(false)).await.unwrap();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.last_error().is_none());
}

#[tokio::test]
async fn test_handoff_without_image_is_invalid() {
    let mut session = session_for(&small_camera());
    let classifier = StubClassifier::new(false);
    assert!(matches!(
        session.handoff(&classifier).await,
        Err(CaptureError::InvalidSessionState {
            state: SessionState::Idle,
            ..
        })
    ));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_text_upload_rejected() {
    let mut session = session_for(&small_camera());
    let err = session
        .ingest(b"just some notes".to_vec(), "text/plain")
        .await
        .unwrap_err();
    assert!(matches!(err, CaptureError::UnsupportedMediaType(_)));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.pending().is_none());
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_upload_keeps_dimensions_and_bytes() {
    let mut session = session_for(&small_camera());
    let bytes = png_bytes(7, 5);

    let image = session.ingest(bytes.clone(), "image/png").await.unwrap();
    assert_eq!((image.width(), image.height()), (7, 5));
    assert_eq!(image.encoded(), &bytes[..]);
    assert_eq!(image.source(), SourceKind::UploadedFile);
    assert_eq!(session.state(), SessionState::Captured);
}

#[tokio::test]
async fn test_corrupt_upload_rejected() {
    let mut session = session_for(&small_camera());
    let mut bytes = png_bytes(8, 8);
    bytes.truncate(20);

    let err = session.ingest(bytes, "image/png").await.unwrap_err();
    assert!(matches!(err, CaptureError::DecodeError(_)));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let camera = small_camera();
    let negotiator = DeviceNegotiator::new(Arc::new(camera), NegotiatorSettings::default());
    let mut session = CaptureSession::new(negotiator, UploadAdapter::new(16));

    let err = session.ingest(png_bytes(8, 8), "image/png").await.unwrap_err();
    assert!(matches!(err, CaptureError::UploadTooLarge { limit: 16, .. }));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_history_keeps_most_recent_five() {
    let mut session = session_for(&small_camera());
    let mut digests = Vec::new();

    for i in 0..6 {
        let image = session
            .ingest(png_bytes(2 + i, 2), "image/png")
            .await
            .unwrap();
        digests.push(image.digest().to_string());
        session.reset();
    }

    assert_eq!(session.history().len(), HISTORY_CAPACITY);
    let kept: Vec<&str> = session.history().iter().map(|i| i.digest()).collect();
    let expected: Vec<&str> = digests.iter().rev().take(5).map(String::as_str).collect();
    assert_eq!(kept, expected);

    // Newest first
    let selected = session.select_from_history(0).unwrap();
    assert_eq!(selected.digest(), digests[5]);
    assert_eq!(session.state(), SessionState::Captured);

    assert!(matches!(
        session.select_from_history(5),
        Err(CaptureError::IndexOutOfRange { index: 5, len: 5 })
    ));
    assert_eq!(session.state(), SessionState::Captured);
}

#[tokio::test]
async fn test_switch_while_captured_is_invalid() {
    let mut session = session_for(&small_camera());
    session.ingest(png_bytes(3, 3), "image/png").await.unwrap();

    assert!(matches!(
        session.switch_orientation().await,
        Err(CaptureError::InvalidSessionState {
            state: SessionState::Captured,
            ..
        })
    ));
    assert_eq!(session.state(), SessionState::Captured);
}

#[tokio::test]
async fn test_switch_orientation() {
    let camera = small_camera();
    let mut session = session_for(&camera);

    session.start(Orientation::Front).await.unwrap();
    let switched = session.switch_orientation().await.unwrap();
    assert_eq!(switched, Orientation::Back);
    assert_eq!(session.state(), SessionState::Live);
    assert_eq!(camera.live_streams(), 1);

    let back = session.switch_orientation().await.unwrap();
    assert_eq!(back, Orientation::Front);
    assert_eq!(camera.live_streams(), 1);
}

#[tokio::test]
async fn test_switch_failure_leaves_session_idle() {
    let inner = small_camera();
    let backend = OneShotBackend {
        inner: inner.clone(),
        opens: AtomicUsize::new(0),
    };
    let settings = NegotiatorSettings {
        retries: 0,
        ..NegotiatorSettings::default()
    };
    let negotiator = DeviceNegotiator::new(Arc::new(backend), settings);
    let mut session = CaptureSession::new(negotiator, UploadAdapter::default());

    session.start(Orientation::Front).await.unwrap();
    let err = session.switch_orientation().await.unwrap_err();
    assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.device().is_none());
    assert_eq!(inner.live_streams(), 0);
}

#[tokio::test]
async fn test_single_camera_substitutes_orientation() {
    let camera = SyntheticCamera::builder()
        .devices([Orientation::Front])
        .native_resolution(Resolution::new(32, 32))
        .build();
    let mut session = session_for(&camera);

    let effective = session.start(Orientation::Back).await.unwrap();
    assert_eq!(effective, Orientation::Front);
    assert!(session.device().is_some_and(|d| d.is_substituted()));
}

#[tokio::test]
async fn test_permission_denied() {
    let camera = SyntheticCamera::builder()
        .permission(PermissionOutcome::Denied)
        .build();
    let mut session = session_for(&camera);

    let err = session.start(Orientation::Front).await.unwrap_err();
    assert_eq!(err, CaptureError::PermissionDenied);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.last_error(), Some(err.user_message()));
    // Denials are not retried
    assert_eq!(camera.open_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_permission_times_out() {
    let camera = SyntheticCamera::builder()
        .permission(PermissionOutcome::Pending)
        .build();
    let mut session = session_for(&camera);

    let started = tokio::time::Instant::now();
    let err = session.start(Orientation::Front).await.unwrap_err();
    assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
    assert!(started.elapsed() <= DEFAULT_ACQUIRE_TIMEOUT);
    assert_eq!(session.state(), SessionState::Idle);
    // The prompt is asked once, not re-raised by retries
    assert_eq!(camera.open_attempts(), 1);
    assert_eq!(camera.live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let camera = SyntheticCamera::builder()
        .native_resolution(Resolution::new(16, 16))
        .transient_failures(2)
        .build();
    let mut session = session_for(&camera);

    session.start(Orientation::Front).await.unwrap();
    assert_eq!(session.state(), SessionState::Live);
    assert_eq!(camera.open_attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_start_returns_to_idle() {
    let camera = SyntheticCamera::builder()
        .native_resolution(Resolution::new(16, 16))
        .open_delay(Duration::from_secs(2))
        .build();
    let mut session = session_for(&camera);
    let states = session.subscribe();

    let result = tokio::time::timeout(Duration::from_millis(100), session.start(Orientation::Front)).await;
    assert!(result.is_err());

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(*states.borrow(), SessionState::Idle);
    assert_eq!(camera.live_streams(), 0);

    // Same session, same camera: a second start completes
    session.start(Orientation::Front).await.unwrap();
    assert_eq!(session.state(), SessionState::Live);
    assert_eq!(camera.live_streams(), 1);
    assert_eq!(camera.open_attempts(), 2);
}

#[tokio::test]
async fn test_dropped_capture_returns_to_idle() {
    // Full-size frames so encoding is still running when the future is dropped
    let camera = SyntheticCamera::default();
    let mut session = session_for(&camera);
    session.start(Orientation::Front).await.unwrap();
    let states = session.subscribe();

    let result = tokio::time::timeout(Duration::ZERO, session.capture()).await;
    assert!(result.is_err());

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(*states.borrow(), SessionState::Idle);
    assert!(session.device().is_none());
    assert!(session.pending().is_none());
    assert!(session.history().is_empty());
    assert_eq!(camera.live_streams(), 0);

    // Session can go live again
    session.start(Orientation::Back).await.unwrap();
    assert_eq!(session.state(), SessionState::Live);
}

#[tokio::test]
async fn test_warming_camera_is_not_ready() {
    let camera = SyntheticCamera::builder()
        .native_resolution(Resolution::new(16, 16))
        .warmup_frames(1)
        .build();
    let mut session = session_for(&camera);
    session.start(Orientation::Front).await.unwrap();

    assert_eq!(session.capture().await.unwrap_err(), CaptureError::DeviceNotReady);
    assert_eq!(session.state(), SessionState::Live);
    assert_eq!(camera.live_streams(), 1);

    session.capture().await.unwrap();
    assert_eq!(session.state(), SessionState::Captured);
    assert_eq!(camera.live_streams(), 0);
}

#[tokio::test]
async fn test_torch_unsupported() {
    let mut session = session_for(&small_camera());
    session.start(Orientation::Front).await.unwrap();

    assert!(!session.query_torch().unwrap());
    assert!(matches!(
        session.set_torch(true),
        Err(CaptureError::NotSupported(_))
    ));
    assert_eq!(session.state(), SessionState::Live);
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let camera = small_camera();
    let negotiator = DeviceNegotiator::new(Arc::new(camera.clone()), NegotiatorSettings::default());

    let mut device = negotiator.acquire(Orientation::Front).await.unwrap();
    assert_eq!(camera.live_streams(), 1);
    negotiator.release(&mut device);
    negotiator.release(&mut device);
    assert!(!device.is_active());
    assert_eq!(camera.live_streams(), 0);
    drop(device);
    assert_eq!(camera.live_streams(), 0);
}
