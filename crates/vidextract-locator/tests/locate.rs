use std::sync::Arc;

use vidextract_decoder::DynFrameSource;
use vidextract_decoder::backends::mock::{MockSource, MockSpec, OverlayScript};
use vidextract_locator::{
    BoundKind, ExtractionSession, LocateError, SamplerConfig, SessionConfig,
};
use vidextract_ocr::{MockOcrEngine, OcrEngine, OcrError, PreparedImage, RecognitionResult};
use vidextract_timestamp::{OverlayInstant, parse_overlay};

fn instant(text: &str) -> OverlayInstant {
    parse_overlay(text, None).unwrap()
}

fn session_over(spec: MockSpec) -> ExtractionSession {
    let source: DynFrameSource = Arc::new(MockSource::new(spec));
    session_with_engine(source, Arc::new(MockOcrEngine))
}

fn session_with_engine(source: DynFrameSource, engine: Arc<dyn OcrEngine>) -> ExtractionSession {
    let config = SessionConfig {
        sampler: SamplerConfig::passthrough(),
        ..SessionConfig::default()
    };
    ExtractionSession::new(source, engine, config).unwrap()
}

fn thousand_frames() -> MockSpec {
    MockSpec {
        frame_count: 1000,
        ..MockSpec::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn monotonic_video_resolves_exact_inclusive_bounds() {
    let mut session = session_over(thousand_frames());
    let range = session
        .locate(
            instant("01/02/2023 12:00:02:000"),
            instant("01/02/2023 12:00:05:000"),
        )
        .await
        .unwrap();
    // 25 fps: two seconds in is frame 50, five seconds in is frame 125.
    assert_eq!(range.start, 50);
    assert_eq!(range.end, 125);
    assert_eq!(range.frame_count(), 76);
}

#[tokio::test(flavor = "multi_thread")]
async fn dropouts_at_the_boundary_shift_to_nearest_readable_frame() {
    let overlay = OverlayScript::default()
        .garbled([48, 49, 50, 51])
        .blank([124, 125, 126]);
    let mut session = session_over(MockSpec {
        overlay: Some(overlay),
        ..thousand_frames()
    });
    let range = session
        .locate(
            instant("01/02/2023 12:00:02:000"),
            instant("01/02/2023 12:00:05:000"),
        )
        .await
        .unwrap();
    // First readable frame at or past the start target is 52; the last
    // readable frame at or before the end target is 123.
    assert_eq!(range.start, 52);
    assert_eq!(range.end, 123);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreadable_stretch_wider_than_probe_widening_still_resolves() {
    // Frames 40..=60 are garbled: far more than neighbor widening can
    // absorb, so the stride scan has to carry the start bound across the
    // stretch before the dense pass picks the first readable frame.
    let overlay = OverlayScript::default().garbled(40..=60);
    let mut session = session_over(MockSpec {
        overlay: Some(overlay),
        ..thousand_frames()
    });
    let range = session
        .locate(
            instant("01/02/2023 12:00:02:000"),
            instant("01/02/2023 12:00:05:000"),
        )
        .await
        .unwrap();
    assert_eq!(range.start, 61);
    assert_eq!(range.end, 125);
}

#[tokio::test(flavor = "multi_thread")]
async fn fully_unreadable_video_reports_an_empty_bracket() {
    let mut session = session_over(MockSpec {
        frame_count: 100,
        overlay: None,
        ..MockSpec::default()
    });
    let err = session
        .locate(
            instant("01/02/2023 12:00:01:000"),
            instant("01/02/2023 12:00:02:000"),
        )
        .await
        .unwrap_err();
    match err {
        LocateError::RangeNotFound { bound, bracket } => {
            assert_eq!(bound, BoundKind::Start);
            assert!(bracket.below.is_none());
            assert!(bracket.above.is_none());
        }
        other => panic!("expected RangeNotFound, got {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn target_past_the_overlay_clock_names_the_nearest_reading() {
    // 300 frames at 25 fps covers twelve seconds of overlay clock.
    let mut session = session_over(MockSpec::default());
    let err = session
        .locate(
            instant("01/02/2023 12:00:20:000"),
            instant("01/02/2023 12:00:21:000"),
        )
        .await
        .unwrap_err();
    match err {
        LocateError::RangeNotFound { bound, bracket } => {
            assert_eq!(bound, BoundKind::Start);
            let (index, reading) = bracket.below.expect("nearest reading below the target");
            assert_eq!(index, 299);
            assert!(reading < instant("01/02/2023 12:00:20:000"));
        }
        other => panic!("expected RangeNotFound, got {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn one_out_of_order_frame_does_not_widen_the_bounds() {
    // Frame 62 sits on the binary-probe path for the start bound; give it
    // an instant an hour in the future and the locator must skip it.
    let overlay = OverlayScript::default()
        .with_override(62, instant("01/02/2023 13:00:00:000"));
    let mut session = session_over(MockSpec {
        overlay: Some(overlay),
        ..thousand_frames()
    });
    let range = session
        .locate(
            instant("01/02/2023 12:00:02:000"),
            instant("01/02/2023 12:00:05:000"),
        )
        .await
        .unwrap();
    assert_eq!(range.start, 50);
    assert_eq!(range.end, 125);
}

#[tokio::test(flavor = "multi_thread")]
async fn cache_computes_each_index_exactly_once() {
    let source = Arc::new(MockSource::new(thousand_frames()));
    let dyn_source: DynFrameSource = source.clone();
    let session = session_with_engine(dyn_source, Arc::new(MockOcrEngine));

    let cache = session.cache();
    let reads = futures::future::join_all((0..8).map(|_| cache.get_or_compute(7))).await;
    for read in reads {
        let sample = read.unwrap();
        assert_eq!(sample.frame_index, 7);
        assert!(sample.is_readable());
    }
    assert_eq!(cache.computed(), 1);
    assert_eq!(source.decode_calls(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_locate_reuses_cached_samples() {
    let mut session = session_over(thousand_frames());
    let start = instant("01/02/2023 12:00:02:000");
    let end = instant("01/02/2023 12:00:05:000");

    let first = session.locate(start, end).await.unwrap();
    let computed_after_first = session.cache().computed();
    let second = session.locate(start, end).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(session.cache().computed(), computed_after_first);
}

#[tokio::test(flavor = "multi_thread")]
async fn mixed_kind_and_inverted_targets_are_rejected_up_front() {
    let mut session = session_over(thousand_frames());

    let err = session
        .locate(instant("01/02/2023 12:00:02:000"), instant("12:00:05:000"))
        .await
        .unwrap_err();
    assert!(matches!(err, LocateError::IncomparableTargets));
    // Nothing should have been decoded for a rejected request.
    assert_eq!(session.cache().computed(), 0);

    let err = session
        .locate(
            instant("01/02/2023 12:00:05:000"),
            instant("01/02/2023 12:00:02:000"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LocateError::TargetOrder { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_is_a_terminal_outcome() {
    let mut session = session_over(thousand_frames());
    session.cancel_token().cancel();
    let err = session
        .locate(
            instant("01/02/2023 12:00:02:000"),
            instant("01/02/2023 12:00:05:000"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LocateError::Cancelled));
}

/// Reads like the mock engine but reports every result below the floor.
struct TimidEngine;

impl OcrEngine for TimidEngine {
    fn name(&self) -> &'static str {
        "timid"
    }

    fn recognize(&self, image: &PreparedImage) -> Result<RecognitionResult, OcrError> {
        let inner = MockOcrEngine.recognize(image)?;
        Ok(RecognitionResult::new(inner.text, 0.3))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn low_confidence_reads_become_failure_markers() {
    let source: DynFrameSource = Arc::new(MockSource::new(MockSpec {
        frame_count: 100,
        ..MockSpec::default()
    }));
    let mut session = session_with_engine(source, Arc::new(TimidEngine));
    let err = session
        .locate(
            instant("01/02/2023 12:00:01:000"),
            instant("01/02/2023 12:00:02:000"),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LocateError::RangeNotFound {
            bound: BoundKind::Start,
            ..
        }
    ));
}
