// tests/realtime_detection_tests.rs
//! End-to-end tests of the real-time path: protocol lines in, label changes out

use emg_gestos::acquisition::{AcquisitionLoop, BatchRecorder, CancelToken, StopReason, WindowAggregator};
use emg_gestos::config::EmgConfig;
use emg_gestos::hal::{parse_line, ActivationSegment, SimulatedLineSource, SimulatorConfig};
use emg_gestos::processing::{GestureClassifier, GestureDetector, GestureEvent, ThresholdRule};
use emg_gestos::store::{CaptureContext, GestureStore, InMemoryStore};
use emg_gestos::utils::time::MockTimeProvider;
use emg_gestos::Sample;
use std::sync::Arc;
use std::time::Duration;

fn sample(line: &str) -> Sample {
    Sample::from_parsed(0, parse_line(line.as_bytes()).expect("valid line"))
}

/// CH1 swinging +/-40 around mid-scale, the others flat
fn active_ch1(i: usize) -> Sample {
    let ch1 = if i % 2 == 0 { 472 } else { 552 };
    sample(&format!("1,{},512,512", ch1))
}

fn rest() -> Sample {
    sample("0,512,512,512")
}

fn default_detector() -> GestureDetector {
    let config = EmgConfig::default();
    GestureDetector::new(
        WindowAggregator::new(config.acquisition.window_size).unwrap(),
        GestureClassifier::from_config(&config.classifier).unwrap(),
    )
}

fn labels(events: &[GestureEvent]) -> Vec<(&str, u64)> {
    events.iter().map(|e| (e.label.as_str(), e.window_index)).collect()
}

#[test]
fn test_first_window_event_at_hundredth_sample() {
    let mut detector = default_detector();

    let mut events = Vec::new();
    for i in 0..300 {
        let s = if i < 100 { active_ch1(i) } else { rest() };
        if let Some(event) = detector.push(&s) {
            events.push((i, event));
        }
    }

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].0, 99);
    assert_eq!(events[0].1.label, "Arriba");
    assert_eq!(events[0].1.window_index, 0);
    assert_eq!(events[1].0, 199);
    assert_eq!(events[1].1.label, "Reposo");
    assert_eq!(events[1].1.window_index, 1);
    assert_eq!(detector.aggregator().windows_completed(), 3);
}

#[test]
fn test_first_declared_rule_wins() {
    let mut detector = default_detector();
    let mut last = None;
    for i in 0..100 {
        let swing = if i % 2 == 0 { -60 } else { 60 };
        let s = sample(&format!("1,{},512,{}", 512 + swing, 512 + swing));
        if let Some(event) = detector.push(&s) {
            last = Some(event);
        }
    }
    assert_eq!(last.unwrap().label, "Arriba");

    let reordered = GestureClassifier::new(
        vec![ThresholdRule::new(2, 25.0, "Abajo"), ThresholdRule::new(0, 15.0, "Arriba")],
        "Reposo",
    )
    .unwrap();
    assert_eq!(reordered.classify(&[60.0, 0.0, 60.0]), "Abajo");
}

#[test]
fn test_simulated_session_label_sequence() {
    let config = EmgConfig::default();
    let source = SimulatedLineSource::new(SimulatorConfig::default());
    let mut acquisition = AcquisitionLoop::from_config(source, &config)
        .unwrap()
        .with_idle_sleep(Duration::ZERO);

    let mut events = Vec::new();
    let summary = acquisition
        .run(&CancelToken::new(), |event| events.push(event.clone()))
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::SourceClosed);
    assert_eq!(summary.samples_accepted, 1500);
    assert_eq!(summary.windows_completed, 15);
    assert_eq!(summary.records_skipped, 0);
    assert_eq!(
        labels(&events),
        vec![("Reposo", 0), ("Arriba", 3), ("Reposo", 6), ("Abajo", 9), ("Reposo", 12)]
    );
    assert_eq!(summary.events_emitted, 5);
}

#[test]
fn test_garbage_lines_do_not_disturb_detection() {
    let config = EmgConfig::default();
    let source = SimulatedLineSource::new(SimulatorConfig {
        garbage_every: Some(10),
        ..SimulatorConfig::default()
    });
    let mut acquisition = AcquisitionLoop::from_config(source, &config).unwrap();

    let mut events = Vec::new();
    let summary = acquisition
        .run(&CancelToken::new(), |event| events.push(event.clone()))
        .unwrap();

    assert!(summary.records_skipped > 100);
    assert_eq!(summary.samples_accepted, 1500);
    assert_eq!(summary.lines_received, summary.samples_accepted + summary.records_skipped);
    assert_eq!(
        labels(&events),
        vec![("Reposo", 0), ("Arriba", 3), ("Reposo", 6), ("Abajo", 9), ("Reposo", 12)]
    );
}

#[test]
fn test_no_consecutive_duplicate_labels() {
    let config = EmgConfig::default();
    let source = SimulatedLineSource::new(SimulatorConfig {
        seed: 7,
        segments: vec![
            ActivationSegment::active(500, 0, 80.0),
            ActivationSegment::active(500, 0, 90.0),
            ActivationSegment::rest(500),
        ],
        ..SimulatorConfig::default()
    });
    let mut acquisition = AcquisitionLoop::from_config(source, &config).unwrap();

    let mut events = Vec::new();
    acquisition
        .run(&CancelToken::new(), |event| events.push(event.clone()))
        .unwrap();

    assert_eq!(labels(&events), vec![("Arriba", 0), ("Reposo", 10)]);
}

#[test]
fn test_recording_persists_every_accepted_sample() {
    let config = EmgConfig::default();
    let store = Arc::new(InMemoryStore::new());
    let context = CaptureContext {
        gesture_id: store.next_gesture_id().unwrap(),
        session_id: 3,
        gesture_name: "Arriba".to_string(),
        sample_rate_hz: 1000,
        captured_at_ms: 1_700_000_000_000,
    };
    let recorder = BatchRecorder::new(store.clone(), context, 64).unwrap();

    let source = SimulatedLineSource::new(SimulatorConfig {
        garbage_every: Some(25),
        ..SimulatorConfig::default()
    });
    let mut acquisition = AcquisitionLoop::from_config(source, &config)
        .unwrap()
        .with_recorder(recorder)
        .with_clock(Arc::new(MockTimeProvider::with_step(0, 1)));

    let summary = acquisition.run(&CancelToken::new(), |_| {}).unwrap();
    assert_eq!(summary.samples_persisted, 1500);
    assert_eq!(summary.batches_flushed, 24);
    assert_eq!(store.raw_row_count(), 1500);

    let capture = store.load_capture(1).unwrap().unwrap();
    assert_eq!(capture.session_id(), 3);
    assert_eq!(capture.len(), 1500);
    assert!(capture
        .samples
        .windows(2)
        .all(|pair| pair[1].timestamp_ms == pair[0].timestamp_ms + 1));
    assert_eq!(capture.onsets().iter().filter(|o| o.is_active()).count(), 600);
}

#[test]
fn test_cancelled_before_start() {
    let cancel = CancelToken::new();
    cancel.cancel();

    let mut acquisition =
        AcquisitionLoop::from_config(SimulatedLineSource::new(SimulatorConfig::default()), &EmgConfig::default())
            .unwrap();
    let summary = acquisition.run(&cancel, |_| panic!("no events expected")).unwrap();

    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(summary.lines_received, 0);
}
