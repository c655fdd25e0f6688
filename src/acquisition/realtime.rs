// src/acquisition/realtime.rs
//! Real-time acquisition loop
//!
//! Single-threaded polling: every iteration checks the cancel flag, polls the
//! source once and does no work when nothing arrived. The detector state is
//! owned by the loop, so nothing here needs a lock.

use crate::acquisition::batch::BatchRecorder;
use crate::acquisition::window::WindowAggregator;
use crate::config::EmgConfig;
use crate::error::EmgResult;
use crate::hal::serial_driver::parse_line;
use crate::hal::traits::{LineSource, SourcePoll};
use crate::hal::types::Sample;
use crate::processing::classifier::{GestureClassifier, GestureDetector, GestureEvent};
use crate::utils::time::{MonotonicTimeProvider, TimeProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Cloneable stop flag shared with whoever requests cancellation
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Why a run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    SourceClosed,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionSummary {
    pub stop_reason: StopReason,
    pub lines_received: u64,
    pub samples_accepted: u64,
    pub records_skipped: u64,
    pub windows_completed: u64,
    pub events_emitted: u64,
    pub samples_persisted: u64,
    pub batches_flushed: u64,
}

#[derive(Default)]
struct RunCounters {
    lines_received: u64,
    samples_accepted: u64,
    records_skipped: u64,
    events_emitted: u64,
}

/// Drives one streaming source through detection and optional recording
pub struct AcquisitionLoop<S: LineSource> {
    source: S,
    detector: GestureDetector,
    recorder: Option<BatchRecorder>,
    clock: Arc<dyn TimeProvider>,
    idle_sleep: Duration,
}

impl<S: LineSource> AcquisitionLoop<S> {
    pub fn new(source: S, detector: GestureDetector) -> Self {
        Self {
            source,
            detector,
            recorder: None,
            clock: Arc::new(MonotonicTimeProvider::new()),
            idle_sleep: Duration::from_micros(crate::config::constants::acquisition::DEFAULT_IDLE_SLEEP_US),
        }
    }

    /// Build the detector from the `acquisition` and `classifier` sections
    pub fn from_config(source: S, config: &EmgConfig) -> EmgResult<Self> {
        let aggregator = WindowAggregator::new(config.acquisition.window_size)?;
        let classifier = GestureClassifier::from_config(&config.classifier)?;
        let detector = GestureDetector::new(aggregator, classifier);

        Ok(Self::new(source, detector)
            .with_idle_sleep(Duration::from_micros(config.acquisition.idle_sleep_us)))
    }

    pub fn with_recorder(mut self, recorder: BatchRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Pause after an idle poll; zero yields instead of sleeping
    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    pub fn detector(&self) -> &GestureDetector {
        &self.detector
    }

    pub fn recorder(&self) -> Option<&BatchRecorder> {
        self.recorder.as_ref()
    }

    pub fn recorder_mut(&mut self) -> Option<&mut BatchRecorder> {
        self.recorder.as_mut()
    }

    /// Hand back the recorder, with any samples a failed write left pending
    pub fn into_recorder(self) -> Option<BatchRecorder> {
        self.recorder
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run until cancelled or the source closes
    ///
    /// Malformed records are logged and skipped. The pending batch is always
    /// written before this returns, including when the source fails. When the
    /// store rejects a batch, one more flush is attempted before the error is
    /// returned; samples it could not write stay in the recorder
    /// (see [`into_recorder`](Self::into_recorder)).
    pub fn run<F>(&mut self, cancel: &CancelToken, mut on_event: F) -> EmgResult<AcquisitionSummary>
    where
        F: FnMut(&GestureEvent),
    {
        info!(source = %self.source.describe(), rules = ?self.detector.describe_rules(), "acquisition started");
        let mut counters = RunCounters::default();

        let stop_reason = loop {
            if cancel.is_cancelled() {
                info!("acquisition cancelled");
                break StopReason::Cancelled;
            }

            let poll = match self.source.poll_line() {
                Ok(poll) => poll,
                Err(err) => {
                    error!(source = %self.source.describe(), error = %err, "streaming source failed");
                    if let Err(flush_err) = self.drain() {
                        error!(error = %flush_err, "could not flush pending samples");
                    }
                    return Err(err.into());
                }
            };

            let bytes = match poll {
                SourcePoll::Line(bytes) => bytes,
                SourcePoll::Idle => {
                    self.idle();
                    continue;
                }
                SourcePoll::Closed => {
                    info!("source closed");
                    break StopReason::SourceClosed;
                }
            };
            counters.lines_received += 1;

            let parsed = match parse_line(&bytes) {
                Ok(parsed) => parsed,
                Err(err) => {
                    counters.records_skipped += 1;
                    warn!(error = %err, line = %String::from_utf8_lossy(&bytes), "skipping malformed record");
                    continue;
                }
            };

            let sample = Sample::from_parsed(self.clock.monotonic_millis(), parsed);
            counters.samples_accepted += 1;

            if let Some(recorder) = self.recorder.as_mut() {
                if let Err(err) = recorder.push(sample) {
                    error!(error = %err, pending = recorder.pending_len(), "raw batch write failed");
                    if let Err(retry_err) = recorder.flush() {
                        error!(
                            error = %retry_err,
                            pending = recorder.pending_len(),
                            "final flush failed, samples kept in recorder"
                        );
                    }
                    return Err(err.into());
                }
            }

            if let Some(event) = self.detector.push(&sample) {
                counters.events_emitted += 1;
                on_event(&event);
            }
        };

        self.drain()?;
        Ok(self.summary(stop_reason, &counters))
    }

    fn drain(&mut self) -> EmgResult<()> {
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.flush()?;
        }
        Ok(())
    }

    fn idle(&self) {
        if self.idle_sleep.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(self.idle_sleep);
        }
    }

    fn summary(&self, stop_reason: StopReason, counters: &RunCounters) -> AcquisitionSummary {
        let recorded = self.recorder.as_ref().map(|r| r.stats()).unwrap_or_default();
        let summary = AcquisitionSummary {
            stop_reason,
            lines_received: counters.lines_received,
            samples_accepted: counters.samples_accepted,
            records_skipped: counters.records_skipped,
            windows_completed: self.detector.aggregator().windows_completed(),
            events_emitted: counters.events_emitted,
            samples_persisted: recorded.samples_persisted,
            batches_flushed: recorded.batches_flushed,
        };
        info!(?summary, "acquisition stopped");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, EmgError, SourceError, StoreError};
    use crate::processing::classifier::ThresholdRule;
    use crate::processing::normalizer::NormalizedRecord;
    use crate::processing::quality::QualityMetrics;
    use crate::store::{
        CaptureContext, CapturedGesture, GestureId, GestureStore, GestureSummary, InMemoryStore, SessionId,
    };
    use std::sync::atomic::AtomicUsize;
    use crate::utils::time::MockTimeProvider;
    use std::collections::VecDeque;

    /// Scripted source: each entry is returned by one poll
    struct Scripted {
        polls: VecDeque<Result<SourcePoll, SourceError>>,
        cancel_after: Option<(usize, CancelToken)>,
        polled: usize,
    }

    impl Scripted {
        fn lines(lines: &[&str]) -> Self {
            Self {
                polls: lines.iter().map(|l| Ok(SourcePoll::Line(l.as_bytes().to_vec()))).collect(),
                cancel_after: None,
                polled: 0,
            }
        }
    }

    impl LineSource for Scripted {
        fn poll_line(&mut self) -> Result<SourcePoll, SourceError> {
            self.polled += 1;
            if let Some((n, token)) = &self.cancel_after {
                if self.polled >= *n {
                    token.cancel();
                }
            }
            self.polls.pop_front().unwrap_or(Ok(SourcePoll::Closed))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    /// Store whose first `failures` raw writes are rejected
    struct FlakyStore {
        inner: InMemoryStore,
        failures: AtomicUsize,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self {
                inner: InMemoryStore::new(),
                failures: AtomicUsize::new(failures),
            }
        }
    }

    impl GestureStore for FlakyStore {
        fn next_gesture_id(&self) -> Result<GestureId, StoreError> {
            self.inner.next_gesture_id()
        }

        fn latest_capture(&self) -> Result<Option<GestureSummary>, StoreError> {
            self.inner.latest_capture()
        }

        fn list_gestures(&self) -> Result<Vec<GestureSummary>, StoreError> {
            self.inner.list_gestures()
        }

        fn insert_raw_batch(&self, context: &CaptureContext, samples: &[Sample]) -> Result<(), StoreError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Write { table: "raw", reason: "busy".to_string() });
            }
            self.inner.insert_raw_batch(context, samples)
        }

        fn load_capture(&self, gesture_id: GestureId) -> Result<Option<CapturedGesture>, StoreError> {
            self.inner.load_capture(gesture_id)
        }

        fn find_mvc_reference(
            &self,
            session_id: SessionId,
            channel: usize,
            prefixes: &[String],
        ) -> Result<Option<CapturedGesture>, StoreError> {
            self.inner.find_mvc_reference(session_id, channel, prefixes)
        }

        fn find_rest_capture(&self, session_id: SessionId, pattern: &str) -> Result<Option<CapturedGesture>, StoreError> {
            self.inner.find_rest_capture(session_id, pattern)
        }

        fn insert_normalized(&self, record: &NormalizedRecord) -> Result<(), StoreError> {
            self.inner.insert_normalized(record)
        }

        fn load_normalized(&self, gesture_id: GestureId) -> Result<Option<NormalizedRecord>, StoreError> {
            self.inner.load_normalized(gesture_id)
        }

        fn insert_quality(&self, metrics: &QualityMetrics) -> Result<(), StoreError> {
            self.inner.insert_quality(metrics)
        }

        fn load_quality(&self, gesture_id: GestureId) -> Result<Option<QualityMetrics>, StoreError> {
            self.inner.load_quality(gesture_id)
        }
    }

    fn numbered_lines(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("1,{},0,0", i)).collect()
    }

    fn detector(window: usize) -> GestureDetector {
        let classifier = GestureClassifier::new(vec![ThresholdRule::new(0, 15.0, "Arriba")], "Reposo").unwrap();
        GestureDetector::new(WindowAggregator::new(window).unwrap(), classifier)
    }

    fn recorder(store: Arc<dyn GestureStore>, batch: usize) -> BatchRecorder {
        let context = CaptureContext {
            gesture_id: 3,
            session_id: 1,
            gesture_name: "Arriba".to_string(),
            sample_rate_hz: 1000,
            captured_at_ms: 0,
        };
        BatchRecorder::new(store, context, batch).unwrap()
    }

    #[test]
    fn test_skips_malformed_records() {
        let source = Scripted::lines(&["1,0,0,0", "garbage", "1,40,0,0", "1,2", "", "1,0,0,0", "1,40,0,0"]);
        let mut acquisition = AcquisitionLoop::new(source, detector(2)).with_idle_sleep(Duration::ZERO);
        let mut events = Vec::new();

        let summary = acquisition.run(&CancelToken::new(), |e| events.push(e.clone())).unwrap();

        assert_eq!(summary.stop_reason, StopReason::SourceClosed);
        assert_eq!(summary.lines_received, 7);
        assert_eq!(summary.records_skipped, 3);
        assert_eq!(summary.samples_accepted, 4);
        assert_eq!(summary.windows_completed, 2);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label, "Arriba");
    }

    #[test]
    fn test_idle_polls_do_no_work() {
        let mut source = Scripted::lines(&["1,0,0,0"]);
        source.polls.push_front(Ok(SourcePoll::Idle));
        source.polls.push_front(Ok(SourcePoll::Idle));
        let mut acquisition = AcquisitionLoop::new(source, detector(4)).with_idle_sleep(Duration::ZERO);

        let summary = acquisition.run(&CancelToken::new(), |_| {}).unwrap();
        assert_eq!(summary.lines_received, 1);
        assert_eq!(acquisition.source().polled, 4);
    }

    #[test]
    fn test_cancellation_drains_partial_batch() {
        let store = Arc::new(InMemoryStore::new());
        let token = CancelToken::new();
        let lines: Vec<String> = (0..50).map(|i| format!("1,{},0,0", i)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let mut source = Scripted::lines(&refs);
        source.cancel_after = Some((23, token.clone()));

        let mut acquisition = AcquisitionLoop::new(source, detector(100)).with_recorder(recorder(store.clone(), 10));
        let summary = acquisition.run(&token, |_| {}).unwrap();

        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.samples_accepted, 23);
        assert_eq!(summary.samples_persisted, 23);
        assert_eq!(summary.batches_flushed, 3);
        assert_eq!(store.raw_row_count(), 23);
    }

    #[test]
    fn test_connectivity_failure_flushes_then_errors() {
        let store = Arc::new(InMemoryStore::new());
        let mut source = Scripted::lines(&["0,1,2,3", "0,4,5,6"]);
        source.polls.push_back(Err(SourceError::Disconnected("unplugged".to_string())));

        let mut acquisition = AcquisitionLoop::new(source, detector(100)).with_recorder(recorder(store.clone(), 100));
        let result = acquisition.run(&CancelToken::new(), |_| {});

        assert!(matches!(result, Err(EmgError::Source(SourceError::Disconnected(_)))));
        assert_eq!(store.raw_row_count(), 2);
    }

    #[test]
    fn test_rejected_batch_is_retried_before_error() {
        let store = Arc::new(FlakyStore::new(1));
        let lines = numbered_lines(25);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();

        let mut acquisition = AcquisitionLoop::new(Scripted::lines(&refs), detector(100))
            .with_recorder(recorder(store.clone(), 10));
        let result = acquisition.run(&CancelToken::new(), |_| {});

        assert!(matches!(result, Err(EmgError::Store(StoreError::Write { table: "raw", .. }))));
        assert_eq!(store.inner.raw_row_count(), 10);
        assert_eq!(acquisition.recorder().map(BatchRecorder::pending_len), Some(0));
    }

    #[test]
    fn test_unwritten_samples_can_be_recovered() {
        let store = Arc::new(FlakyStore::new(2));
        let lines = numbered_lines(25);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();

        let mut acquisition = AcquisitionLoop::new(Scripted::lines(&refs), detector(100))
            .with_recorder(recorder(store.clone(), 10));
        assert!(acquisition.run(&CancelToken::new(), |_| {}).is_err());
        assert_eq!(store.inner.raw_row_count(), 0);

        let mut recorder = acquisition.into_recorder().unwrap();
        assert_eq!(recorder.pending_len(), 10);
        assert_eq!(recorder.flush().unwrap(), 10);
        let capture = store.load_capture(3).unwrap().unwrap();
        assert_eq!(capture.channel(0), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_timestamps_from_clock() {
        let store = Arc::new(InMemoryStore::new());
        let source = Scripted::lines(&["0,1,2,3", "1,4,5,6", "1,7,8,9"]);
        let mut acquisition = AcquisitionLoop::new(source, detector(100))
            .with_recorder(recorder(store.clone(), 100))
            .with_clock(Arc::new(MockTimeProvider::with_step(1000, 1)));

        acquisition.run(&CancelToken::new(), |_| {}).unwrap();
        let capture = store.load_capture(3).unwrap().unwrap();
        let stamps: Vec<u64> = capture.samples.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(stamps, vec![1000, 1001, 1002]);
    }

    #[test]
    fn test_from_config_defaults() {
        let config = EmgConfig::default();
        let acquisition = AcquisitionLoop::from_config(Scripted::lines(&[]), &config).unwrap();
        assert_eq!(acquisition.detector().aggregator().capacity(), 100);
        assert_eq!(acquisition.detector().classifier().rest_label(), "Reposo");
    }

    #[test]
    fn test_from_config_rejects_empty_window() {
        let mut config = EmgConfig::default();
        config.acquisition.window_size = 0;
        let result = AcquisitionLoop::from_config(Scripted::lines(&[]), &config);
        assert!(matches!(
            result,
            Err(EmgError::Config(ConfigError::ZeroSize { field: "acquisition.window_size" }))
        ));
    }
}
