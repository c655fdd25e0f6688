//! Replay captures through the real-time path, then analyze them offline
//!
//! ```text
//! emg-replay [--config emg.toml] [--session 1] [NAME=FILE ...]
//! ```
//!
//! Each `NAME=FILE` pair is one capture: the file holds protocol lines
//! (`onset,CH1,CH2,CH3`). Without pairs a simulated session is generated
//! (MVC references, a rest capture and two gestures). Label changes are
//! printed as they happen; every capture is then normalized and scored and
//! its report printed as one JSON line.
//!
//! Logging goes through `RUST_LOG`, e.g. `RUST_LOG=emg_gestos=debug`.

use crossbeam::channel;
use emg_gestos::acquisition::{AcquisitionLoop, AcquisitionSummary, BatchRecorder, CancelToken};
use emg_gestos::config::{ConfigLoader, EmgConfig};
use emg_gestos::error::{EmgError, EmgResult, SourceError};
use emg_gestos::hal::{ActivationSegment, LineSource, SerialConfig, SerialLineSource, SimulatedLineSource, SimulatorConfig};
use emg_gestos::processing::GesturePipeline;
use emg_gestos::store::{CaptureContext, GestureStore, InMemoryStore, SessionId};
use emg_gestos::utils::time::{current_timestamp_millis, MockTimeProvider};
use std::env;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

struct Args {
    config: Option<PathBuf>,
    session_id: SessionId,
    captures: Vec<(String, PathBuf)>,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut args = Args {
        config: None,
        session_id: 1,
        captures: Vec::new(),
    };

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" => {
                let path = raw.next().ok_or("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--session" => {
                let value = raw.next().ok_or("--session needs a number")?;
                args.session_id = value.parse().map_err(|_| format!("invalid session id: {}", value))?;
            }
            "-h" | "--help" => {
                return Err("usage: emg-replay [--config FILE] [--session N] [NAME=FILE ...]".to_string());
            }
            pair => {
                let (name, path) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("expected NAME=FILE, got {}", pair))?;
                args.captures.push((name.to_string(), PathBuf::from(path)));
            }
        }
    }
    Ok(args)
}

/// Simulated session covering every reference the pipeline needs
fn demo_session() -> Vec<(String, SimulatorConfig)> {
    let sim = |seed: u64, segments: Vec<ActivationSegment>| SimulatorConfig {
        seed,
        segments,
        ..SimulatorConfig::default()
    };
    vec![
        ("CVM CH1".to_string(), sim(1, vec![ActivationSegment::active(1000, 0, 200.0)])),
        ("CVM CH2".to_string(), sim(2, vec![ActivationSegment::active(1000, 1, 200.0)])),
        ("CVM CH3".to_string(), sim(3, vec![ActivationSegment::active(1000, 2, 200.0)])),
        ("Reposo".to_string(), sim(4, vec![ActivationSegment::rest(1000)])),
        (
            "Arriba".to_string(),
            sim(5, vec![
                ActivationSegment::rest(300),
                ActivationSegment::active(400, 0, 80.0),
                ActivationSegment::rest(300),
            ]),
        ),
        (
            "Abajo".to_string(),
            sim(6, vec![
                ActivationSegment::rest(300),
                ActivationSegment::active(400, 2, 120.0),
                ActivationSegment::rest(300),
            ]),
        ),
    ]
}

/// Stream one source into the store, printing label changes as they arrive
fn record_capture(
    source: Box<dyn LineSource>,
    name: &str,
    session_id: SessionId,
    config: &EmgConfig,
    store: &Arc<InMemoryStore>,
) -> EmgResult<AcquisitionSummary> {
    let context = CaptureContext {
        gesture_id: store.next_gesture_id()?,
        session_id,
        gesture_name: name.to_string(),
        sample_rate_hz: config.acquisition.sample_rate_hz,
        captured_at_ms: current_timestamp_millis(),
    };
    let recorder = BatchRecorder::new(store.clone(), context, config.acquisition.batch_size)?;

    // Replayed samples are spaced by the nominal sample period
    let period_ms = (1000 / config.acquisition.sample_rate_hz.max(1)).max(1) as u64;
    let clock = Arc::new(MockTimeProvider::with_step(0, period_ms));

    let (tx, rx) = channel::unbounded();
    let worker_config = config.clone();
    let worker = thread::spawn(move || -> EmgResult<AcquisitionSummary> {
        let mut acquisition = AcquisitionLoop::from_config(source, &worker_config)?
            .with_recorder(recorder)
            .with_clock(clock);
        acquisition.run(&CancelToken::new(), |event| {
            if let Err(err) = tx.send(event.clone()) {
                debug!(label = %err.0.label, "event printer gone, dropping event");
            }
        })
    });

    for event in rx.iter() {
        println!("[{}] window {:>5}: {}", name, event.window_index, event.label);
    }

    join_acquisition(worker)
}

/// Wait for an acquisition thread; a panic counts as losing the source
fn join_acquisition(worker: thread::JoinHandle<EmgResult<AcquisitionSummary>>) -> EmgResult<AcquisitionSummary> {
    worker
        .join()
        .map_err(|_| EmgError::Source(SourceError::Disconnected("acquisition thread panicked".to_string())))?
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args(env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => ConfigLoader::with_file(path).load()?,
        None => ConfigLoader::new().load()?,
    };

    let store = Arc::new(InMemoryStore::new());

    let sources: Vec<(String, Box<dyn LineSource>)> = if args.captures.is_empty() {
        info!("no captures given, replaying a simulated session");
        demo_session()
            .into_iter()
            .map(|(name, sim)| (name, Box::new(SimulatedLineSource::new(sim)) as Box<dyn LineSource>))
            .collect()
    } else {
        let mut sources = Vec::with_capacity(args.captures.len());
        for (name, path) in &args.captures {
            let serial = SerialConfig::from_acquisition(path.display().to_string(), &config.acquisition);
            let file = File::open(path)?;
            sources.push((name.clone(), Box::new(SerialLineSource::new(file, serial)) as Box<dyn LineSource>));
        }
        sources
    };

    for (name, source) in sources {
        let summary = record_capture(source, &name, args.session_id, &config, &store)?;
        info!(capture = %name, ?summary, "capture recorded");
    }

    let ids: Vec<_> = store.list_gestures()?.iter().map(|g| g.gesture_id).collect();
    let pipeline = GesturePipeline::new(store.clone(), &config);

    let mut results = pipeline.process_all(&ids);
    results.sort_by_key(|(id, _)| *id);
    for (id, result) in results {
        match result {
            Ok(report) => println!("{}", serde_json::to_string(&report)?),
            Err(err) => eprintln!("gesture {}: {}", id, err),
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        error!("{}", err);
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emg_gestos::error::ErrorCategory;

    #[test]
    fn test_panicked_worker_is_a_lost_source() {
        let worker = thread::spawn(|| -> EmgResult<AcquisitionSummary> { panic!("reader crashed") });
        let err = join_acquisition(worker).unwrap_err();
        assert!(matches!(&err, EmgError::Source(SourceError::Disconnected(reason)) if reason.contains("panicked")));
        assert_eq!(err.category(), ErrorCategory::Connectivity);
    }

    #[test]
    fn test_parse_args() {
        let args = parse_args(
            ["--session", "3", "Arriba=arriba.txt"].iter().map(|s| s.to_string()),
        )
        .unwrap();
        assert_eq!(args.session_id, 3);
        assert_eq!(args.captures, vec![("Arriba".to_string(), PathBuf::from("arriba.txt"))]);
        assert!(parse_args(["bogus"].iter().map(|s| s.to_string())).is_err());
    }
}
