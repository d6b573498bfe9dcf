use assert_cmd::cargo::cargo_bin_cmd;
use cardio_lib::metrics::RrStats;
use serde::Deserialize;
use std::{error::Error, fs, path::PathBuf};

#[derive(Deserialize)]
struct SynthesisOutput {
    sampling_rate: f64,
    source_peaks: usize,
    beats: usize,
    samples: usize,
    beat_intervals: Vec<f64>,
    amplitudes: Vec<f64>,
    r_peaks: Vec<usize>,
    synthetic_stats: RrStats,
}

fn synthesize(extra: &[&str]) -> Result<(Vec<u8>, SynthesisOutput), Box<dyn Error>> {
    let recording = sample_path("test_data/recording_sample.txt");
    let mut cmd = cargo_bin_cmd!("cardio");
    cmd.args(["synthesize", "--recording", &recording]).args(extra);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let parsed = serde_json::from_slice(&stdout)?;
    Ok((stdout, parsed))
}

#[test]
fn noiseless_synthesis_keeps_rhythm() -> Result<(), Box<dyn Error>> {
    let (_, actual) = synthesize(&[])?;
    assert_eq!(actual.sampling_rate, 200.0);
    assert_eq!(actual.source_peaks, 15);
    assert_eq!(actual.beats, 14);
    assert_eq!(actual.r_peaks.len(), 14);
    assert!(actual.beat_intervals.iter().all(|rr| (rr - 0.8).abs() < 1e-9));
    for pair in actual.r_peaks.windows(2) {
        assert_eq!(pair[1] - pair[0], 160);
    }
    let hr = actual.synthetic_stats.heart_rate_bpm.expect("defined");
    assert!((hr - 75.0).abs() < 1e-6);
    assert!(actual.amplitudes.iter().all(|a| (9.0..11.5).contains(a)));
    assert!(actual.samples > 14 * 150);
    Ok(())
}

#[test]
fn configured_noise_is_seeded() -> Result<(), Box<dyn Error>> {
    let config = sample_path("test_data/pipeline.toml");
    let (first, a) = synthesize(&["--config", &config])?;
    let (second, _) = synthesize(&["--config", &config])?;
    assert_eq!(first, second);

    assert_eq!(a.beats, 14);
    assert!(a.beat_intervals.iter().all(|&rr| rr >= 0.3));
    assert!(a.beat_intervals.iter().any(|rr| (rr - 0.8).abs() > 1e-6));

    let (_, reseeded) = synthesize(&["--config", &config, "--seed", "7"])?;
    assert_ne!(reseeded.beat_intervals, a.beat_intervals);
    Ok(())
}

#[test]
fn writes_synthetic_csv() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let csv = dir.path().join("synthetic.csv");
    let (_, actual) = synthesize(&["--noise", "--seed", "3", "--csv", csv.to_str().expect("utf8")])?;

    let text = fs::read_to_string(&csv)?;
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("time,synthetic"));
    assert_eq!(lines.count(), actual.samples);
    Ok(())
}

#[test]
fn flat_input_cannot_be_synthesized() {
    let mut cmd = cargo_bin_cmd!("cardio");
    cmd.args(["synthesize", "--fs", "200"])
        .write_stdin(vec!["1.0"; 400].join("\n"));
    cmd.assert().failure();
}

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .expect("crates dir")
        .parent()
        .expect("workspace root")
        .to_path_buf()
}

fn sample_path(relative: &str) -> String {
    workspace_root()
        .join(relative)
        .to_string_lossy()
        .to_string()
}
