use super::beat::synthesize_beat;
use crate::{
    error::{CardioError, Result},
    signal::{PeakSet, Signal},
};
use log::{debug, warn};
use serde::Serialize;

/// A tiled sequence of synthetic beats.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticSignal {
    pub samples: Vec<f64>,
    pub time: Vec<f64>,
    pub sampling_rate: f64,
    /// Global index of every placed R-apex.
    pub r_peaks: Vec<usize>,
}

impl SyntheticSignal {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn peaks(&self) -> PeakSet {
        PeakSet::from_indices(self.r_peaks.clone())
    }

    pub fn to_signal(&self) -> Result<Signal> {
        Signal::new(self.samples.clone(), self.time.clone(), self.sampling_rate)
    }
}

/// Where one beat lands relative to what has been assembled so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatPlacement {
    /// Global index of the beat's R-apex.
    pub apex: usize,
    /// Leading beat samples dropped because they overlap the assembled tail.
    pub skip: usize,
    /// Zeros inserted between the assembled tail and the beat.
    pub padding: usize,
}

impl BeatPlacement {
    /// Place a beat whose apex (`r_index` within the beat) must land on
    /// `anchor`, given `assembled_len` samples already written.
    pub fn next(anchor: usize, r_index: usize, assembled_len: usize) -> Self {
        let start = anchor as isize - r_index as isize;
        let end = assembled_len as isize;
        if start >= end {
            Self {
                apex: anchor,
                skip: 0,
                padding: (start - end) as usize,
            }
        } else {
            Self {
                apex: anchor,
                skip: (end - start) as usize,
                padding: 0,
            }
        }
    }
}

/// Tile one beat per RR interval, each lasting its own interval and scaled by
/// the matching amplitude. Apex `k` sits `round(rr[k - 1] * fs)` samples after
/// apex `k - 1`; the first apex sits at the first beat's own `r_index`.
pub fn assemble(rr: &[f64], amplitudes: &[f64], fs: f64) -> Result<SyntheticSignal> {
    if !(fs.is_finite() && fs > 0.0) {
        return Err(CardioError::InvalidParameter(format!(
            "sampling rate must be positive, got {fs}"
        )));
    }

    let mut samples: Vec<f64> = Vec::new();
    let mut r_peaks = Vec::with_capacity(rr.len().min(amplitudes.len()));
    let mut anchor: Option<usize> = None;
    let mut step = 0;

    for (&duration, &amplitude) in rr.iter().zip(amplitudes) {
        let beat = synthesize_beat(duration, amplitude, fs);
        let target = anchor.map_or(beat.r_index, |prev| prev + step);
        anchor = Some(target);
        step = (duration.max(0.0) * fs).round() as usize;

        if beat.is_empty() {
            warn!("skipping empty beat for RR interval {duration}");
            continue;
        }
        let placement = BeatPlacement::next(target, beat.r_index, samples.len());
        samples.resize(samples.len() + placement.padding, 0.0);
        samples.extend(beat.samples.iter().skip(placement.skip));
        r_peaks.push(placement.apex);
    }

    debug!(
        "assembled {} beats into {} samples at {fs} Hz",
        r_peaks.len(),
        samples.len()
    );
    let time = (0..samples.len()).map(|i| i as f64 / fs).collect();
    Ok(SyntheticSignal {
        samples,
        time,
        sampling_rate: fs,
        r_peaks,
    })
}

/// Add a slow trend. A short trend is extended with its last value, a long
/// one is truncated; the output keeps the signal's length.
pub fn apply_trend(signal: &SyntheticSignal, trend: &[f64]) -> SyntheticSignal {
    let Some(&last) = trend.last() else {
        warn!("empty trend, returning the signal unchanged");
        return signal.clone();
    };
    let samples = signal
        .samples
        .iter()
        .enumerate()
        .map(|(i, s)| s + trend.get(i).copied().unwrap_or(last))
        .collect();
    SyntheticSignal {
        samples,
        ..signal.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::RRIntervals;

    #[test]
    fn apexes_follow_cumulative_intervals() {
        let rr = [0.8, 0.75, 0.9, 0.7];
        let synthetic = assemble(&rr, &[1.0; 4], 200.0).unwrap();
        assert_eq!(synthetic.r_peaks, vec![64, 224, 374, 554]);
        assert_eq!(synthetic.len(), 638);
        assert_eq!(synthetic.time.len(), 638);
        assert!((synthetic.time[200] - 1.0).abs() < 1e-12);
        for &apex in &synthetic.r_peaks {
            assert!(synthetic.samples[apex] > 0.69, "apex {apex}");
        }
    }

    #[test]
    fn gaps_are_zero_padded() {
        // beat 1 starts at 224 - 60 = 164, four samples after beat 0 ends
        let synthetic = assemble(&[0.8, 0.75], &[1.0, 1.0], 200.0).unwrap();
        assert_eq!(synthetic.len(), 314);
        assert!(synthetic.samples[160..164].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn placement_pads_or_trims() {
        assert_eq!(
            BeatPlacement::next(64, 64, 0),
            BeatPlacement {
                apex: 64,
                skip: 0,
                padding: 0
            }
        );
        assert_eq!(BeatPlacement::next(224, 60, 160).padding, 4);
        let trimmed = BeatPlacement::next(374, 72, 314);
        assert_eq!((trimmed.skip, trimmed.padding), (12, 0));
    }

    #[test]
    fn synthetic_rr_matches_input_for_regular_rhythm() {
        let rr = [0.6, 0.8, 1.0, 0.7, 0.9];
        let fs = 250.0;
        let synthetic = assemble(&rr, &[1.0; 5], fs).unwrap();
        let derived = RRIntervals::from_peaks(&synthetic.peaks(), fs);
        for (got, want) in derived.rr.iter().zip(&rr[..4]) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }
    }

    #[test]
    fn extra_amplitudes_are_ignored() {
        let short = assemble(&[0.8, 0.8], &[1.0, 2.0, 3.0], 100.0).unwrap();
        assert_eq!(short.r_peaks.len(), 2);
        let shorter = assemble(&[0.8, 0.8, 0.8], &[1.0], 100.0).unwrap();
        assert_eq!(shorter.r_peaks.len(), 1);
    }

    #[test]
    fn empty_input_gives_empty_signal() {
        let synthetic = assemble(&[], &[], 200.0).unwrap();
        assert!(synthetic.is_empty());
        assert!(synthetic.r_peaks.is_empty());
    }

    #[test]
    fn rejects_bad_sampling_rate() {
        assert!(matches!(
            assemble(&[0.8], &[1.0], 0.0),
            Err(CardioError::InvalidParameter(_))
        ));
    }

    #[test]
    fn empty_beat_keeps_timing() {
        let synthetic = assemble(&[0.8, 0.0, 0.8], &[1.0; 3], 200.0).unwrap();
        // third apex: 64 + 160 + 0
        assert_eq!(synthetic.r_peaks, vec![64, 224]);
    }

    #[test]
    fn trend_is_padded_or_truncated() {
        let base = assemble(&[0.5], &[1.0], 20.0).unwrap();
        assert_eq!(base.len(), 10);

        let short = apply_trend(&base, &[1.0, 2.0, 3.0]);
        assert_eq!(short.len(), base.len());
        assert_eq!(short.samples[0], base.samples[0] + 1.0);
        assert_eq!(short.samples[9], base.samples[9] + 3.0);

        let long = apply_trend(&base, &[0.5; 40]);
        assert_eq!(long.len(), base.len());
        assert_eq!(long.samples[9], base.samples[9] + 0.5);
        assert_eq!(long.r_peaks, base.r_peaks);

        assert_eq!(apply_trend(&base, &[]), base);
    }

    #[test]
    fn converts_to_signal() {
        let synthetic = assemble(&[0.8, 0.8], &[1.0, 1.0], 200.0).unwrap();
        let signal = synthetic.to_signal().unwrap();
        assert_eq!(signal.len(), synthetic.len());
        assert_eq!(signal.sampling_rate(), 200.0);
    }
}
