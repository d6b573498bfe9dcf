use crate::error::{CardioError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Sampled waveform paired with its time axis.
///
/// `sampling_rate` is nominal: it converts sample counts to seconds and is
/// never re-derived from the timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    sampling_rate: f64,
    samples: Vec<f64>,
    time: Vec<f64>,
}

impl Signal {
    pub fn new(samples: Vec<f64>, time: Vec<f64>, sampling_rate: f64) -> Result<Self> {
        if samples.len() != time.len() {
            return Err(CardioError::LengthMismatch {
                samples: samples.len(),
                time: time.len(),
            });
        }
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(CardioError::InvalidParameter(format!(
                "sampling rate must be positive, got {sampling_rate}"
            )));
        }
        if let Some(pos) = time.windows(2).position(|w| w[1] < w[0]) {
            return Err(CardioError::InvalidParameter(format!(
                "time axis decreases at sample {}",
                pos + 1
            )));
        }
        Ok(Self {
            sampling_rate,
            samples,
            time,
        })
    }

    /// Build a signal whose time axis is `index / sampling_rate`.
    pub fn uniform(samples: Vec<f64>, sampling_rate: f64) -> Result<Self> {
        let time = (0..samples.len())
            .map(|i| i as f64 / sampling_rate)
            .collect();
        Self::new(samples, time, sampling_rate)
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Index range whose timestamps fall in `[start, end]`.
    pub fn index_range(&self, start: f64, end: f64) -> Range<usize> {
        let lo = self.time.partition_point(|&t| t < start);
        let hi = self.time.partition_point(|&t| t <= end);
        lo..hi.max(lo)
    }

    /// Copy of the samples whose timestamps fall in `[start, end]`.
    /// An empty selection yields an empty signal.
    pub fn slice_time(&self, start: f64, end: f64) -> Signal {
        let range = self.index_range(start, end);
        Signal {
            sampling_rate: self.sampling_rate,
            samples: self.samples[range.clone()].to_vec(),
            time: self.time[range].to_vec(),
        }
    }
}

/// Detected beat apices as strictly increasing sample indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakSet {
    pub indices: Vec<usize>,
}

impl PeakSet {
    pub fn from_indices(mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// RR intervals (seconds)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RRIntervals {
    pub rr: Vec<f64>,
}

impl RRIntervals {
    pub fn from_peaks(peaks: &PeakSet, fs: f64) -> Self {
        let rr = peaks
            .indices
            .windows(2)
            .map(|w| (w[1] - w[0]) as f64 / fs)
            .collect();
        Self { rr }
    }

    pub fn len(&self) -> usize {
        self.rr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rr.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_time_axis() {
        let err = Signal::new(vec![1.0, 2.0], vec![0.0], 100.0).unwrap_err();
        assert_eq!(err, CardioError::LengthMismatch { samples: 2, time: 1 });
    }

    #[test]
    fn rejects_decreasing_time_axis() {
        let err = Signal::new(vec![1.0, 2.0, 3.0], vec![0.0, 0.2, 0.1], 10.0).unwrap_err();
        assert!(matches!(err, CardioError::InvalidParameter(_)));
    }

    #[test]
    fn accepts_repeated_timestamps() {
        assert!(Signal::new(vec![1.0, 2.0, 3.0], vec![0.0, 0.1, 0.1], 10.0).is_ok());
    }

    #[test]
    fn slice_time_is_inclusive() {
        let sig = Signal::uniform((0..10).map(f64::from).collect(), 10.0).unwrap();
        let window = sig.slice_time(0.2, 0.5);
        assert_eq!(window.samples(), &[2.0, 3.0, 4.0, 5.0]);
        assert_eq!(window.time().len(), 4);
    }

    #[test]
    fn slice_time_outside_range_is_empty() {
        let sig = Signal::uniform(vec![1.0; 5], 10.0).unwrap();
        assert!(sig.slice_time(3.0, 4.0).is_empty());
        assert!(sig.slice_time(0.4, 0.1).is_empty());
    }

    #[test]
    fn rr_from_peaks_uses_sampling_rate() {
        let peaks = PeakSet::from_indices(vec![300, 100, 500]);
        let rr = RRIntervals::from_peaks(&peaks, 100.0);
        assert_eq!(rr.rr, vec![2.0, 2.0]);
    }

    #[test]
    fn rr_empty_with_single_peak() {
        let rr = RRIntervals::from_peaks(&PeakSet::from_indices(vec![42]), 250.0);
        assert!(rr.is_empty());
    }
}
