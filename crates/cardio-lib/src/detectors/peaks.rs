use crate::{
    metrics::rr::{rr_stats, RrStats},
    signal::{PeakSet, RRIntervals, Signal},
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Parameters of the spacing + prominence peak search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// Minimum distance between accepted peaks (seconds).
    pub min_spacing_s: f64,
    /// Minimum rise-then-fall a local maximum needs to count as a peak.
    pub min_prominence: f64,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            min_spacing_s: 0.4,
            min_prominence: 3.0,
        }
    }
}

impl PeakConfig {
    /// Spacing converted to whole samples (truncated).
    pub fn spacing_samples(&self, fs: f64) -> usize {
        (self.min_spacing_s * fs).max(0.0) as usize
    }
}

/// Peaks of one signal together with the RR series they imply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDetection {
    pub peaks: PeakSet,
    pub rr: RRIntervals,
}

/// Peaks that fall inside a time window plus the matching slice of the signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakWindow {
    /// Indices into the full signal.
    pub peaks: Vec<usize>,
    pub time: Vec<f64>,
    pub samples: Vec<f64>,
}

impl PeakDetection {
    pub fn stats(&self) -> RrStats {
        rr_stats(&self.rr)
    }

    /// Restrict the detection to `[start, end]` seconds.
    pub fn window(&self, signal: &Signal, start: f64, end: f64) -> PeakWindow {
        let time = signal.time();
        let peaks = self
            .peaks
            .indices
            .iter()
            .copied()
            .filter(|&idx| idx < time.len() && time[idx] >= start && time[idx] <= end)
            .collect();
        let range = signal.index_range(start, end);
        PeakWindow {
            peaks,
            time: time[range.clone()].to_vec(),
            samples: signal.samples()[range].to_vec(),
        }
    }
}

/// Detect R-peaks with the given spacing (seconds) and prominence.
pub fn detect_r_peaks(signal: &Signal, min_spacing_s: f64, min_prominence: f64) -> PeakDetection {
    detect_r_peaks_with_config(
        signal,
        &PeakConfig {
            min_spacing_s,
            min_prominence,
        },
    )
}

pub fn detect_r_peaks_with_config(signal: &Signal, cfg: &PeakConfig) -> PeakDetection {
    if signal.is_empty() {
        warn!("peak detection on an empty signal");
        return PeakDetection {
            peaks: PeakSet::default(),
            rr: RRIntervals::default(),
        };
    }
    let fs = signal.sampling_rate();
    let distance = cfg.spacing_samples(fs);
    let peaks = PeakSet::from_indices(find_peaks(signal.samples(), distance, cfg.min_prominence));
    let rr = RRIntervals::from_peaks(&peaks, fs);
    debug!(
        "found {} peaks (distance {} samples, prominence >= {})",
        peaks.len(),
        distance,
        cfg.min_prominence
    );
    if peaks.len() < 2 {
        warn!("fewer than two peaks detected; RR series is empty");
    }
    PeakDetection { peaks, rr }
}

/// Local maxima at least `distance` samples apart with prominence of at least
/// `min_prominence`.
///
/// Plateaus report their middle sample and the first/last samples are never
/// peaks. Spacing conflicts are settled before prominence: the higher sample
/// suppresses its neighbours.
pub fn find_peaks(data: &[f64], distance: usize, min_prominence: f64) -> Vec<usize> {
    let mut peaks = local_maxima(data);
    if distance > 1 && peaks.len() > 1 {
        peaks = select_by_distance(data, &peaks, distance);
    }
    peaks
        .into_iter()
        .filter(|&p| prominence(data, p) >= min_prominence)
        .collect()
}

fn local_maxima(data: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if data.len() < 3 {
        return peaks;
    }
    let last = data.len() - 1;
    let mut i = 1;
    while i < last {
        if data[i - 1] < data[i] {
            let mut ahead = i + 1;
            while ahead < last && data[ahead] == data[i] {
                ahead += 1;
            }
            if data[ahead] < data[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

fn select_by_distance(data: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| data[peaks[a]].total_cmp(&data[peaks[b]]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// Height of `peak` above the higher of its two bases. Each base is the lowest
/// sample between the peak and the nearest strictly higher sample (or the edge).
fn prominence(data: &[f64], peak: usize) -> f64 {
    let height = data[peak];

    let mut left_min = height;
    let mut i = peak;
    loop {
        if data[i] > height {
            break;
        }
        left_min = left_min.min(data[i]);
        if i == 0 {
            break;
        }
        i -= 1;
    }

    let mut right_min = height;
    for &value in &data[peak..] {
        if value > height {
            break;
        }
        right_min = right_min.min(value);
    }

    height - left_min.max(right_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spike_train(len: usize, at: &[usize], height: f64) -> Vec<f64> {
        let mut data = vec![0.0; len];
        for &i in at {
            data[i] = height;
        }
        data
    }

    #[test]
    fn detects_evenly_spaced_spikes() {
        let data = spike_train(1000, &[100, 300, 500, 700], 5.0);
        let signal = Signal::uniform(data, 100.0).unwrap();
        let detection = detect_r_peaks(&signal, 1.0, 1.0);
        assert_eq!(detection.peaks.indices, vec![100, 300, 500, 700]);
        assert_eq!(detection.rr.rr, vec![2.0, 2.0, 2.0]);

        let stats = detection.stats();
        assert_eq!(stats.count_beats, Some(4));
        assert_eq!(stats.heart_rate_bpm, Some(30.0));
        assert_eq!(stats.mean_rr_s, Some(2.0));
    }

    #[test]
    fn rr_length_tracks_peak_count() {
        for spikes in [vec![], vec![50], vec![50, 150], vec![50, 150, 250, 350]] {
            let signal = Signal::uniform(spike_train(400, &spikes, 2.0), 100.0).unwrap();
            let detection = detect_r_peaks(&signal, 0.5, 1.0);
            assert_eq!(detection.peaks.len(), spikes.len());
            assert_eq!(detection.rr.len(), spikes.len().saturating_sub(1));
        }
    }

    #[test]
    fn higher_peak_wins_spacing_conflict() {
        let mut data = vec![0.0; 40];
        data[10] = 3.0;
        data[15] = 5.0;
        data[30] = 4.0;
        assert_eq!(find_peaks(&data, 10, 0.0), vec![15, 30]);
        assert_eq!(find_peaks(&data, 1, 0.0), vec![10, 15, 30]);
    }

    #[test]
    fn prominence_filters_shallow_bumps() {
        // the bump at 4 sits on the flank of the main peak
        let data = [0.0, 1.0, 2.0, 3.0, 3.5, 3.2, 6.0, 2.0, 0.0];
        assert_eq!(find_peaks(&data, 0, 0.0), vec![4, 6]);
        assert_eq!(find_peaks(&data, 0, 1.0), vec![6]);
        assert!((prominence(&data, 4) - 0.3).abs() < 1e-12);
        assert!((prominence(&data, 6) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn plateau_reports_middle_sample() {
        let data = [0.0, 1.0, 4.0, 4.0, 4.0, 4.0, 1.0, 0.0];
        assert_eq!(find_peaks(&data, 0, 0.0), vec![3]);
    }

    #[test]
    fn edges_are_not_peaks() {
        let data = [5.0, 1.0, 0.0, 1.0, 5.0];
        assert!(find_peaks(&data, 0, 0.0).is_empty());
    }

    #[test]
    fn empty_signal_degrades_gracefully() {
        let signal = Signal::uniform(Vec::new(), 200.0).unwrap();
        let detection = detect_r_peaks_with_config(&signal, &PeakConfig::default());
        assert!(detection.peaks.is_empty());
        assert!(detection.rr.is_empty());
        assert!(!detection.stats().is_defined());
    }

    #[test]
    fn window_query_filters_by_time() {
        let data = spike_train(1000, &[100, 300, 500, 700], 5.0);
        let signal = Signal::uniform(data, 100.0).unwrap();
        let detection = detect_r_peaks(&signal, 1.0, 1.0);

        let window = detection.window(&signal, 2.5, 5.0);
        assert_eq!(window.peaks, vec![300, 500]);
        assert_eq!(window.time.len(), 251);
        assert_eq!(window.samples.len(), 251);
        assert_eq!(detection.peaks.len(), 4);

        let empty = detection.window(&signal, 20.0, 30.0);
        assert!(empty.peaks.is_empty());
        assert!(empty.samples.is_empty());
    }
}
