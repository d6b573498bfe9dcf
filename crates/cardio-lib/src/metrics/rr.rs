use crate::signal::RRIntervals;
use serde::{Deserialize, Serialize};

/// Beat statistics over an RR series. Every field is `None` when there are no
/// intervals, so callers never mistake an empty series for a real reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrStats {
    pub mean_rr_s: Option<f64>,
    pub std_rr_s: Option<f64>,
    pub count_beats: Option<usize>,
    pub heart_rate_bpm: Option<f64>,
}

impl RrStats {
    pub const UNDEFINED: RrStats = RrStats {
        mean_rr_s: None,
        std_rr_s: None,
        count_beats: None,
        heart_rate_bpm: None,
    };

    pub fn is_defined(&self) -> bool {
        self.mean_rr_s.is_some()
    }
}

pub fn rr_stats(rr: &RRIntervals) -> RrStats {
    let n = rr.rr.len();
    if n == 0 {
        return RrStats::UNDEFINED;
    }
    let mean = rr.rr.iter().sum::<f64>() / n as f64;
    // population deviation
    let std = (rr.rr.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64).sqrt();
    RrStats {
        mean_rr_s: Some(mean),
        std_rr_s: Some(std),
        count_beats: Some(n + 1),
        heart_rate_bpm: Some(60.0 / mean),
    }
}
