use crate::{
    error::{CardioError, Result},
    interp::{Interpolator, SmoothingSpline},
    signal::Signal,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Trend extraction strategy and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum TrendMethod {
    /// Centered moving average over a mirror-padded signal.
    Rolling { window_size: usize },
    /// Cubic smoothing spline through `(time, signal)`.
    Spline { smoothing: f64 },
    /// Equal-weight average of the two above.
    Combined { window_size: usize, smoothing: f64 },
}

impl TrendMethod {
    pub const DEFAULT_WINDOW: usize = 1001;
    pub const DEFAULT_SMOOTHING: f64 = 1e7;

    pub fn name(&self) -> &'static str {
        match self {
            TrendMethod::Rolling { .. } => "rolling",
            TrendMethod::Spline { .. } => "spline",
            TrendMethod::Combined { .. } => "combined",
        }
    }
}

impl Default for TrendMethod {
    fn default() -> Self {
        TrendMethod::Rolling {
            window_size: Self::DEFAULT_WINDOW,
        }
    }
}

impl FromStr for TrendMethod {
    type Err = CardioError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rolling" => Ok(TrendMethod::Rolling {
                window_size: Self::DEFAULT_WINDOW,
            }),
            "spline" => Ok(TrendMethod::Spline {
                smoothing: Self::DEFAULT_SMOOTHING,
            }),
            "combined" => Ok(TrendMethod::Combined {
                window_size: Self::DEFAULT_WINDOW,
                smoothing: Self::DEFAULT_SMOOTHING,
            }),
            other => Err(CardioError::InvalidMethod {
                method: other.to_string(),
            }),
        }
    }
}

/// Centered moving average. Even windows grow by one so the window stays
/// centered; both edges are mirror-padded by `window_size / 2` samples, so the
/// output has the input's length and no undefined values.
pub fn rolling_mean_trend(samples: &[f64], window_size: usize) -> Result<Vec<f64>> {
    if window_size == 0 {
        return Err(CardioError::InvalidParameter(
            "window size must be positive".into(),
        ));
    }
    let n = samples.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let win = window_size | 1;
    let half = win / 2;
    let padded = |j: usize| samples[reflect(j as isize - half as isize, n)];

    let mut out = Vec::with_capacity(n);
    let mut acc: f64 = (0..win).map(padded).sum();
    out.push(acc / win as f64);
    for i in 1..n {
        acc += padded(i + win - 1) - padded(i - 1);
        out.push(acc / win as f64);
    }
    Ok(out)
}

/// Mirror index without repeating the edge sample: `[c b | a b c d | c b]`.
fn reflect(k: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = k.rem_euclid(period);
    if m >= n as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}

/// Smoothing spline evaluated on the signal's own time axis.
/// The time axis must be strictly increasing.
pub fn spline_trend(signal: &Signal, smoothing: f64) -> Result<Vec<f64>> {
    let spline = SmoothingSpline::fit(signal.time(), signal.samples(), smoothing)?;
    Ok(spline.evaluate_many(signal.time()))
}

pub fn combined_trend(signal: &Signal, window_size: usize, smoothing: f64) -> Result<Vec<f64>> {
    let rolling = rolling_mean_trend(signal.samples(), window_size)?;
    let spline = spline_trend(signal, smoothing)?;
    Ok(rolling
        .iter()
        .zip(&spline)
        .map(|(r, s)| 0.5 * r + 0.5 * s)
        .collect())
}

pub fn extract_trend(signal: &Signal, method: &TrendMethod) -> Result<Vec<f64>> {
    debug!("extracting {} trend over {} samples", method.name(), signal.len());
    match *method {
        TrendMethod::Rolling { window_size } => rolling_mean_trend(signal.samples(), window_size),
        TrendMethod::Spline { smoothing } => spline_trend(signal, smoothing),
        TrendMethod::Combined {
            window_size,
            smoothing,
        } => combined_trend(signal, window_size, smoothing),
    }
}

/// Keeps the most recently extracted trend of one signal.
///
/// Nothing is invalidated automatically: extract again after changing
/// parameters.
pub struct TrendExtractor<'a> {
    signal: &'a Signal,
    latest: Option<(TrendMethod, Vec<f64>)>,
}

impl<'a> TrendExtractor<'a> {
    pub fn new(signal: &'a Signal) -> Self {
        Self {
            signal,
            latest: None,
        }
    }

    pub fn extract(&mut self, method: &TrendMethod) -> Result<&[f64]> {
        let trend = extract_trend(self.signal, method)?;
        let (_, stored) = self.latest.insert((*method, trend));
        Ok(stored.as_slice())
    }

    pub fn latest(&self) -> Option<&[f64]> {
        self.latest.as_ref().map(|(_, trend)| trend.as_slice())
    }

    pub fn latest_method(&self) -> Option<&TrendMethod> {
        self.latest.as_ref().map(|(method, _)| method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(diff <= tol, "expected {expected}, got {actual} (diff {diff})");
    }

    fn noisy_ramp(n: usize, fs: f64) -> Signal {
        let samples = (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                0.5 * t + (t * 9.0).sin() * 0.3
            })
            .collect();
        Signal::uniform(samples, fs).unwrap()
    }

    #[test]
    fn rolling_keeps_length_for_any_window() {
        let samples: Vec<f64> = (0..37).map(|i| (i as f64).sqrt()).collect();
        for window in [1, 2, 3, 10, 11, 36, 37, 100, 1001] {
            let trend = rolling_mean_trend(&samples, window).unwrap();
            assert_eq!(trend.len(), samples.len(), "window {window}");
            assert!(trend.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn even_window_is_bumped_to_odd() {
        let samples: Vec<f64> = (0..50).map(|i| ((i * 7) % 11) as f64).collect();
        assert_eq!(
            rolling_mean_trend(&samples, 4).unwrap(),
            rolling_mean_trend(&samples, 5).unwrap()
        );
        assert_ne!(
            rolling_mean_trend(&samples, 4).unwrap(),
            rolling_mean_trend(&samples, 3).unwrap()
        );
    }

    #[test]
    fn mirror_padding_by_hand() {
        // padded: [2, 1, 2, 3, 2]
        let trend = rolling_mean_trend(&[1.0, 2.0, 3.0], 3).unwrap();
        assert_close(trend[0], 5.0 / 3.0, 1e-12);
        assert_close(trend[1], 2.0, 1e-12);
        assert_close(trend[2], 7.0 / 3.0, 1e-12);
    }

    #[test]
    fn reflect_wraps_for_wide_pads() {
        let idx: Vec<usize> = (-4..7).map(|k| reflect(k, 3)).collect();
        assert_eq!(idx, vec![0, 1, 2, 1, 0, 1, 2, 1, 0, 1, 2]);
        assert_eq!(reflect(-5, 1), 0);
    }

    #[test]
    fn rolling_follows_ramp_away_from_edges() {
        let samples: Vec<f64> = (0..20).map(f64::from).collect();
        let trend = rolling_mean_trend(&samples, 5).unwrap();
        for i in 2..18 {
            assert_close(trend[i], i as f64, 1e-9);
        }
    }

    #[test]
    fn rolling_rejects_zero_window() {
        assert!(matches!(
            rolling_mean_trend(&[1.0], 0),
            Err(CardioError::InvalidParameter(_))
        ));
        assert!(rolling_mean_trend(&[], 5).unwrap().is_empty());
    }

    #[test]
    fn spline_trend_is_smoother_than_signal() {
        let signal = noisy_ramp(400, 100.0);
        let trend = spline_trend(&signal, 5.0).unwrap();
        assert_eq!(trend.len(), signal.len());
        let roughness = |v: &[f64]| -> f64 {
            v.windows(3)
                .map(|w| (w[2] - 2.0 * w[1] + w[0]).abs())
                .sum()
        };
        assert!(roughness(&trend) < roughness(signal.samples()));
    }

    #[test]
    fn spline_rejects_repeated_timestamps() {
        let signal = Signal::new(
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![0.0, 0.1, 0.1, 0.2, 0.3],
            10.0,
        )
        .unwrap();
        assert!(matches!(
            spline_trend(&signal, 1.0),
            Err(CardioError::InvalidParameter(_))
        ));
    }

    #[test]
    fn combined_is_average_of_parts() {
        let signal = noisy_ramp(300, 50.0);
        let rolling = rolling_mean_trend(signal.samples(), 31).unwrap();
        let spline = spline_trend(&signal, 2.0).unwrap();
        let combined = combined_trend(&signal, 31, 2.0).unwrap();
        for i in 0..signal.len() {
            assert_close(combined[i], 0.5 * (rolling[i] + spline[i]), 1e-12);
        }
    }

    #[test]
    fn extractor_keeps_latest_trend() {
        let signal = noisy_ramp(120, 20.0);
        let mut extractor = TrendExtractor::new(&signal);
        assert!(extractor.latest().is_none());
        let rolling = extractor
            .extract(&TrendMethod::Rolling { window_size: 9 })
            .unwrap()
            .to_vec();
        assert_eq!(extractor.latest(), Some(rolling.as_slice()));
        extractor.extract(&"spline".parse().unwrap()).unwrap();
        assert_eq!(extractor.latest_method().map(|m| m.name()), Some("spline"));
        assert!("loess".parse::<TrendMethod>().is_err());
    }
}
