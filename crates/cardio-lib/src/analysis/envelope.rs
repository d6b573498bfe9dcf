use crate::{
    cache::ResultCache,
    detectors::peaks::find_peaks,
    error::{CardioError, Result},
    interp::{Interpolator, LinearInterpolator},
    metrics::summary::{summarize, SeriesSummary},
    signal::Signal,
};
use log::debug;
use realfft::RealFftPlanner;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, str::FromStr};

/// Envelope extraction strategy and its parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum EnvelopeMethod {
    /// Magnitude of the analytic signal.
    #[default]
    Hilbert,
    /// Linear interpolation through local maxima / minima.
    Interp { distance: usize, prominence: f64 },
    /// Sliding-window maximum / minimum.
    MinMax { window_size: usize },
}

impl EnvelopeMethod {
    pub const INTERP_DEFAULT: EnvelopeMethod = EnvelopeMethod::Interp {
        distance: 20,
        prominence: 0.1,
    };
    pub const MINMAX_DEFAULT: EnvelopeMethod = EnvelopeMethod::MinMax { window_size: 200 };

    pub fn name(&self) -> &'static str {
        match self {
            EnvelopeMethod::Hilbert => "hilbert",
            EnvelopeMethod::Interp { .. } => "interp",
            EnvelopeMethod::MinMax { .. } => "minmax",
        }
    }
}

impl FromStr for EnvelopeMethod {
    type Err = CardioError;

    /// Method name with its default parameters.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hilbert" => Ok(EnvelopeMethod::Hilbert),
            "interp" => Ok(EnvelopeMethod::INTERP_DEFAULT),
            "minmax" => Ok(EnvelopeMethod::MINMAX_DEFAULT),
            other => Err(CardioError::InvalidMethod {
                method: other.to_string(),
            }),
        }
    }
}

/// Upper/lower bounding curves. The analytic-signal method has no lower curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub upper: Vec<f64>,
    pub lower: Option<Vec<f64>>,
}

impl Envelope {
    pub fn len(&self) -> usize {
        self.upper.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upper.is_empty()
    }

    /// The envelope itself, or `upper - lower` when both curves exist.
    pub fn amplitude(&self) -> Vec<f64> {
        match &self.lower {
            Some(lower) => self.upper.iter().zip(lower).map(|(u, l)| u - l).collect(),
            None => self.upper.clone(),
        }
    }
}

pub fn compute_envelope(samples: &[f64], method: &EnvelopeMethod) -> Result<Envelope> {
    debug!("computing {} envelope over {} samples", method.name(), samples.len());
    match *method {
        EnvelopeMethod::Hilbert => Ok(Envelope {
            upper: hilbert_envelope(samples)?,
            lower: None,
        }),
        EnvelopeMethod::Interp {
            distance,
            prominence,
        } => interpolated_envelope(samples, distance, prominence),
        EnvelopeMethod::MinMax { window_size } => minmax_envelope(samples, window_size),
    }
}

/// Instantaneous amplitude `|x + i·H{x}|`.
pub fn hilbert_envelope(samples: &[f64]) -> Result<Vec<f64>> {
    Ok(analytic_signal(samples)?
        .into_iter()
        .map(|z| z.norm())
        .collect())
}

/// Analytic signal built in the frequency domain: keep DC (and Nyquist for
/// even lengths), double positive frequencies, drop negative ones.
pub fn analytic_signal(samples: &[f64]) -> Result<Vec<Complex<f64>>> {
    let n = samples.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n);
    let mut input = samples.to_vec();
    let mut half = r2c.make_output_vec();
    r2c.process(&mut input, &mut half)
        .map_err(|e| CardioError::Fft(e.to_string()))?;

    let mut spectrum = vec![Complex::new(0.0, 0.0); n];
    let nyquist = if n % 2 == 0 { Some(n / 2) } else { None };
    for (k, value) in half.iter().enumerate() {
        spectrum[k] = if k == 0 || Some(k) == nyquist {
            *value
        } else {
            *value * 2.0
        };
    }

    let ifft = FftPlanner::<f64>::new().plan_fft_inverse(n);
    ifft.process(&mut spectrum);
    let scale = 1.0 / n as f64;
    Ok(spectrum.into_iter().map(|z| z * scale).collect())
}

/// Upper/lower curves through the local maxima/minima of the signal.
///
/// The first and last samples are always used as knots, so interpolation
/// never has to extrapolate inside the signal. Containment of the signal is
/// not guaranteed.
pub fn interpolated_envelope(samples: &[f64], distance: usize, prominence: f64) -> Result<Envelope> {
    let n = samples.len();
    if n == 0 {
        return Ok(Envelope {
            upper: Vec::new(),
            lower: Some(Vec::new()),
        });
    }
    let negated: Vec<f64> = samples.iter().map(|v| -v).collect();
    let maxima = anchor_edges(find_peaks(samples, distance, prominence), n);
    let minima = anchor_edges(find_peaks(&negated, distance, prominence), n);
    debug!("interp envelope: {} maxima, {} minima", maxima.len(), minima.len());

    let axis: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let through = |knots: &[usize]| -> Result<Vec<f64>> {
        let xs = knots.iter().map(|&i| i as f64).collect();
        let ys = knots.iter().map(|&i| samples[i]).collect();
        Ok(LinearInterpolator::new(xs, ys)?.evaluate_many(&axis))
    };
    Ok(Envelope {
        upper: through(&maxima)?,
        lower: Some(through(&minima)?),
    })
}

fn anchor_edges(mut knots: Vec<usize>, len: usize) -> Vec<usize> {
    let last = len - 1;
    if knots.first() != Some(&0) {
        knots.insert(0, 0);
    }
    if knots.last() != Some(&last) {
        knots.push(last);
    }
    knots
}

/// Sliding max/min over `window_size` samples around each index, clipped at
/// the edges.
///
/// Sample `i` sees `[i - window_size / 2, i - window_size / 2 + window_size)`,
/// so `lower[i] <= samples[i] <= upper[i]` always holds.
pub fn minmax_envelope(samples: &[f64], window_size: usize) -> Result<Envelope> {
    if window_size == 0 {
        return Err(CardioError::InvalidParameter(
            "window size must be positive".into(),
        ));
    }
    let n = samples.len();
    let half = window_size / 2;
    let mut upper = Vec::with_capacity(n);
    let mut lower = Vec::with_capacity(n);
    let mut max_q: VecDeque<usize> = VecDeque::new();
    let mut min_q: VecDeque<usize> = VecDeque::new();
    let mut next = 0;

    for i in 0..n {
        let start = i.saturating_sub(half);
        let end = (i + window_size - half).min(n);
        while next < end {
            let value = samples[next];
            while max_q.back().is_some_and(|&j| samples[j] <= value) {
                max_q.pop_back();
            }
            max_q.push_back(next);
            while min_q.back().is_some_and(|&j| samples[j] >= value) {
                min_q.pop_back();
            }
            min_q.push_back(next);
            next += 1;
        }
        while max_q.front().is_some_and(|&j| j < start) {
            max_q.pop_front();
        }
        while min_q.front().is_some_and(|&j| j < start) {
            min_q.pop_front();
        }
        // the window always contains i, so neither queue is empty
        upper.push(max_q.front().map_or(samples[i], |&j| samples[j]));
        lower.push(min_q.front().map_or(samples[i], |&j| samples[j]));
    }

    Ok(Envelope {
        upper,
        lower: Some(lower),
    })
}

/// Envelope extraction over one signal with per-request memoisation.
///
/// Repeating a request with identical parameters returns the cached result.
pub struct AmplitudeAnalyzer<'a> {
    signal: &'a Signal,
    cache: ResultCache<EnvelopeMethod, Envelope>,
}

impl<'a> AmplitudeAnalyzer<'a> {
    pub fn new(signal: &'a Signal) -> Self {
        Self {
            signal,
            cache: ResultCache::new(),
        }
    }

    pub fn envelope(&mut self, method: &EnvelopeMethod) -> Result<&Envelope> {
        let signal = self.signal;
        self.cache
            .get_or_try_insert_with(*method, || compute_envelope(signal.samples(), method))
    }

    /// Mean/std/min/max of the amplitude series; `None` for an empty signal.
    pub fn analyze_amplitude(&mut self, method: &EnvelopeMethod) -> Result<Option<SeriesSummary>> {
        let envelope = self.envelope(method)?;
        Ok(summarize(&envelope.amplitude()))
    }

    /// Same as [`analyze_amplitude`](Self::analyze_amplitude) with a method
    /// name and default parameters.
    pub fn analyze_amplitude_named(&mut self, method: &str) -> Result<Option<SeriesSummary>> {
        let method: EnvelopeMethod = method.parse()?;
        self.analyze_amplitude(&method)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
