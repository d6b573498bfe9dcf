//! Smoothed Gaussian perturbations for RR intervals, beat amplitudes and
//! trends.
//!
//! Noise is drawn sample by sample and then low-pass filtered with a Gaussian
//! kernel, so perturbations drift gradually instead of jumping between
//! neighbouring beats.

use crate::error::{CardioError, Result};
use log::debug;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Shortest RR interval a perturbation may produce (seconds).
pub const MIN_RR_S: f64 = 0.3;
/// Smallest beat amplitude a perturbation may produce.
pub const MIN_AMPLITUDE: f64 = 0.1;

/// Standard deviation and kernel width (in samples) of one perturbation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Perturbation {
    pub std: f64,
    pub smoothing: f64,
}

/// Perturbation strengths for every synthesis input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub rr: Perturbation,
    pub amplitude: Perturbation,
    pub trend: Perturbation,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            rr: Perturbation {
                std: 0.02,
                smoothing: 3.0,
            },
            amplitude: Perturbation {
                std: 0.1,
                smoothing: 3.0,
            },
            trend: Perturbation {
                std: 0.05,
                smoothing: 10.0,
            },
        }
    }
}

pub struct NoiseModel {
    rng: StdRng,
}

impl NoiseModel {
    /// Seeded models replay the same draws; `None` seeds from entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// `len` zero-mean Gaussian draws with deviation `std`, smoothed by a
    /// Gaussian kernel of width `sigma` samples.
    pub fn smoothed_noise(&mut self, len: usize, std: f64, sigma: f64) -> Result<Vec<f64>> {
        if !(std.is_finite() && std >= 0.0) {
            return Err(CardioError::InvalidParameter(format!(
                "noise std must be finite and non-negative, got {std}"
            )));
        }
        let normal = Normal::new(0.0, std).map_err(|e| {
            CardioError::InvalidParameter(format!("noise std {std}: {e}"))
        })?;
        let raw: Vec<f64> = (0..len).map(|_| normal.sample(&mut self.rng)).collect();
        Ok(gaussian_filter(&raw, sigma))
    }

    /// Additive perturbation, floored at [`MIN_RR_S`].
    pub fn perturb_intervals(&mut self, rr: &[f64], std: f64, smoothing: f64) -> Result<Vec<f64>> {
        let noise = self.smoothed_noise(rr.len(), std, smoothing)?;
        let out: Vec<f64> = rr
            .iter()
            .zip(&noise)
            .map(|(r, n)| (r + n).max(MIN_RR_S))
            .collect();
        debug!("perturbed {} RR intervals (std {std})", out.len());
        Ok(out)
    }

    /// Multiplicative perturbation `amp * (1 + noise)`, floored at
    /// [`MIN_AMPLITUDE`].
    pub fn perturb_amplitudes(
        &mut self,
        amplitudes: &[f64],
        std: f64,
        smoothing: f64,
    ) -> Result<Vec<f64>> {
        let noise = self.smoothed_noise(amplitudes.len(), std, smoothing)?;
        Ok(amplitudes
            .iter()
            .zip(&noise)
            .map(|(a, n)| (a * (1.0 + n)).max(MIN_AMPLITUDE))
            .collect())
    }

    /// Additive perturbation without clipping.
    pub fn perturb_trend(&mut self, trend: &[f64], std: f64, smoothing: f64) -> Result<Vec<f64>> {
        let noise = self.smoothed_noise(trend.len(), std, smoothing)?;
        Ok(trend.iter().zip(&noise).map(|(t, n)| t + n).collect())
    }
}

/// Normalised Gaussian kernel truncated at four deviations.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma + 0.5) as usize;
    let weights: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-0.5 * x * x / (sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Convolve with [`gaussian_kernel`], mirroring the edges with the edge sample
/// repeated: `[b a | a b c d | d c]`. Non-positive `sigma` leaves the data
/// unchanged.
pub fn gaussian_filter(data: &[f64], sigma: f64) -> Vec<f64> {
    if data.is_empty() || sigma.is_nan() || sigma <= 0.0 {
        return data.to_vec();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let n = data.len() as isize;
    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * data[symmetric(i + k as isize - radius, n)])
                .sum()
        })
        .collect()
}

fn symmetric(k: isize, n: isize) -> usize {
    let m = k.rem_euclid(2 * n);
    if m >= n {
        (2 * n - 1 - m) as usize
    } else {
        m as usize
    }
}
