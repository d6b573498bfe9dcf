//! Interpolation backends used by the envelope and trend extractors.
//!
//! Call sites only see [`Interpolator`]; swapping the numerical backend does
//! not touch them.

use crate::error::{CardioError, Result};

/// A fitted curve that can be evaluated anywhere on the real line.
pub trait Interpolator {
    fn evaluate(&self, x: f64) -> f64;

    fn evaluate_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.evaluate(x)).collect()
    }
}

fn check_knots(xs: &[f64], ys: &[f64], min_points: usize) -> Result<()> {
    if xs.len() != ys.len() {
        return Err(CardioError::LengthMismatch {
            samples: ys.len(),
            time: xs.len(),
        });
    }
    if xs.len() < min_points {
        return Err(CardioError::InvalidParameter(format!(
            "need at least {min_points} points, got {}",
            xs.len()
        )));
    }
    if let Some(pos) = xs.windows(2).position(|w| w[1] <= w[0]) {
        return Err(CardioError::InvalidParameter(format!(
            "abscissae must be strictly increasing (violated at {})",
            pos + 1
        )));
    }
    Ok(())
}

/// Index `i` of the segment `[xs[i], xs[i + 1]]` used for `x`; the end
/// segments extend outwards.
fn segment(xs: &[f64], x: f64) -> usize {
    let last = xs.len().saturating_sub(2);
    xs.partition_point(|&k| k <= x).saturating_sub(1).min(last)
}

/// Piecewise-linear interpolation with linear extrapolation past both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearInterpolator {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl LinearInterpolator {
    /// A single knot gives a constant curve.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self> {
        check_knots(&xs, &ys, 1)?;
        Ok(Self { xs, ys })
    }
}

impl Interpolator for LinearInterpolator {
    fn evaluate(&self, x: f64) -> f64 {
        if self.xs.len() == 1 {
            return self.ys[0];
        }
        let i = segment(&self.xs, x);
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

/// Cubic smoothing spline (Reinsch).
///
/// Minimises the integrated squared second derivative subject to the
/// residual sum of squares staying within `smoothing`. `smoothing = 0`
/// interpolates; large values approach the least-squares line.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingSpline {
    xs: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

impl SmoothingSpline {
    /// Cubic degree needs four knots.
    pub const MIN_POINTS: usize = 4;
    const MAX_ITERATIONS: usize = 200;

    pub fn fit(xs: &[f64], ys: &[f64], smoothing: f64) -> Result<Self> {
        check_knots(xs, ys, Self::MIN_POINTS)?;
        if !(smoothing.is_finite() && smoothing >= 0.0) {
            return Err(CardioError::InvalidParameter(format!(
                "smoothing factor must be finite and >= 0, got {smoothing}"
            )));
        }

        let n = xs.len();
        let s = smoothing;
        // Work arrays are addressed from -1 to n, stored with an offset of one.
        let at = |i: usize| i + 1;
        let mut r = vec![0.0; n + 2];
        let mut r1 = vec![0.0; n + 2];
        let mut r2 = vec![0.0; n + 2];
        let mut t = vec![0.0; n + 2];
        let mut t1 = vec![0.0; n + 2];
        let mut u = vec![0.0; n + 2];
        let mut v = vec![0.0; n + 2];
        let mut a = vec![0.0; n];
        let mut b = vec![0.0; n];
        let mut c = vec![0.0; n];
        let mut d = vec![0.0; n];

        let (m1, m2) = (1, n - 2);
        let mut h = xs[1] - xs[0];
        let mut f = (ys[1] - ys[0]) / h;
        for i in m1..=m2 {
            let g = h;
            h = xs[i + 1] - xs[i];
            let e = f;
            f = (ys[i + 1] - ys[i]) / h;
            a[i] = f - e;
            t[at(i)] = 2.0 * (g + h) / 3.0;
            t1[at(i)] = h / 3.0;
            r2[at(i)] = 1.0 / g;
            r[at(i)] = 1.0 / h;
            r1[at(i)] = -1.0 / g - 1.0 / h;
        }
        for i in m1..=m2 {
            b[i] = r[at(i)].powi(2) + r1[at(i)].powi(2) + r2[at(i)].powi(2);
            c[i] = r[at(i)] * r1[at(i) + 1] + r1[at(i)] * r2[at(i) + 1];
            d[i] = r[at(i)] * r2[at(i) + 2];
        }

        let mut p = 0.0;
        let mut f2 = -s;
        for _ in 0..Self::MAX_ITERATIONS {
            // factorise the banded system for the current p
            let (mut f, mut g, mut h) = (0.0, 0.0, 0.0);
            for i in m1..=m2 {
                r1[at(i) - 1] = f * r[at(i) - 1];
                r2[at(i) - 2] = g * r[at(i) - 2];
                r[at(i)] = 1.0 / (p * b[i] + t[at(i)] - f * r1[at(i) - 1] - g * r2[at(i) - 2]);
                u[at(i)] = a[i] - r1[at(i) - 1] * u[at(i) - 1] - r2[at(i) - 2] * u[at(i) - 2];
                f = p * c[i] + t1[at(i)] - h * r1[at(i) - 1];
                g = h;
                h = d[i] * p;
            }
            for i in (m1..=m2).rev() {
                u[at(i)] = r[at(i)] * u[at(i)] - r1[at(i)] * u[at(i) + 1] - r2[at(i)] * u[at(i) + 2];
            }

            let mut e = 0.0;
            let mut h = 0.0;
            for i in 0..=m2 {
                let g = h;
                h = (u[at(i) + 1] - u[at(i)]) / (xs[i + 1] - xs[i]);
                v[at(i)] = h - g;
                e += v[at(i)] * (h - g);
            }
            let g = -h;
            v[at(n - 1)] = g;
            e -= g * h;

            let previous = f2;
            f2 = e * p * p;
            if f2 >= s || f2 <= previous {
                break;
            }

            // Newton step on p
            let mut f = 0.0;
            let mut h = (v[at(m1)] - v[at(0)]) / (xs[m1] - xs[0]);
            for i in m1..=m2 {
                let g = h;
                h = (v[at(i) + 1] - v[at(i)]) / (xs[i + 1] - xs[i]);
                let g = h - g - r1[at(i) - 1] * r[at(i) - 1] - r2[at(i) - 2] * r[at(i) - 2];
                f += g * r[at(i)] * g;
                r[at(i)] = g;
            }
            let h = e - p * f;
            if h <= 0.0 {
                break;
            }
            p += (s - f2) / (((s / e).sqrt() + p) * h);
        }

        for i in 0..n {
            a[i] = ys[i] - p * v[at(i)];
            c[i] = u[at(i)];
        }
        for i in 0..=m2 {
            let h = xs[i + 1] - xs[i];
            d[i] = (c[i + 1] - c[i]) / (3.0 * h);
            b[i] = (a[i + 1] - a[i]) / h - (h * d[i] + c[i]) * h;
        }

        Ok(Self {
            xs: xs.to_vec(),
            a,
            b,
            c,
            d,
        })
    }
}

impl Interpolator for SmoothingSpline {
    fn evaluate(&self, x: f64) -> f64 {
        let i = segment(&self.xs, x);
        let h = x - self.xs[i];
        self.a[i] + h * (self.b[i] + h * (self.c[i] + h * self.d[i]))
    }
}
