//! Rate-code activation functions.
//!
//! `xx1` is the ideal `x / (x + 1)` firing-rate curve. The noisy variant is the
//! expectation of `xx1` under Gaussian membrane noise; computing that integral
//! on every call is too slow, so [`ActivationTable`] samples the convolution
//! once and answers queries by linear interpolation.
//!
//! The sampling grids, kernel and centered convolution match the reference
//! simulator sample for sample, so the grid construction below is spelled
//! out rather than using a generic linspace.

use tracing::debug;

/// Step between two samples of the table.
pub const RESOLUTION: f64 = 0.001;

/// Floor on the noise deviation so the kernel never degenerates.
const MIN_SD: f64 = 1.0e-6;

/// The `x / (x + 1)` activation function with gain `act_gain`.
#[inline]
pub fn xx1(act_gain: f64, v: f64) -> f64 {
    let x = act_gain * v.max(0.0);
    x / (x + 1.0)
}

/// Precomputed noisy `xx1` curve.
///
/// Immutable once built: it is a pure function of `(act_sd, act_gain)`, so two
/// builds with the same parameters are equal sample for sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationTable {
    act_sd: f64,
    act_gain: f64,
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl ActivationTable {
    pub fn build(act_sd: f64, act_gain: f64) -> Self {
        let ns_rng = (3.0 * act_sd).max(RESOLUTION);

        let kernel = gaussian_kernel(act_sd, ns_rng);

        let ext = arange(-2.0 * ns_rng, 1.0 + ns_rng + RESOLUTION, RESOLUTION);
        let ideal: Vec<f64> = ext.iter().map(|&v| xx1(act_gain, v)).collect();
        let conv = convolve_same(&ideal, &kernel);

        let xs = arange(-ns_rng, 1.0 + RESOLUTION, RESOLUTION);
        let lo = match (xs.first(), ext.first()) {
            (Some(&x0), Some(&e0)) => ((x0 - e0) / RESOLUTION).round().max(0.0) as usize,
            _ => 0,
        };
        // one table sample per domain sample, aligned on the nearest grid point
        let ys: Vec<f64> = xs
            .iter()
            .enumerate()
            .map(|(i, &x)| conv.get(lo + i).copied().unwrap_or_else(|| xx1(act_gain, x)))
            .collect();
        let n = xs.len();

        debug!(act_sd, act_gain, ns_rng, samples = n, "built noisy xx1 table");

        Self {
            act_sd,
            act_gain,
            xs,
            ys,
        }
    }

    pub fn act_sd(&self) -> f64 {
        self.act_sd
    }

    pub fn act_gain(&self) -> f64 {
        self.act_gain
    }

    /// Whether this table was built for the given parameters.
    pub fn matches(&self, act_sd: f64, act_gain: f64) -> bool {
        self.act_sd == act_sd && self.act_gain == act_gain
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Sampled membrane-potential offsets (relative to threshold).
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    /// Convolved activation at each sample.
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    /// Inclusive query domain `[min, max]`.
    pub fn domain(&self) -> (f64, f64) {
        match (self.xs.first(), self.xs.last()) {
            (Some(&lo), Some(&hi)) => (lo, hi),
            _ => (0.0, 0.0),
        }
    }

    /// Noisy activation at `v`.
    ///
    /// Below the domain the response is exactly zero; above it the table has
    /// no information and the exact `xx1` is returned.
    pub fn eval(&self, v: f64) -> f64 {
        let n = self.xs.len();
        if n < 2 {
            return xx1(self.act_gain, v);
        }
        let (lo, hi) = self.domain();
        if v < lo {
            return 0.0;
        }
        if hi < v {
            return xx1(self.act_gain, v);
        }

        let idx = self.xs.partition_point(|&x| x < v).clamp(1, n - 1);
        let (x_lo, x_hi) = (self.xs[idx - 1], self.xs[idx]);
        let (y_lo, y_hi) = (self.ys[idx - 1], self.ys[idx]);
        let slope = (y_hi - y_lo) / (x_hi - x_lo);
        slope * (v - x_lo) + y_lo
    }
}

/// Half-open grid `[start, stop)` sampled every `step`.
fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let len = ((stop - start) / step).ceil();
    if !(len > 0.0) {
        return Vec::new();
    }
    let len = len as usize;
    let second = start + step;
    let delta = second - start;

    let mut out = Vec::with_capacity(len);
    out.push(start);
    if len > 1 {
        out.push(second);
    }
    for i in 2..len {
        out.push(start + i as f64 * delta);
    }
    out
}

/// Zero-mean Gaussian over `[-ns_rng, ns_rng]`, normalized to sum to one.
fn gaussian_kernel(act_sd: f64, ns_rng: f64) -> Vec<f64> {
    let xs = arange(-ns_rng, ns_rng + RESOLUTION, RESOLUTION);
    let sd = act_sd.max(MIN_SD);
    let var = sd * sd;

    let mut kernel: Vec<f64> = xs.iter().map(|&x| (-(x * x) / var).exp()).collect();
    let total: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= total;
    }
    kernel
}

/// Discrete convolution keeping `signal.len()` samples centered on the full
/// result.
fn convolve_same(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let m = kernel.len();
    if n == 0 || m == 0 {
        return Vec::new();
    }
    let (long, short) = if n >= m { (signal, kernel) } else { (kernel, signal) };
    let len = long.len();
    let w = short.len();
    let left = w / 2;

    let mut out = Vec::with_capacity(len);
    for k in 0..len {
        let mut acc = 0.0;
        for j in 0..w {
            let i = k + j;
            if i < left || i - left >= len {
                continue;
            }
            acc += long[i - left] * short[w - 1 - j];
        }
        out.push(acc);
    }
    out
}
