//! Fixed-weight projections between layers.
//!
//! A projection turns the sending layer's activities into excitatory inputs
//! for the receiving layer. Weights are drawn once at construction and never
//! learn; this is the minimal driver needed to run multi-layer scenarios.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{LeabraError, Result};
use crate::layer::{ConnectionId, Layer};

/// Connectivity between sending and receiving units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Pattern {
    /// Unit `i` sends only to unit `i`. Both layers must have the same size.
    OneToOne,
    /// Every sending unit reaches every receiving unit.
    #[default]
    Full,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct ProjectionSpec {
    pub pattern: Pattern,
    /// Mean initial weight.
    pub rnd_mean: f64,
    /// Half-width of the uniform spread around `rnd_mean`.
    pub rnd_var: f64,
    /// Absolute net-input scaling.
    pub wt_scale_abs: f64,
    /// Relative scaling among the projections into one layer.
    pub wt_scale_rel: f64,
    pub seed: u64,
}

impl Default for ProjectionSpec {
    fn default() -> Self {
        Self {
            pattern: Pattern::Full,
            rnd_mean: 1.0,
            rnd_var: 0.0,
            wt_scale_abs: 1.0,
            wt_scale_rel: 1.0,
            seed: 1,
        }
    }
}

/// Net-input contribution assumed from the sender beyond its expected count.
const SEM_EXTRA: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct Projection {
    id: ConnectionId,
    spec: ProjectionSpec,
    n_src: usize,
    n_dst: usize,
    /// Receiver-major weights: `n_dst` rows of `links_per_dst()` entries.
    weights: Vec<f64>,
    /// Effective relative scale; `wt_scale_rel` normalized by the caller
    /// across all projections into the receiver.
    pub wt_scale_rel_eff: f64,
}

impl Projection {
    /// Connect `src` to `dst` and record the link in both layers.
    pub fn connect(
        id: ConnectionId,
        src: &mut Layer,
        dst: &mut Layer,
        spec: ProjectionSpec,
    ) -> Result<Self> {
        let (n_src, n_dst) = (src.len(), dst.len());
        if spec.pattern == Pattern::OneToOne && n_src != n_dst {
            return Err(LeabraError::LengthMismatch {
                expected: n_dst,
                actual: n_src,
            });
        }
        if !spec.rnd_mean.is_finite() || !spec.rnd_var.is_finite() || spec.rnd_var < 0.0 {
            return Err(LeabraError::Config(
                "projection weights need a finite mean and a non-negative spread".to_string(),
            ));
        }

        let links = match spec.pattern {
            Pattern::OneToOne => n_dst,
            Pattern::Full => n_dst * n_src,
        };
        let mut rng = WeightRng::new(spec.seed);
        let weights = (0..links)
            .map(|_| {
                if spec.rnd_var == 0.0 {
                    spec.rnd_mean
                } else {
                    rng.uniform(spec.rnd_mean - spec.rnd_var, spec.rnd_mean + spec.rnd_var)
                }
            })
            .collect();

        src.connect_outbound(id);
        dst.connect_inbound(id);

        Ok(Self {
            id,
            wt_scale_rel_eff: spec.wt_scale_rel,
            spec,
            n_src,
            n_dst,
            weights,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn spec(&self) -> &ProjectionSpec {
        &self.spec
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn links_per_dst(&self) -> usize {
        match self.spec.pattern {
            Pattern::OneToOne => 1,
            Pattern::Full => self.n_src,
        }
    }

    /// Scale applied to raw net input, from the sender's expected activity.
    pub fn netin_scale(&self, src: &Layer) -> f64 {
        let pre_size = self.n_src as f64;
        let n_links = self.links_per_dst() as f64;
        let pre_act_avg = src.avg_act_p_eff;
        let pre_act_n = (pre_act_avg * pre_size).round().max(1.0);

        let sc = if self.links_per_dst() == self.n_src {
            1.0 / pre_act_n
        } else {
            let r_max_act_n = n_links.min(pre_act_n);
            let r_avg_act_n = (pre_act_avg * n_links).round().max(1.0);
            let r_exp_act_n = r_max_act_n.min(r_avg_act_n + SEM_EXTRA);
            1.0 / r_exp_act_n
        };
        self.spec.wt_scale_abs * self.wt_scale_rel_eff * sc
    }

    /// Excitatory input each receiving unit gets from `activities`.
    pub fn net_inputs(&self, src: &Layer) -> Vec<f64> {
        let scale = self.netin_scale(src);
        let acts = src.activities();
        match self.spec.pattern {
            Pattern::OneToOne => self
                .weights
                .iter()
                .zip(&acts)
                .map(|(w, a)| scale * (w * a))
                .collect(),
            Pattern::Full => self
                .weights
                .chunks(self.n_src.max(1))
                .take(self.n_dst)
                .map(|row| scale * row.iter().zip(&acts).map(|(w, a)| w * a).sum::<f64>())
                .collect(),
        }
    }

    /// Send this cycle's input from `src` into `dst`.
    pub fn cycle(&self, src: &Layer, dst: &mut Layer) -> Result<()> {
        if src.len() != self.n_src || dst.len() != self.n_dst {
            return Err(LeabraError::LengthMismatch {
                expected: self.n_src,
                actual: src.len(),
            });
        }
        dst.add_excitatory(&self.net_inputs(src))
    }
}

/// xorshift64* stream for initial weights. Not cryptographic.
#[derive(Debug, Clone)]
struct WeightRng {
    state: u64,
}

impl WeightRng {
    fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform in `[low, high)` from the top 53 bits.
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        let unit = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        low + (high - low) * unit
    }
}
