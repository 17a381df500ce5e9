use core::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::activation::{xx1, ActivationTable};
use crate::error::{LeabraError, Result};
use crate::observer::{TraceField, UnitTrace};
use crate::options::{require_finite, require_positive, OptionValue, Spec, SpecHandle};

/// Shared handle to the spec of a unit population.
pub type SharedUnitSpec = SpecHandle<UnitSpec>;

/// Role of the layer a unit belongs to. Only hidden units self-organize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Genre {
    Input,
    #[default]
    Hidden,
    Output,
}

/// Settling phase of a trial.
///
/// Units update the same way in both phases; the layer only recomputes
/// inhibition during the minus phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Phase {
    #[default]
    Minus,
    Plus,
}

impl FromStr for Phase {
    type Err = LeabraError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "minus" | "-" => Ok(Phase::Minus),
            "plus" | "+" => Ok(Phase::Plus),
            other => Err(LeabraError::Config(format!("unknown phase `{other}`"))),
        }
    }
}

/// How a unit's firing threshold is obtained each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ThresholdMode {
    /// `act_thr` as configured.
    #[default]
    Fixed,
    /// Logistic of the dopamine (D1/D2) and adenosine (A1/A2) receptor ratios:
    /// `logistic(c_act_thr - r_d1 + r_a1 + r_d2 - r_a2)`.
    Neuromodulated,
}

/// Parameters of a rate-coded Leabra unit.
///
/// One spec is normally shared by every unit of a population through a
/// [`SharedUnitSpec`]. Parameters should not change while a cycle is in
/// flight.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct UnitSpec {
    // time constants
    /// Net input integration time constant (net = g_e * g_bar_e).
    pub tau_net: f64,
    pub tau_v_m: f64,

    // input channels
    /// Leak conductance (constant).
    pub g_l: f64,
    pub g_bar_e: f64,
    pub g_bar_l: f64,
    pub g_bar_i: f64,

    // reversal potentials
    pub e_rev_e: f64,
    pub e_rev_l: f64,
    pub e_rev_i: f64,

    // activation function
    pub act_thr: f64,
    /// Baseline of the neuromodulated threshold; `logistic(0) = 0.5`.
    pub c_act_thr: f64,
    pub act_gain: f64,
    /// Use the noise-convolved activation function instead of plain `xx1`.
    pub noisy_act: bool,
    /// Standard deviation of the membrane noise.
    pub act_sd: f64,
    pub act_min: f64,
    pub act_max: f64,
    pub threshold_mode: ThresholdMode,

    // spiking
    pub spk_thr: f64,
    pub v_m_init: f64,
    /// Value `v_m` is reset to after crossing threshold.
    pub v_m_r: f64,
    pub v_m_min: f64,
    pub v_m_max: f64,

    // adaptation
    pub adapt_on: bool,
    pub dt_adapt: f64,
    /// Gain on `v_m` driving the adaptation current.
    pub v_m_gain: f64,
    /// Added to the adaptation current on each spike.
    pub spike_gain: f64,

    pub bias: f64,

    // running averages
    pub avg_init: f64,
    pub avg_ss_dt: f64,
    pub avg_s_dt: f64,
    pub avg_m_dt: f64,
    /// Long-term average rate, applied once per trial.
    pub avg_l_dt: f64,
    pub avg_l_init: f64,
    pub avg_l_min: f64,
    pub avg_l_gain: f64,
    pub avg_m_in_s: f64,
    pub avg_lrn_min: f64,
    pub avg_lrn_max: f64,

    // receptor ratios
    pub r_d1: f64,
    pub r_d2: f64,
    pub r_a1: f64,
    pub r_a2: f64,

    #[cfg_attr(feature = "serde", serde(skip))]
    table: TableCache,
}

/// Activation table built from the spec, plus the last rebuild made after
/// fields were edited in place.
#[derive(Debug, Default)]
struct TableCache {
    built: OnceLock<Arc<ActivationTable>>,
    rebuilt: Mutex<Option<Arc<ActivationTable>>>,
}

impl Clone for TableCache {
    fn clone(&self) -> Self {
        let built = OnceLock::new();
        if let Some(table) = self.built.get() {
            let _ = built.set(Arc::clone(table));
        }
        let rebuilt = self.rebuilt.lock().unwrap_or_else(PoisonError::into_inner).clone();
        Self {
            built,
            rebuilt: Mutex::new(rebuilt),
        }
    }
}

impl Default for UnitSpec {
    fn default() -> Self {
        Self {
            tau_net: 1.4,
            tau_v_m: 3.3,

            g_l: 1.0,
            g_bar_e: 1.0,
            g_bar_l: 0.1,
            g_bar_i: 1.0,

            e_rev_e: 1.0,
            e_rev_l: 0.3,
            e_rev_i: 0.25,

            act_thr: 0.5,
            c_act_thr: 0.0,
            act_gain: 100.0,
            noisy_act: true,
            act_sd: 0.01,
            act_min: 0.0,
            act_max: 0.95,
            threshold_mode: ThresholdMode::Fixed,

            spk_thr: 1.2,
            v_m_init: 0.4,
            v_m_r: 0.3,
            v_m_min: 0.0,
            v_m_max: 2.0,

            adapt_on: false,
            dt_adapt: 1.0 / 144.0,
            v_m_gain: 0.04,
            spike_gain: 0.00805,

            bias: 0.0,

            avg_init: 0.15,
            avg_ss_dt: 0.5,
            avg_s_dt: 0.5,
            avg_m_dt: 0.1,
            avg_l_dt: 0.1,
            avg_l_init: 0.4,
            avg_l_min: 0.2,
            avg_l_gain: 2.5,
            avg_m_in_s: 0.1,
            avg_lrn_min: 0.0001,
            avg_lrn_max: 0.5,

            r_d1: 0.0,
            r_d2: 0.0,
            r_a1: 0.0,
            r_a2: 0.0,

            table: TableCache::default(),
        }
    }
}

impl Spec for UnitSpec {
    const KIND: &'static str = "UnitSpec";

    const OPTION_NAMES: &'static [&'static str] = &[
        "tau_net",
        "tau_v_m",
        "g_l",
        "g_bar_e",
        "g_bar_l",
        "g_bar_i",
        "e_rev_e",
        "e_rev_l",
        "e_rev_i",
        "act_thr",
        "c_act_thr",
        "act_gain",
        "noisy_act",
        "act_sd",
        "act_min",
        "act_max",
        "neuromod_thr",
        "spk_thr",
        "v_m_init",
        "v_m_r",
        "v_m_min",
        "v_m_max",
        "adapt_on",
        "dt_adapt",
        "v_m_gain",
        "spike_gain",
        "bias",
        "avg_init",
        "avg_ss_dt",
        "avg_s_dt",
        "avg_m_dt",
        "avg_l_dt",
        "avg_l_init",
        "avg_l_min",
        "avg_l_gain",
        "avg_m_in_s",
        "avg_lrn_min",
        "avg_lrn_max",
        "r_d1",
        "r_d2",
        "r_a1",
        "r_a2",
    ];

    fn set_option(&mut self, name: &str, value: OptionValue) -> Result<()> {
        let slot = match name {
            "noisy_act" => {
                self.noisy_act = value.as_flag(name)?;
                return Ok(());
            }
            "adapt_on" => {
                self.adapt_on = value.as_flag(name)?;
                return Ok(());
            }
            "neuromod_thr" => {
                self.threshold_mode = if value.as_flag(name)? {
                    ThresholdMode::Neuromodulated
                } else {
                    ThresholdMode::Fixed
                };
                return Ok(());
            }
            _ => match self.number_slot(name) {
                Some(slot) => slot,
                None => {
                    return Err(LeabraError::UnknownOption {
                        spec: Self::KIND,
                        name: name.to_string(),
                    })
                }
            },
        };
        *slot = value.as_number(name)?;
        if matches!(name, "act_sd" | "act_gain") {
            self.invalidate_caches();
        }
        Ok(())
    }

    fn get_option(&self, name: &str) -> Option<OptionValue> {
        let v = match name {
            "tau_net" => self.tau_net,
            "tau_v_m" => self.tau_v_m,
            "g_l" => self.g_l,
            "g_bar_e" => self.g_bar_e,
            "g_bar_l" => self.g_bar_l,
            "g_bar_i" => self.g_bar_i,
            "e_rev_e" => self.e_rev_e,
            "e_rev_l" => self.e_rev_l,
            "e_rev_i" => self.e_rev_i,
            "act_thr" => self.act_thr,
            "c_act_thr" => self.c_act_thr,
            "act_gain" => self.act_gain,
            "noisy_act" => return Some(OptionValue::Flag(self.noisy_act)),
            "act_sd" => self.act_sd,
            "act_min" => self.act_min,
            "act_max" => self.act_max,
            "neuromod_thr" => {
                return Some(OptionValue::Flag(
                    self.threshold_mode == ThresholdMode::Neuromodulated,
                ))
            }
            "spk_thr" => self.spk_thr,
            "v_m_init" => self.v_m_init,
            "v_m_r" => self.v_m_r,
            "v_m_min" => self.v_m_min,
            "v_m_max" => self.v_m_max,
            "adapt_on" => return Some(OptionValue::Flag(self.adapt_on)),
            "dt_adapt" => self.dt_adapt,
            "v_m_gain" => self.v_m_gain,
            "spike_gain" => self.spike_gain,
            "bias" => self.bias,
            "avg_init" => self.avg_init,
            "avg_ss_dt" => self.avg_ss_dt,
            "avg_s_dt" => self.avg_s_dt,
            "avg_m_dt" => self.avg_m_dt,
            "avg_l_dt" => self.avg_l_dt,
            "avg_l_init" => self.avg_l_init,
            "avg_l_min" => self.avg_l_min,
            "avg_l_gain" => self.avg_l_gain,
            "avg_m_in_s" => self.avg_m_in_s,
            "avg_lrn_min" => self.avg_lrn_min,
            "avg_lrn_max" => self.avg_lrn_max,
            "r_d1" => self.r_d1,
            "r_d2" => self.r_d2,
            "r_a1" => self.r_a1,
            "r_a2" => self.r_a2,
            _ => return None,
        };
        Some(OptionValue::Number(v))
    }

    fn validate(&self) -> Result<()> {
        require_positive("tau_net", self.tau_net)?;
        require_positive("tau_v_m", self.tau_v_m)?;
        require_positive("act_gain", self.act_gain)?;
        if !self.act_sd.is_finite() || self.act_sd < 0.0 {
            return Err(LeabraError::InvalidOption {
                name: "act_sd",
                reason: "must be finite and >= 0",
            });
        }
        if self.act_thr == self.e_rev_e {
            return Err(LeabraError::InvalidOption {
                name: "act_thr",
                reason: "must differ from e_rev_e",
            });
        }
        if self.effective_act_thr() == self.e_rev_e {
            return Err(LeabraError::InvalidOption {
                name: "act_thr",
                reason: "modulated threshold must differ from e_rev_e",
            });
        }
        if self.avg_l_gain == self.avg_l_min {
            return Err(LeabraError::InvalidOption {
                name: "avg_l_gain",
                reason: "must differ from avg_l_min",
            });
        }
        for (name, value) in self.options() {
            if let OptionValue::Number(v) = value {
                require_finite(name, v)?;
            }
        }
        Ok(())
    }

    fn invalidate_caches(&mut self) {
        if self.table.built.get().is_some() {
            warn!("unit spec changed after its activation table was built; dropping the table");
        }
        self.table = TableCache::default();
    }
}

impl UnitSpec {
    fn number_slot(&mut self, name: &str) -> Option<&mut f64> {
        Some(match name {
            "tau_net" => &mut self.tau_net,
            "tau_v_m" => &mut self.tau_v_m,
            "g_l" => &mut self.g_l,
            "g_bar_e" => &mut self.g_bar_e,
            "g_bar_l" => &mut self.g_bar_l,
            "g_bar_i" => &mut self.g_bar_i,
            "e_rev_e" => &mut self.e_rev_e,
            "e_rev_l" => &mut self.e_rev_l,
            "e_rev_i" => &mut self.e_rev_i,
            "act_thr" => &mut self.act_thr,
            "c_act_thr" => &mut self.c_act_thr,
            "act_gain" => &mut self.act_gain,
            "act_sd" => &mut self.act_sd,
            "act_min" => &mut self.act_min,
            "act_max" => &mut self.act_max,
            "spk_thr" => &mut self.spk_thr,
            "v_m_init" => &mut self.v_m_init,
            "v_m_r" => &mut self.v_m_r,
            "v_m_min" => &mut self.v_m_min,
            "v_m_max" => &mut self.v_m_max,
            "dt_adapt" => &mut self.dt_adapt,
            "v_m_gain" => &mut self.v_m_gain,
            "spike_gain" => &mut self.spike_gain,
            "bias" => &mut self.bias,
            "avg_init" => &mut self.avg_init,
            "avg_ss_dt" => &mut self.avg_ss_dt,
            "avg_s_dt" => &mut self.avg_s_dt,
            "avg_m_dt" => &mut self.avg_m_dt,
            "avg_l_dt" => &mut self.avg_l_dt,
            "avg_l_init" => &mut self.avg_l_init,
            "avg_l_min" => &mut self.avg_l_min,
            "avg_l_gain" => &mut self.avg_l_gain,
            "avg_m_in_s" => &mut self.avg_m_in_s,
            "avg_lrn_min" => &mut self.avg_lrn_min,
            "avg_lrn_max" => &mut self.avg_lrn_max,
            "r_d1" => &mut self.r_d1,
            "r_d2" => &mut self.r_d2,
            "r_a1" => &mut self.r_a1,
            "r_a2" => &mut self.r_a2,
            _ => return None,
        })
    }

    #[inline]
    pub fn dt_net(&self) -> f64 {
        1.0 / self.tau_net
    }

    #[inline]
    pub fn dt_v_m(&self) -> f64 {
        1.0 / self.tau_v_m
    }

    pub fn set_d1(&mut self, ratio: f64) {
        self.r_d1 = ratio;
    }

    pub fn set_d2(&mut self, ratio: f64) {
        self.r_d2 = ratio;
    }

    pub fn set_a1(&mut self, ratio: f64) {
        self.r_a1 = ratio;
    }

    pub fn set_a2(&mut self, ratio: f64) {
        self.r_a2 = ratio;
    }

    /// Threshold used by the spike and activation rules this cycle.
    pub fn effective_act_thr(&self) -> f64 {
        match self.threshold_mode {
            ThresholdMode::Fixed => self.act_thr,
            ThresholdMode::Neuromodulated => {
                logistic(self.c_act_thr - self.r_d1 + self.r_a1 + self.r_d2 - self.r_a2)
            }
        }
    }

    pub fn xx1(&self, v: f64) -> f64 {
        xx1(self.act_gain, v)
    }

    /// The noise-convolved `xx1`, read from the cached table.
    pub fn noisy_xx1(&self, v: f64) -> f64 {
        let table = self.activation_table();
        if table.matches(self.act_sd, self.act_gain) {
            return table.eval(v);
        }
        // Fields were edited in place after the table was cached.
        let mut rebuilt = self.table.rebuilt.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(t) = rebuilt.as_ref().filter(|t| t.matches(self.act_sd, self.act_gain)) {
            return t.eval(v);
        }
        debug!(act_sd = self.act_sd, act_gain = self.act_gain, "rebuilding stale xx1 table");
        let table = Arc::new(ActivationTable::build(self.act_sd, self.act_gain));
        let y = table.eval(v);
        *rebuilt = Some(table);
        y
    }

    /// Activation function selected by `noisy_act`.
    pub fn act_fun(&self, v: f64) -> f64 {
        if self.noisy_act {
            self.noisy_xx1(v)
        } else {
            self.xx1(v)
        }
    }

    /// The noisy activation table, built on first use and then shared.
    ///
    /// Concurrent first calls build it exactly once; no caller sees a partial
    /// table.
    pub fn activation_table(&self) -> &ActivationTable {
        self.table
            .built
            .get_or_init(|| Arc::new(ActivationTable::build(self.act_sd, self.act_gain)))
    }

    /// Build the activation table ahead of the first cycle.
    pub fn prebuild(&self) {
        if self.noisy_act {
            self.activation_table();
        }
    }

    /// Learning-rate modulation derived from the long-term average.
    pub fn avg_l_lrn(&self, genre: Genre, avg_l: f64) -> f64 {
        if genre != Genre::Hidden {
            return 0.0;
        }
        let avg_fact = (self.avg_lrn_max - self.avg_lrn_min) / (self.avg_l_gain - self.avg_l_min);
        self.avg_lrn_min + avg_fact * (avg_l - self.avg_l_min)
    }

    /// Integrate the net current from `v_m` (or `v_m_eq` when `rate_coded`)
    /// over `steps` sub-steps; returns the current of the last sub-step.
    pub fn integrate_i_net(
        &self,
        unit: &Unit,
        g_i: f64,
        dt_integ: f64,
        rate_coded: bool,
        steps: usize,
    ) -> f64 {
        let steps = steps.max(1);
        let gc_e = self.g_bar_e * unit.g_e;
        let gc_i = self.g_bar_i * g_i;
        let gc_l = self.g_bar_l * self.g_l;
        let mut v = if rate_coded { unit.v_m_eq } else { unit.v_m };

        let mut i_net = 0.0;
        for _ in 0..steps {
            i_net = gc_e * (self.e_rev_e - v)
                + gc_i * (self.e_rev_i - v)
                + gc_l * (self.e_rev_l - v)
                - unit.adapt
                + self.bias;
            v += dt_integ / steps as f64 * self.dt_v_m() * i_net;
        }
        i_net
    }

    /// Low-pass the queued excitatory inputs into `g_e`.
    pub fn calculate_net_in(&self, unit: &mut Unit, dt_integ: f64) {
        if unit.act_ext.is_some() {
            return;
        }
        let net_raw = if unit.ex_inputs.is_empty() {
            0.0
        } else {
            let total = unit.ex_inputs.iter().fold(0.0, |acc, x| acc + x);
            unit.ex_inputs.clear();
            total
        };
        unit.g_e += dt_integ * self.dt_net() * (net_raw - unit.g_e);
    }

    /// Put a unit whose `act_ext` was just set into the matching steady state.
    pub fn force_activity(&self, unit: &mut Unit) {
        let Some(act_ext) = unit.act_ext else {
            return;
        };
        unit.g_e = act_ext / self.g_bar_e;
        unit.i_net = 0.0;
        unit.act = act_ext;
        unit.act_nd = act_ext;
        unit.v_m = if act_ext == 0.0 {
            self.e_rev_l
        } else {
            self.act_thr + act_ext / self.act_gain
        };
        unit.v_m_eq = unit.v_m;
    }

    /// One simulation step of `unit` under inhibitory conductance `g_i`.
    ///
    /// The supra-threshold excitatory threshold includes `bias` in both
    /// threshold modes.
    pub fn cycle(&self, unit: &mut Unit, _phase: Phase, g_i: f64, dt_integ: f64) {
        if unit.act_ext.is_some() {
            self.update_avgs(unit, dt_integ);
            unit.record_with(self);
            return;
        }

        unit.i_net = self.integrate_i_net(unit, g_i, dt_integ, false, 2);
        unit.i_net_r = self.integrate_i_net(unit, g_i, dt_integ, true, 1);

        unit.v_m += dt_integ * self.dt_v_m() * unit.i_net;
        unit.v_m_eq += dt_integ * self.dt_v_m() * unit.i_net_r;

        let act_thr = self.effective_act_thr();
        unit.act_thr = act_thr;

        if unit.v_m > act_thr {
            unit.spike = true;
            unit.v_m = self.v_m_r;
            unit.i_net = 0.0;
        } else {
            unit.spike = false;
        }

        // rate code: driven by v_m_eq, which is never reset by spikes
        let new_act = if unit.v_m_eq <= act_thr {
            self.act_fun(unit.v_m_eq - act_thr)
        } else {
            let gc_e = self.g_bar_e * unit.g_e;
            let gc_i = self.g_bar_i * g_i;
            let gc_l = self.g_bar_l * self.g_l;
            // modulated threshold in the denominator too, not the base act_thr
            let g_e_thr = (gc_i * (self.e_rev_i - act_thr) + gc_l * (self.e_rev_l - act_thr)
                - unit.adapt
                + self.bias)
                / (act_thr - self.e_rev_e);
            self.act_fun(gc_e - g_e_thr)
        };

        unit.act_nd += dt_integ * self.dt_v_m() * (new_act - unit.act_nd);
        unit.act = unit.act_nd;

        if self.adapt_on {
            let spike = if unit.spike { 1.0 } else { 0.0 };
            unit.adapt += dt_integ
                * (self.dt_adapt * (self.v_m_gain * (unit.v_m - self.e_rev_l) - unit.adapt)
                    + spike * self.spike_gain);
        }

        self.update_avgs(unit, dt_integ);
        unit.record_with(self);
    }

    /// Cascade the super-short, short and medium averages. Every cycle.
    pub fn update_avgs(&self, unit: &mut Unit, dt_integ: f64) {
        unit.avg_ss += dt_integ * self.avg_ss_dt * (unit.act_nd - unit.avg_ss);
        unit.avg_s += dt_integ * self.avg_s_dt * (unit.avg_ss - unit.avg_s);
        unit.avg_m += dt_integ * self.avg_m_dt * (unit.avg_s - unit.avg_m);
        unit.avg_s_eff = self.avg_m_in_s * unit.avg_m + (1.0 - self.avg_m_in_s) * unit.avg_s;
    }

    /// Long-term average. Once per trial, not per cycle.
    pub fn update_avg_l(&self, unit: &mut Unit) {
        unit.avg_l += self.avg_l_dt * (self.avg_l_gain * unit.avg_m - unit.avg_l);
        unit.avg_l = unit.avg_l.max(self.avg_l_min);
    }
}

impl fmt::Display for UnitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Parameters:")?;
        let shown = [
            ("dt_v_m", self.dt_v_m()),
            ("dt_net", self.dt_net()),
            ("g_l", self.g_l),
            ("g_bar_e", self.g_bar_e),
            ("g_bar_l", self.g_bar_l),
            ("g_bar_i", self.g_bar_i),
            ("e_rev_e", self.e_rev_e),
            ("e_rev_l", self.e_rev_l),
            ("e_rev_i", self.e_rev_i),
            ("act_thr", self.act_thr),
            ("act_gain", self.act_gain),
        ];
        for (name, value) in shown {
            writeln!(f, "   {name}: {value:.2}")?;
        }
        Ok(())
    }
}

#[inline]
pub fn logistic(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// State variables a unit can record every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnitField {
    /// `g_bar_e * g_e`.
    Net,
    GE,
    INet,
    INetR,
    VM,
    VMEq,
    Act,
    ActNd,
    ActM,
    Adapt,
    Spike,
    AvgSs,
    AvgS,
    AvgM,
    AvgL,
    AvgSEff,
}

impl UnitField {
    pub const ALL: [UnitField; 16] = [
        UnitField::Net,
        UnitField::GE,
        UnitField::INet,
        UnitField::INetR,
        UnitField::VM,
        UnitField::VMEq,
        UnitField::Act,
        UnitField::ActNd,
        UnitField::ActM,
        UnitField::Adapt,
        UnitField::Spike,
        UnitField::AvgSs,
        UnitField::AvgS,
        UnitField::AvgM,
        UnitField::AvgL,
        UnitField::AvgSEff,
    ];

    /// Fields compared against reference trajectories.
    pub const DEFAULT: [UnitField; 6] = [
        UnitField::Net,
        UnitField::INet,
        UnitField::VM,
        UnitField::Act,
        UnitField::VMEq,
        UnitField::Adapt,
    ];
}

impl TraceField for UnitField {
    fn name(self) -> &'static str {
        match self {
            UnitField::Net => "net",
            UnitField::GE => "g_e",
            UnitField::INet => "I_net",
            UnitField::INetR => "I_net_r",
            UnitField::VM => "v_m",
            UnitField::VMEq => "v_m_eq",
            UnitField::Act => "act",
            UnitField::ActNd => "act_nd",
            UnitField::ActM => "act_m",
            UnitField::Adapt => "adapt",
            UnitField::Spike => "spike",
            UnitField::AvgSs => "avg_ss",
            UnitField::AvgS => "avg_s",
            UnitField::AvgM => "avg_m",
            UnitField::AvgL => "avg_l",
            UnitField::AvgSEff => "avg_s_eff",
        }
    }
}

impl FromStr for UnitField {
    type Err = LeabraError;

    fn from_str(s: &str) -> Result<Self> {
        UnitField::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| LeabraError::UnknownField(s.to_string()))
    }
}

/// A rate-coded Leabra unit (neuron).
///
/// Holds only state; the update equations live in [`UnitSpec`].
#[derive(Debug, Clone)]
pub struct Unit {
    pub genre: Genre,
    spec: SharedUnitSpec,

    /// Excitatory conductance.
    pub g_e: f64,
    /// Net current.
    pub i_net: f64,
    /// Net current of the rate-coded (equilibrium) integration.
    pub i_net_r: f64,
    /// Membrane potential.
    pub v_m: f64,
    /// Equilibrium membrane potential, not reset by spikes.
    pub v_m_eq: f64,
    pub spike: bool,
    /// Threshold in effect during the last cycle.
    pub act_thr: f64,

    pub act: f64,
    /// Non-depressed activity.
    pub act_nd: f64,
    /// Activity at the end of the minus phase.
    pub act_m: f64,
    act_ext: Option<f64>,

    /// Adaptation current.
    pub adapt: f64,

    ex_inputs: Vec<f64>,

    pub avg_ss: f64,
    pub avg_s: f64,
    pub avg_m: f64,
    pub avg_l: f64,
    /// Mix of `avg_s` and `avg_m`.
    pub avg_s_eff: f64,

    trace: Option<UnitTrace>,
}

impl Unit {
    pub fn new(spec: SharedUnitSpec, genre: Genre) -> Self {
        let (avg_init, avg_l_init) = {
            let s = spec.read();
            (s.avg_init, s.avg_l_init)
        };
        let mut unit = Self {
            genre,
            spec,
            g_e: 0.0,
            i_net: 0.0,
            i_net_r: 0.0,
            v_m: 0.0,
            v_m_eq: 0.0,
            spike: false,
            act_thr: 0.0,
            act: 0.0,
            act_nd: 0.0,
            act_m: 0.0,
            act_ext: None,
            adapt: 0.0,
            ex_inputs: Vec::new(),
            avg_ss: avg_init,
            avg_s: avg_init,
            avg_m: avg_init,
            avg_l: avg_l_init,
            avg_s_eff: 0.0,
            trace: None,
        };
        unit.reset();
        unit
    }

    /// A hidden unit with its own default spec.
    pub fn with_defaults() -> Self {
        Self::new(SharedUnitSpec::default(), Genre::Hidden)
    }

    pub fn spec(&self) -> &SharedUnitSpec {
        &self.spec
    }

    /// Reinitialize per-trial state. Long-term averages are kept.
    pub fn reset(&mut self) {
        let (v_m_init, act_thr) = {
            let s = self.spec.read();
            (s.v_m_init, s.effective_act_thr())
        };
        self.ex_inputs.clear();
        if let Some(trace) = &mut self.trace {
            trace.clear();
        }
        self.g_e = 0.0;
        self.i_net = 0.0;
        self.i_net_r = self.i_net;
        self.v_m = v_m_init;
        self.v_m_eq = self.v_m;
        self.spike = false;
        self.act_thr = act_thr;
        self.act_ext = None;
        self.act = 0.0;
        self.act_nd = self.act;
        self.act_m = self.act;
        self.adapt = 0.0;
    }

    /// Queue an excitatory input for the next net-input computation.
    pub fn add_excitatory(&mut self, value: f64) -> Result<()> {
        if self.act_ext.is_some() {
            return Err(LeabraError::ForcedUnitInput);
        }
        self.ex_inputs.push(value);
        Ok(())
    }

    pub fn pending_inputs(&self) -> &[f64] {
        &self.ex_inputs
    }

    pub fn calculate_net_in(&mut self) {
        let spec = self.spec.clone();
        let spec = spec.read();
        self.calculate_net_in_with(&spec, 1.0);
    }

    pub fn calculate_net_in_with(&mut self, spec: &UnitSpec, dt_integ: f64) {
        spec.calculate_net_in(self, dt_integ);
    }

    /// Clamp the unit's activity to `value` until released or reset.
    pub fn force_activity(&mut self, value: f64) -> Result<()> {
        let spec = self.spec.clone();
        let spec = spec.read();
        self.force_activity_with(&spec, value)
    }

    pub fn force_activity_with(&mut self, spec: &UnitSpec, value: f64) -> Result<()> {
        if !self.ex_inputs.is_empty() {
            return Err(LeabraError::PendingInputs {
                pending: self.ex_inputs.len(),
            });
        }
        self.act_ext = Some(value);
        spec.force_activity(self);
        Ok(())
    }

    /// Stop forcing; the unit resumes integrating its inputs next cycle.
    pub fn release_activity(&mut self) {
        self.act_ext = None;
    }

    pub fn forced_activity(&self) -> Option<f64> {
        self.act_ext
    }

    pub fn is_forced(&self) -> bool {
        self.act_ext.is_some()
    }

    pub fn cycle(&mut self, phase: Phase, g_i: f64, dt_integ: f64) {
        let spec = self.spec.clone();
        let spec = spec.read();
        self.cycle_with(&spec, phase, g_i, dt_integ);
    }

    /// Cycle against an already locked spec.
    pub fn cycle_with(&mut self, spec: &UnitSpec, phase: Phase, g_i: f64, dt_integ: f64) {
        spec.cycle(self, phase, g_i, dt_integ);
    }

    pub fn update_avg_l(&mut self) {
        let spec = self.spec.clone();
        let spec = spec.read();
        spec.update_avg_l(self);
    }

    /// For rate-coded units `act_eq` is `act`.
    pub fn act_eq(&self) -> f64 {
        self.act
    }

    /// Excitatory net input, `g_bar_e * g_e`.
    pub fn net(&self) -> f64 {
        self.net_with(&self.spec.read())
    }

    pub fn net_with(&self, spec: &UnitSpec) -> f64 {
        spec.g_bar_e * self.g_e
    }

    pub fn avg_l_lrn(&self) -> f64 {
        self.spec.read().avg_l_lrn(self.genre, self.avg_l)
    }

    /// Takes the spec's read lock; use [`Unit::field_with`] while it is held.
    pub fn field(&self, field: UnitField) -> f64 {
        self.field_with(&self.spec.read(), field)
    }

    /// Read `field` against an already locked spec.
    pub fn field_with(&self, spec: &UnitSpec, field: UnitField) -> f64 {
        match field {
            UnitField::Net => self.net_with(spec),
            UnitField::GE => self.g_e,
            UnitField::INet => self.i_net,
            UnitField::INetR => self.i_net_r,
            UnitField::VM => self.v_m,
            UnitField::VMEq => self.v_m_eq,
            UnitField::Act => self.act,
            UnitField::ActNd => self.act_nd,
            UnitField::ActM => self.act_m,
            UnitField::Adapt => self.adapt,
            UnitField::Spike => {
                if self.spike {
                    1.0
                } else {
                    0.0
                }
            }
            UnitField::AvgSs => self.avg_ss,
            UnitField::AvgS => self.avg_s,
            UnitField::AvgM => self.avg_m,
            UnitField::AvgL => self.avg_l,
            UnitField::AvgSEff => self.avg_s_eff,
        }
    }

    /// Append the current values to the attached trace, if any.
    pub(crate) fn record_with(&mut self, spec: &UnitSpec) {
        let Some(mut trace) = self.trace.take() else {
            return;
        };
        trace.push_with(|f| self.field_with(spec, f));
        self.trace = Some(trace);
    }

    /// Start recording `fields` once per cycle. Replaces any previous trace.
    pub fn attach_trace(&mut self, fields: &[UnitField]) {
        self.trace = Some(UnitTrace::new(fields));
    }

    pub fn detach_trace(&mut self) -> Option<UnitTrace> {
        self.trace.take()
    }

    pub fn trace(&self) -> Option<&UnitTrace> {
        self.trace.as_ref()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "State:")?;
        for (name, value) in [
            ("g_e", self.g_e),
            ("I_net", self.i_net),
            ("v_m", self.v_m),
            ("act", self.act),
            ("v_m_eq", self.v_m_eq),
        ] {
            writeln!(f, "   {name}: {value:.2}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn unit_with(options: &[(&str, OptionValue)]) -> Unit {
        let spec = UnitSpec::from_options(options.iter().copied()).unwrap();
        Unit::new(SharedUnitSpec::new(spec), Genre::Hidden)
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = UnitSpec::from_options([("act_treshold", 0.3)]).unwrap_err();
        assert_eq!(
            err,
            LeabraError::UnknownOption {
                spec: "UnitSpec",
                name: "act_treshold".to_string()
            }
        );
    }

    #[test]
    fn flag_and_number_options_are_typed() {
        assert!(matches!(
            UnitSpec::from_options([("adapt_on", OptionValue::Number(1.0))]),
            Err(LeabraError::OptionType { .. })
        ));
        assert!(matches!(
            UnitSpec::from_options([("g_bar_e", OptionValue::Flag(true))]),
            Err(LeabraError::OptionType { .. })
        ));
    }

    #[test]
    fn every_option_is_retrievable_unchanged() {
        let defaults = UnitSpec::default();
        for name in UnitSpec::OPTION_NAMES {
            assert!(defaults.get_option(name).is_some(), "{name} has no getter");
        }

        let spec = UnitSpec::from_options([
            ("g_bar_e", OptionValue::from(0.3)),
            ("act_gain", OptionValue::from(40)),
            ("adapt_on", OptionValue::from(true)),
            ("bias", OptionValue::from(0.125)),
        ])
        .unwrap();
        assert_eq!(spec.get_option("g_bar_e"), Some(OptionValue::Number(0.3)));
        assert_eq!(spec.get_option("act_gain"), Some(OptionValue::Number(40.0)));
        assert_eq!(spec.get_option("adapt_on"), Some(OptionValue::Flag(true)));
        assert_eq!(spec.get_option("bias"), Some(OptionValue::Number(0.125)));
        assert_eq!(spec.get_option("nope"), None);
    }

    #[test]
    fn invalid_values_fail_validation() {
        assert!(UnitSpec::from_options([("tau_net", 0.0)]).is_err());
        assert!(UnitSpec::from_options([("act_sd", -0.1)]).is_err());
        assert!(UnitSpec::from_options([("bias", f64::NAN)]).is_err());
    }

    #[test]
    fn defaults_match_reference_values() {
        let spec = UnitSpec::default();
        assert!(approx_eq(spec.dt_net(), 1.0 / 1.4, 1e-15));
        assert!(approx_eq(spec.dt_v_m(), 1.0 / 3.3, 1e-15));
        assert_eq!(spec.effective_act_thr(), 0.5);

        let unit = Unit::with_defaults();
        assert_eq!(unit.v_m, 0.4);
        assert_eq!(unit.v_m_eq, 0.4);
        assert_eq!(unit.act, 0.0);
        assert_eq!(unit.avg_ss, 0.15);
        assert_eq!(unit.avg_l, 0.4);
        assert_eq!(unit.avg_s_eff, 0.0);
    }

    #[test]
    fn net_input_drains_queue_and_low_passes() {
        let mut unit = Unit::with_defaults();
        unit.add_excitatory(0.25).unwrap();
        unit.add_excitatory(0.75).unwrap();
        unit.calculate_net_in();
        assert!(unit.pending_inputs().is_empty());
        assert!(approx_eq(unit.g_e, 1.0 / 1.4, 1e-12));

        unit.calculate_net_in();
        let expected = 1.0 / 1.4 + (1.0 / 1.4) * (0.0 - 1.0 / 1.4);
        assert!(approx_eq(unit.g_e, expected, 1e-12));
    }

    #[test]
    fn forcing_and_input_are_mutually_exclusive() {
        let mut unit = Unit::with_defaults();
        unit.add_excitatory(0.5).unwrap();
        assert_eq!(
            unit.force_activity(0.3),
            Err(LeabraError::PendingInputs { pending: 1 })
        );

        let mut unit = Unit::with_defaults();
        unit.force_activity(0.3).unwrap();
        assert_eq!(unit.add_excitatory(0.5), Err(LeabraError::ForcedUnitInput));
    }

    #[test]
    fn forced_activity_sets_steady_state() {
        let mut unit = Unit::with_defaults();
        unit.force_activity(0.5).unwrap();
        assert_eq!(unit.act, 0.5);
        assert_eq!(unit.g_e, 0.5);
        assert_eq!(unit.i_net, 0.0);
        assert!(approx_eq(unit.v_m, 0.5 + 0.5 / 100.0, 1e-15));
        assert_eq!(unit.v_m_eq, unit.v_m);

        unit.force_activity(0.0).unwrap();
        assert_eq!(unit.v_m, 0.3);
    }

    #[test]
    fn forced_activity_survives_cycles() {
        let mut unit = Unit::with_defaults();
        unit.force_activity(0.7).unwrap();
        for _ in 0..50 {
            unit.calculate_net_in();
            unit.cycle(Phase::Minus, 0.3, 1.0);
            assert_eq!(unit.act, 0.7);
        }
        // averages still move toward the forced activity
        assert!(approx_eq(unit.avg_m, 0.7, 1e-2));
    }

    #[test]
    fn released_unit_resumes_dynamics() {
        let mut unit = Unit::with_defaults();
        unit.force_activity(0.7).unwrap();
        unit.cycle(Phase::Minus, 0.0, 1.0);
        unit.release_activity();
        assert!(!unit.is_forced());
        for _ in 0..100 {
            unit.calculate_net_in();
            unit.cycle(Phase::Minus, 0.0, 1.0);
        }
        assert!(unit.act < 0.01);
    }

    #[test]
    fn silent_unit_stays_at_rest() {
        let mut unit = Unit::with_defaults();
        for _ in 0..300 {
            unit.calculate_net_in();
            unit.cycle(Phase::Minus, 0.0, 1.0);
        }
        assert_eq!(unit.act, 0.0);
        assert!(approx_eq(unit.v_m_eq, 0.3, 1e-4));
        assert!(!unit.spike);
    }

    #[test]
    fn bias_sets_the_resting_activity() {
        let mut unit = unit_with(&[("bias", 0.1.into())]);
        for _ in 0..400 {
            unit.calculate_net_in();
            unit.cycle(Phase::Minus, 0.0, 1.0);
        }
        // v_m_eq settles at e_rev_l + bias / gc_l = 1.3, above threshold, so
        // the excitatory threshold is (gc_l * (e_rev_l - thr) + bias) / (thr - e_rev_e)
        let spec = unit.spec().read();
        let g_e_thr = (0.1 * (0.3 - 0.5) + 0.1) / (0.5 - 1.0);
        let expected = spec.noisy_xx1(0.0 - g_e_thr);
        assert!(approx_eq(unit.v_m_eq, 1.3, 1e-4));
        assert!(approx_eq(unit.act, expected, 1e-6));
    }

    #[test]
    fn excitation_drives_activity_and_inhibition_curbs_it() {
        let run = |g_i: f64| {
            let mut unit = Unit::with_defaults();
            for _ in 0..100 {
                unit.add_excitatory(0.5).unwrap();
                unit.calculate_net_in();
                unit.cycle(Phase::Minus, g_i, 1.0);
            }
            unit.act
        };
        let free = run(0.0);
        let inhibited = run(0.3);
        assert!(free > 0.5);
        assert!(inhibited < free);
    }

    #[test]
    fn supra_threshold_membrane_spikes_and_resets() {
        let mut unit = Unit::with_defaults();
        let mut spiked = false;
        for _ in 0..50 {
            unit.add_excitatory(1.0).unwrap();
            unit.calculate_net_in();
            unit.cycle(Phase::Minus, 0.0, 1.0);
            if unit.spike {
                spiked = true;
                assert_eq!(unit.v_m, 0.3);
                assert_eq!(unit.i_net, 0.0);
            }
        }
        assert!(spiked);
    }

    #[test]
    fn adaptation_builds_up_under_drive() {
        let mut unit = unit_with(&[("adapt_on", true.into())]);
        for _ in 0..200 {
            unit.add_excitatory(1.0).unwrap();
            unit.calculate_net_in();
            unit.cycle(Phase::Minus, 0.0, 1.0);
        }
        assert!(unit.adapt > 0.0);

        let mut plain = Unit::with_defaults();
        for _ in 0..200 {
            plain.add_excitatory(1.0).unwrap();
            plain.calculate_net_in();
            plain.cycle(Phase::Minus, 0.0, 1.0);
        }
        assert_eq!(plain.adapt, 0.0);
        assert!(unit.act < plain.act);
    }

    #[test]
    fn reset_replays_the_same_trajectory() {
        let drive = |unit: &mut Unit| -> Vec<f64> {
            (0..60)
                .map(|t| {
                    unit.add_excitatory(if t % 20 < 10 { 0.8 } else { 0.1 }).unwrap();
                    unit.calculate_net_in();
                    unit.cycle(Phase::Minus, 0.1, 1.0);
                    unit.act
                })
                .collect()
        };

        let spec = SharedUnitSpec::default();
        let mut fresh = Unit::new(spec.clone(), Genre::Hidden);
        let expected = drive(&mut fresh);

        let mut reused = Unit::new(spec, Genre::Hidden);
        drive(&mut reused);
        let avg_m = reused.avg_m;
        reused.reset();
        assert_eq!(reused.avg_m, avg_m);
        assert_eq!(drive(&mut reused), expected);
    }

    #[test]
    fn averages_cascade_from_act_nd() {
        let spec = UnitSpec::default();
        let mut unit = Unit::with_defaults();
        unit.act_nd = 1.0;
        spec.update_avgs(&mut unit, 1.0);
        assert!(approx_eq(unit.avg_ss, 0.15 + 0.5 * 0.85, 1e-15));
        assert!(approx_eq(unit.avg_s, 0.15 + 0.5 * (unit.avg_ss - 0.15), 1e-15));
        assert!(approx_eq(unit.avg_m, 0.15 + 0.1 * (unit.avg_s - 0.15), 1e-15));
        assert!(approx_eq(
            unit.avg_s_eff,
            0.1 * unit.avg_m + 0.9 * unit.avg_s,
            1e-15
        ));
    }

    #[test]
    fn long_term_average_is_clamped() {
        let mut unit = Unit::with_defaults();
        unit.avg_m = 0.0;
        for _ in 0..100 {
            unit.update_avg_l();
        }
        assert_eq!(unit.avg_l, 0.2);

        unit.avg_m = 0.4;
        unit.update_avg_l();
        assert!(approx_eq(unit.avg_l, 0.2 + 0.1 * (2.5 * 0.4 - 0.2), 1e-15));
    }

    #[test]
    fn avg_l_lrn_only_for_hidden_units() {
        let spec = SharedUnitSpec::default();
        let input = Unit::new(spec.clone(), Genre::Input);
        let output = Unit::new(spec.clone(), Genre::Output);
        let hidden = Unit::new(spec, Genre::Hidden);
        assert_eq!(input.avg_l_lrn(), 0.0);
        assert_eq!(output.avg_l_lrn(), 0.0);

        let fact = (0.5 - 0.0001) / (2.5 - 0.2);
        assert!(approx_eq(hidden.avg_l_lrn(), 0.0001 + fact * (0.4 - 0.2), 1e-15));
    }

    #[test]
    fn neuromodulation_moves_the_threshold() {
        let mut spec = UnitSpec::from_options([("neuromod_thr", true)]).unwrap();
        assert!(approx_eq(spec.effective_act_thr(), 0.5, 1e-15));
        spec.set_d1(1.0);
        assert!(approx_eq(spec.effective_act_thr(), logistic(-1.0), 1e-15));
        spec.set_d2(1.0);
        assert!(approx_eq(spec.effective_act_thr(), 0.5, 1e-15));
        spec.set_a2(2.0);
        spec.set_a1(0.5);
        assert!(approx_eq(spec.effective_act_thr(), logistic(-1.5), 1e-15));
    }

    #[test]
    fn lowered_threshold_raises_activity() {
        let run = |d1: f64| {
            let spec = SharedUnitSpec::new(UnitSpec::from_options([("neuromod_thr", true)]).unwrap());
            spec.update(|s| s.set_d1(d1)).unwrap();
            let mut unit = Unit::new(spec, Genre::Hidden);
            for _ in 0..80 {
                unit.add_excitatory(0.3).unwrap();
                unit.calculate_net_in();
                unit.cycle(Phase::Minus, 0.0, 1.0);
            }
            (unit.act, unit.act_thr)
        };
        let (base, base_thr) = run(0.0);
        let (boosted, boosted_thr) = run(1.0);
        assert!(boosted_thr < base_thr);
        assert!(boosted > base);
    }

    #[test]
    fn shared_spec_updates_reach_every_unit() {
        let spec = SharedUnitSpec::default();
        let a = Unit::new(spec.clone(), Genre::Hidden);
        let b = Unit::new(spec.clone(), Genre::Hidden);
        assert!(a.spec().ptr_eq(b.spec()));

        spec.read().prebuild();
        spec.set_option("act_gain", 40).unwrap();
        assert_eq!(spec.version(), 1);
        assert_eq!(a.spec().read().act_gain, 40.0);
        assert_eq!(b.spec().read().activation_table().act_gain(), 40.0);

        assert!(spec.set_option("tau_v_m", -1.0).is_err());
        assert_eq!(spec.read().tau_v_m, 3.3);
        assert_eq!(spec.version(), 1);
    }

    #[test]
    fn modulated_threshold_must_differ_from_e_rev_e() {
        let fixed = [("act_thr", OptionValue::from(0.3)), ("e_rev_e", OptionValue::from(0.5))];
        assert!(UnitSpec::from_options(fixed).is_ok());
        assert!(matches!(
            UnitSpec::from_options([
                ("act_thr", OptionValue::from(0.3)),
                ("e_rev_e", OptionValue::from(0.5)),
                ("neuromod_thr", OptionValue::from(true)),
            ]),
            Err(LeabraError::InvalidOption { name: "act_thr", .. })
        ));

        let handle = SharedUnitSpec::new(UnitSpec::from_options(fixed).unwrap());
        assert!(handle
            .update(|s| s.threshold_mode = ThresholdMode::Neuromodulated)
            .is_err());
        assert_eq!(handle.read().threshold_mode, ThresholdMode::Fixed);
    }

    #[test]
    fn stale_table_is_rebuilt_once() {
        let mut spec = UnitSpec::default();
        spec.prebuild();
        spec.act_sd = 0.02;

        let first = spec.noisy_xx1(0.01);
        let cached = spec.table.rebuilt.lock().unwrap().clone().unwrap();
        assert!(cached.matches(0.02, 100.0));
        assert_eq!(first, ActivationTable::build(0.02, 100.0).eval(0.01));

        spec.noisy_xx1(0.2);
        let again = spec.table.rebuilt.lock().unwrap().clone().unwrap();
        assert!(Arc::ptr_eq(&cached, &again));
        // the table built before the edit is kept as is
        assert!(spec.activation_table().matches(0.01, 100.0));
    }

    #[test]
    fn exact_activation_when_noise_disabled() {
        let spec = UnitSpec::from_options([("noisy_act", false)]).unwrap();
        assert_eq!(spec.act_fun(0.2), xx1(100.0, 0.2));
        assert_eq!(spec.act_fun(-0.2), 0.0);
    }

    #[test]
    fn trace_records_each_cycle_and_clears_on_reset() {
        let mut unit = Unit::with_defaults();
        unit.attach_trace(&UnitField::DEFAULT);
        for _ in 0..5 {
            unit.add_excitatory(0.4).unwrap();
            unit.calculate_net_in();
            unit.cycle(Phase::Minus, 0.0, 1.0);
        }
        let trace = unit.trace().unwrap();
        assert_eq!(trace.len(), 5);
        assert_eq!(trace.get(UnitField::Act).unwrap().last(), Some(&unit.act));
        assert_eq!(trace.by_name("I_net").unwrap().len(), 5);

        unit.reset();
        assert!(unit.trace().unwrap().is_empty());
    }

    #[test]
    fn field_names_parse() {
        assert_eq!("v_m_eq".parse::<UnitField>(), Ok(UnitField::VMEq));
        assert!("voltage".parse::<UnitField>().is_err());
        assert_eq!("minus".parse::<Phase>(), Ok(Phase::Minus));
    }
}
