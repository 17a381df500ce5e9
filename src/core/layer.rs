use core::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{LeabraError, Result};
use crate::observer::{LayerTrace, TraceField};
use crate::options::{require_finite, OptionValue, Spec, SpecHandle};
use crate::unit::{Genre, Phase, SharedUnitSpec, Unit, UnitField, UnitSpec};

/// Shared handle to a layer spec.
pub type SharedLayerSpec = SpecHandle<LayerSpec>;

/// Opaque identifier of a connection attached to a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectionId(pub usize);

/// Inhibition and trial-level parameters of a layer.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct LayerSpec {
    /// Enable feed-forward/feedback inhibition.
    pub lay_inhib: bool,

    /// Integration rate of feedback inhibition.
    pub fb_dt: f64,
    pub fb: f64,
    pub ff: f64,
    /// Overall inhibition multiplier.
    pub g_i: f64,

    /// Fraction of `ffi`/`fbi` removed at trial start. 1.0 resets them.
    pub trial_decay: f64,

    /// Mean net input below which there is no feed-forward inhibition.
    pub ff0: f64,

    /// Initial (and fixed, when `avg_act_fixed`) expected activity.
    pub avg_act_targ_init: f64,
    pub avg_act_adjust: f64,
    pub avg_act_fixed: bool,
    /// Replace the initial estimate with the first plus-phase average.
    pub avg_act_use_first: bool,
    /// Time constant for the plus-phase average; 0 disables integration.
    pub avg_act_tau: f64,

    #[cfg_attr(feature = "serde", serde(skip))]
    cycle_count: AtomicU64,
}

impl Clone for LayerSpec {
    fn clone(&self) -> Self {
        Self {
            lay_inhib: self.lay_inhib,
            fb_dt: self.fb_dt,
            fb: self.fb,
            ff: self.ff,
            g_i: self.g_i,
            trial_decay: self.trial_decay,
            ff0: self.ff0,
            avg_act_targ_init: self.avg_act_targ_init,
            avg_act_adjust: self.avg_act_adjust,
            avg_act_fixed: self.avg_act_fixed,
            avg_act_use_first: self.avg_act_use_first,
            avg_act_tau: self.avg_act_tau,
            cycle_count: AtomicU64::new(self.cycle_count()),
        }
    }
}

impl Default for LayerSpec {
    fn default() -> Self {
        Self {
            lay_inhib: true,
            fb_dt: 1.0 / 1.4,
            fb: 1.0,
            ff: 1.0,
            g_i: 1.8,
            trial_decay: 1.0,
            ff0: 0.1,
            avg_act_targ_init: 0.2,
            avg_act_adjust: 1.0,
            avg_act_fixed: false,
            avg_act_use_first: false,
            avg_act_tau: 0.0,
            cycle_count: AtomicU64::new(0),
        }
    }
}

impl Spec for LayerSpec {
    const KIND: &'static str = "LayerSpec";

    const OPTION_NAMES: &'static [&'static str] = &[
        "lay_inhib",
        "fb_dt",
        "fb",
        "ff",
        "g_i",
        "trial_decay",
        "ff0",
        "avg_act_targ_init",
        "avg_act_adjust",
        "avg_act_fixed",
        "avg_act_use_first",
        "avg_act_tau",
    ];

    fn set_option(&mut self, name: &str, value: OptionValue) -> Result<()> {
        match name {
            "lay_inhib" => self.lay_inhib = value.as_flag(name)?,
            "fb_dt" => self.fb_dt = value.as_number(name)?,
            "fb" => self.fb = value.as_number(name)?,
            "ff" => self.ff = value.as_number(name)?,
            "g_i" => self.g_i = value.as_number(name)?,
            "trial_decay" => self.trial_decay = value.as_number(name)?,
            "ff0" => self.ff0 = value.as_number(name)?,
            "avg_act_targ_init" => self.avg_act_targ_init = value.as_number(name)?,
            "avg_act_adjust" => self.avg_act_adjust = value.as_number(name)?,
            "avg_act_fixed" => self.avg_act_fixed = value.as_flag(name)?,
            "avg_act_use_first" => self.avg_act_use_first = value.as_flag(name)?,
            "avg_act_tau" => self.avg_act_tau = value.as_number(name)?,
            _ => {
                return Err(LeabraError::UnknownOption {
                    spec: Self::KIND,
                    name: name.to_string(),
                })
            }
        }
        Ok(())
    }

    fn get_option(&self, name: &str) -> Option<OptionValue> {
        Some(match name {
            "lay_inhib" => OptionValue::Flag(self.lay_inhib),
            "fb_dt" => OptionValue::Number(self.fb_dt),
            "fb" => OptionValue::Number(self.fb),
            "ff" => OptionValue::Number(self.ff),
            "g_i" => OptionValue::Number(self.g_i),
            "trial_decay" => OptionValue::Number(self.trial_decay),
            "ff0" => OptionValue::Number(self.ff0),
            "avg_act_targ_init" => OptionValue::Number(self.avg_act_targ_init),
            "avg_act_adjust" => OptionValue::Number(self.avg_act_adjust),
            "avg_act_fixed" => OptionValue::Flag(self.avg_act_fixed),
            "avg_act_use_first" => OptionValue::Flag(self.avg_act_use_first),
            "avg_act_tau" => OptionValue::Number(self.avg_act_tau),
            _ => return None,
        })
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in self.options() {
            if let OptionValue::Number(v) = value {
                require_finite(name, v)?;
            }
        }
        if !(0.0..=1.0).contains(&self.trial_decay) {
            return Err(LeabraError::InvalidOption {
                name: "trial_decay",
                reason: "must be in [0, 1]",
            });
        }
        if self.avg_act_tau < 0.0 {
            return Err(LeabraError::InvalidOption {
                name: "avg_act_tau",
                reason: "must be >= 0",
            });
        }
        Ok(())
    }
}

impl LayerSpec {
    /// Layer cycles run so far by every layer sharing this spec.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count.load(Ordering::Relaxed)
    }

    /// FFFB inhibitory conductance. Updates the layer's `ffi` and `fbi`.
    pub fn inhibition(&self, layer: &mut Layer) -> f64 {
        if !self.lay_inhib {
            return 0.0;
        }
        let g_e: Vec<f64> = layer.units.iter().map(|u| u.g_e).collect();
        layer.ffi = self.ff * (mean(&g_e) - self.ff0).max(0.0);
        layer.fbi += self.fb_dt * (self.fb * layer.avg_act - layer.fbi);
        self.g_i * (layer.ffi + layer.fbi)
    }

    /// One layer cycle: net inputs, inhibition (minus phase only), unit
    /// updates, then the population average.
    pub fn cycle(&self, layer: &mut Layer, phase: Phase) {
        let unit_spec = layer.unit_spec.clone();
        let unit_spec = unit_spec.read();
        let us: &UnitSpec = &unit_spec;

        #[cfg(feature = "parallel")]
        {
            layer
                .units
                .par_iter_mut()
                .for_each(|u| u.calculate_net_in_with(us, 1.0));
        }
        #[cfg(not(feature = "parallel"))]
        {
            for u in &mut layer.units {
                u.calculate_net_in_with(us, 1.0);
            }
        }

        if phase == Phase::Minus {
            layer.gc_i = self.inhibition(layer);
        }

        let g_i = layer.gc_i;
        #[cfg(feature = "parallel")]
        {
            layer
                .units
                .par_iter_mut()
                .for_each(|u| u.cycle_with(us, phase, g_i, 1.0));
        }
        #[cfg(not(feature = "parallel"))]
        {
            for u in &mut layer.units {
                u.cycle_with(us, phase, g_i, 1.0);
            }
        }

        layer.avg_act = mean(&layer.activities());
        layer.record();
        let count = self.cycle_count.fetch_add(1, Ordering::Relaxed) + 1;

        trace!(
            layer = layer.name.as_deref().unwrap_or("-"),
            cycle = count,
            gc_i = layer.gc_i,
            avg_act = layer.avg_act,
            "layer cycle"
        );
    }

    /// Reset every unit and decay the inhibition state toward zero.
    pub fn trial_init(&self, layer: &mut Layer) {
        for u in &mut layer.units {
            u.reset();
        }
        layer.ffi -= self.trial_decay * layer.ffi;
        layer.fbi -= self.trial_decay * layer.fbi;
    }

    /// Track the expected plus-phase activity used to scale inputs.
    pub fn update_avg_act_p(&self, layer: &mut Layer) {
        if self.avg_act_fixed {
            layer.avg_act_p_eff = self.avg_act_targ_init;
            return;
        }
        if self.avg_act_use_first && !layer.seen_plus_phase {
            layer.avg_act_p = layer.avg_act;
        } else if self.avg_act_tau > 0.0 {
            layer.avg_act_p += (1.0 / self.avg_act_tau) * (layer.avg_act - layer.avg_act_p);
        }
        layer.seen_plus_phase = true;
        layer.avg_act_p_eff = self.avg_act_adjust * layer.avg_act_p;
    }
}

impl fmt::Display for LayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Parameters:")?;
        for (name, value) in [
            ("fb_dt", self.fb_dt),
            ("ff0", self.ff0),
            ("ff", self.ff),
            ("fb", self.fb),
            ("g_i", self.g_i),
        ] {
            writeln!(f, "   {name}: {value:.2}")?;
        }
        Ok(())
    }
}

/// Mean with the reference summation order: the first element plus a
/// pairwise (8-way unrolled) sum of the rest.
pub(crate) fn mean(xs: &[f64]) -> f64 {
    match xs.split_first() {
        None => 0.0,
        Some((first, rest)) => (first + pairwise_sum(rest)) / xs.len() as f64,
    }
}

fn pairwise_sum(xs: &[f64]) -> f64 {
    const BLOCK: usize = 128;
    let n = xs.len();
    if n < 8 {
        let mut res = 0.0;
        for x in xs {
            res += x;
        }
        res
    } else if n <= BLOCK {
        let mut r = [0.0f64; 8];
        r.copy_from_slice(&xs[..8]);
        let whole = n - n % 8;
        let mut i = 8;
        while i < whole {
            for (j, acc) in r.iter_mut().enumerate() {
                *acc += xs[i + j];
            }
            i += 8;
        }
        let mut res = ((r[0] + r[1]) + (r[2] + r[3])) + ((r[4] + r[5]) + (r[6] + r[7]));
        for x in &xs[whole..] {
            res += x;
        }
        res
    } else {
        let mut half = n / 2;
        half -= half % 8;
        pairwise_sum(&xs[..half]) + pairwise_sum(&xs[half..])
    }
}

/// Layer-level variables that can be recorded every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LayerField {
    GcI,
    Ffi,
    Fbi,
    AvgAct,
}

impl LayerField {
    pub const ALL: [LayerField; 4] = [
        LayerField::GcI,
        LayerField::Ffi,
        LayerField::Fbi,
        LayerField::AvgAct,
    ];
}

impl TraceField for LayerField {
    fn name(self) -> &'static str {
        match self {
            LayerField::GcI => "gc_i",
            LayerField::Ffi => "ffi",
            LayerField::Fbi => "fbi",
            LayerField::AvgAct => "avg_act",
        }
    }
}

impl FromStr for LayerField {
    type Err = LeabraError;

    fn from_str(s: &str) -> Result<Self> {
        LayerField::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| LeabraError::UnknownField(s.to_string()))
    }
}

/// A population of units sharing FFFB inhibition.
///
/// The unit count is fixed at construction.
#[derive(Debug, Clone)]
pub struct Layer {
    name: Option<String>,
    genre: Genre,
    spec: SharedLayerSpec,
    unit_spec: SharedUnitSpec,
    units: Vec<Unit>,

    /// Total inhibitory conductance.
    pub gc_i: f64,
    /// Feed-forward inhibition.
    pub ffi: f64,
    /// Feedback inhibition.
    pub fbi: f64,

    /// Mean unit activity, updated after every cycle.
    pub avg_act: f64,
    pub avg_act_p_eff: f64,
    avg_act_p: f64,
    seen_plus_phase: bool,

    inbound: Vec<ConnectionId>,
    outbound: Vec<ConnectionId>,

    trace: Option<LayerTrace>,
}

impl Layer {
    pub fn new(size: usize, spec: SharedLayerSpec, unit_spec: SharedUnitSpec, genre: Genre) -> Self {
        let units = (0..size)
            .map(|_| Unit::new(unit_spec.clone(), genre))
            .collect();
        let targ_init = spec.read().avg_act_targ_init;
        Self {
            name: None,
            genre,
            spec,
            unit_spec,
            units,
            gc_i: 0.0,
            ffi: 0.0,
            fbi: 0.0,
            avg_act: 0.0,
            avg_act_p_eff: targ_init,
            avg_act_p: targ_init,
            seen_plus_phase: false,
            inbound: Vec::new(),
            outbound: Vec::new(),
            trace: None,
        }
    }

    /// A hidden layer with default specs.
    pub fn with_defaults(size: usize) -> Self {
        Self::new(
            size,
            SharedLayerSpec::default(),
            SharedUnitSpec::default(),
            Genre::Hidden,
        )
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn genre(&self) -> Genre {
        self.genre
    }

    pub fn spec(&self) -> &SharedLayerSpec {
        &self.spec
    }

    pub fn unit_spec(&self) -> &SharedUnitSpec {
        &self.unit_spec
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Mutable access to individual units. The slice length cannot change.
    pub fn units_mut(&mut self) -> &mut [Unit] {
        &mut self.units
    }

    /// Start a new trial: reset units, decay `ffi` and `fbi`.
    pub fn trial_init(&mut self) {
        let spec = self.spec.clone();
        let spec = spec.read();
        spec.trial_init(self);
    }

    /// Activity of each unit, in unit order.
    pub fn activities(&self) -> Vec<f64> {
        self.units.iter().map(|u| u.act).collect()
    }

    /// Excitatory conductance of each unit, in unit order.
    pub fn g_e(&self) -> Vec<f64> {
        self.units.iter().map(|u| u.g_e).collect()
    }

    fn check_len(&self, actual: usize) -> Result<()> {
        if actual != self.units.len() {
            return Err(LeabraError::LengthMismatch {
                expected: self.units.len(),
                actual,
            });
        }
        Ok(())
    }

    /// Clamp each unit's activity to the matching value.
    pub fn force_activity(&mut self, activities: &[f64]) -> Result<()> {
        self.check_len(activities.len())?;
        if let Some(u) = self.units.iter().find(|u| !u.pending_inputs().is_empty()) {
            return Err(LeabraError::PendingInputs {
                pending: u.pending_inputs().len(),
            });
        }
        let spec = self.unit_spec.clone();
        let spec = spec.read();
        for (u, &act) in self.units.iter_mut().zip(activities) {
            u.force_activity_with(&spec, act)?;
        }
        Ok(())
    }

    /// Release every forced unit.
    pub fn release_activity(&mut self) {
        for u in &mut self.units {
            u.release_activity();
        }
    }

    /// Queue one excitatory input per unit.
    pub fn add_excitatory(&mut self, inputs: &[f64]) -> Result<()> {
        self.check_len(inputs.len())?;
        if self.units.iter().any(Unit::is_forced) {
            return Err(LeabraError::ForcedUnitInput);
        }
        for (u, &net_raw) in self.units.iter_mut().zip(inputs) {
            u.add_excitatory(net_raw)?;
        }
        Ok(())
    }

    pub fn cycle(&mut self, phase: Phase) {
        let spec = self.spec.clone();
        let spec = spec.read();
        spec.cycle(self, phase);
    }

    /// Store each unit's activity as its minus-phase activity.
    pub fn end_minus_phase(&mut self) {
        for u in &mut self.units {
            u.act_m = u.act;
        }
    }

    /// Fold this trial's activity into the expected plus-phase average.
    pub fn end_plus_phase(&mut self) {
        let spec = self.spec.clone();
        let spec = spec.read();
        spec.update_avg_act_p(self);
    }

    /// Trial-level long-term average update for every unit.
    pub fn update_avg_l(&mut self) {
        let spec = self.unit_spec.clone();
        let spec = spec.read();
        for u in &mut self.units {
            spec.update_avg_l(u);
        }
    }

    pub fn connect_inbound(&mut self, id: ConnectionId) {
        self.inbound.push(id);
    }

    pub fn connect_outbound(&mut self, id: ConnectionId) {
        self.outbound.push(id);
    }

    /// Connections this layer receives from.
    pub fn inbound(&self) -> &[ConnectionId] {
        &self.inbound
    }

    /// Connections this layer sends to.
    pub fn outbound(&self) -> &[ConnectionId] {
        &self.outbound
    }

    pub fn attach_trace(&mut self, fields: &[LayerField]) {
        self.trace = Some(LayerTrace::new(fields));
    }

    pub fn attach_unit_traces(&mut self, fields: &[UnitField]) {
        for u in &mut self.units {
            u.attach_trace(fields);
        }
    }

    pub fn trace(&self) -> Option<&LayerTrace> {
        self.trace.as_ref()
    }

    pub fn field(&self, field: LayerField) -> f64 {
        match field {
            LayerField::GcI => self.gc_i,
            LayerField::Ffi => self.ffi,
            LayerField::Fbi => self.fbi,
            LayerField::AvgAct => self.avg_act,
        }
    }

    fn record(&mut self) {
        let Some(mut trace) = self.trace.take() else {
            return;
        };
        trace.push_with(|f| self.field(f));
        self.trace = Some(trace);
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spec.read())?;
        writeln!(f, "State:")?;
        for (name, value) in [("gc_i", self.gc_i), ("fbi", self.fbi), ("ffi", self.ffi)] {
            writeln!(f, "   {name}: {value:.2}")?;
        }
        Ok(())
    }
}
