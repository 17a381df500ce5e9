//! Canned two-layer FFFB scenario.
//!
//! A clamped source layer drives a destination layer through a one-to-one
//! projection. The input pattern is clamped for a window of cycles and the
//! source is clamped to zero outside it. This is the standard check of unit
//! and inhibition dynamics, and what the binaries and benches run.

use hashbrown::HashMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LeabraError, Result};
use crate::layer::{ConnectionId, Layer, LayerSpec, SharedLayerSpec};
use crate::observer::{LayerAdapter, LayerSnapshot, TraceField};
use crate::options::{OptionValue, Spec};
use crate::projection::{Pattern, Projection, ProjectionSpec};
use crate::unit::{Genre, Phase, SharedUnitSpec, UnitField, UnitSpec};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct ScenarioConfig {
    /// Units per layer.
    pub size: usize,
    pub cycles: usize,
    /// First cycle with the pattern clamped on the source layer.
    pub input_start: usize,
    /// First cycle after the pattern is released.
    pub input_end: usize,
    /// Source activities while the input is on. Repeated to fill the layer.
    pub pattern: Vec<f64>,
    /// Unit options applied on top of the scenario defaults.
    pub unit: HashMap<String, OptionValue>,
    /// Layer options applied on top of the scenario defaults.
    pub layer: HashMap<String, OptionValue>,
    pub projection: ProjectionSpec,
    /// Unit fields recorded on the destination layer, by name.
    pub record: Vec<String>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            size: 10,
            cycles: 200,
            input_start: 10,
            input_end: 160,
            pattern: vec![1.0, 0.0],
            unit: HashMap::new(),
            layer: HashMap::new(),
            projection: ProjectionSpec {
                pattern: Pattern::OneToOne,
                rnd_mean: 1.0,
                rnd_var: 0.0,
                ..ProjectionSpec::default()
            },
            record: UnitField::DEFAULT
                .iter()
                .map(|f| f.name().to_string())
                .collect(),
        }
    }
}

impl ScenarioConfig {
    pub fn unit_spec(&self) -> Result<UnitSpec> {
        let mut spec = UnitSpec::default();
        spec.g_bar_e = 0.3;
        spec.g_bar_l = 0.3;
        spec.g_bar_i = 1.0;
        spec.act_thr = 0.5;
        spec.act_gain = 40.0;
        spec.act_sd = 0.01;
        spec.noisy_act = true;
        spec.adapt_on = true;
        for (name, value) in &self.unit {
            spec.set_option(name, *value)?;
        }
        spec.validate()?;
        Ok(spec)
    }

    pub fn layer_spec(&self) -> Result<LayerSpec> {
        let mut spec = LayerSpec::default();
        spec.g_i = 0.4;
        spec.ff = 1.0;
        spec.fb = 0.5;
        for (name, value) in &self.layer {
            spec.set_option(name, *value)?;
        }
        spec.validate()?;
        Ok(spec)
    }

    pub fn record_fields(&self) -> Result<Vec<UnitField>> {
        self.record
            .iter()
            .map(|name| name.parse::<UnitField>())
            .collect()
    }

    #[cfg(feature = "serde")]
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| LeabraError::Config(e.to_string()))
    }
}

/// Built scenario: both layers, their projection and the input schedule.
#[derive(Debug, Clone)]
pub struct Scenario {
    config: ScenarioConfig,
    pub src: Layer,
    pub dst: Layer,
    pub projection: Projection,
    cycle: usize,
}

impl Scenario {
    /// Both layers share one layer spec and one unit spec.
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        if config.pattern.is_empty() {
            return Err(LeabraError::Config("input pattern is empty".to_string()));
        }
        if config.input_start > config.input_end {
            return Err(LeabraError::Config(
                "input window ends before it starts".to_string(),
            ));
        }
        let unit_spec = SharedUnitSpec::new(config.unit_spec()?);
        let layer_spec = SharedLayerSpec::new(config.layer_spec()?);
        unit_spec.read().prebuild();

        let mut src = Layer::new(config.size, layer_spec.clone(), unit_spec.clone(), Genre::Input)
            .with_name("src");
        let mut dst = Layer::new(config.size, layer_spec, unit_spec, Genre::Hidden).with_name("dst");
        dst.attach_unit_traces(&config.record_fields()?);

        let projection =
            Projection::connect(ConnectionId(0), &mut src, &mut dst, config.projection.clone())?;

        debug!(
            size = config.size,
            cycles = config.cycles,
            "two-layer scenario ready"
        );
        Ok(Self {
            config,
            src,
            dst,
            projection,
            cycle: 0,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Cycles run so far.
    pub fn cycle_index(&self) -> usize {
        self.cycle
    }

    /// Source activities clamped at cycle `t`.
    pub fn input_at(&self, t: usize) -> Vec<f64> {
        if (self.config.input_start..self.config.input_end).contains(&t) {
            self.config
                .pattern
                .iter()
                .copied()
                .cycle()
                .take(self.config.size)
                .collect()
        } else {
            vec![0.0; self.config.size]
        }
    }

    /// Clamp the source, cycle it, send through the projection, cycle the
    /// destination.
    pub fn step(&mut self) -> Result<()> {
        let input = self.input_at(self.cycle);
        self.src.force_activity(&input)?;
        self.src.cycle(Phase::Minus);
        self.projection.cycle(&self.src, &mut self.dst)?;
        self.dst.cycle(Phase::Minus);
        self.cycle += 1;
        Ok(())
    }

    /// Run the remaining cycles.
    pub fn run(&mut self) -> Result<()> {
        while self.cycle < self.config.cycles {
            self.step()?;
        }
        info!(
            cycles = self.cycle,
            dst_avg_act = self.dst.avg_act,
            "scenario finished"
        );
        Ok(())
    }

    pub fn snapshot(&self) -> ScenarioSnapshot {
        ScenarioSnapshot {
            cycles: self.cycle,
            src: LayerAdapter::new(&self.src).snapshot(),
            dst: LayerAdapter::new(&self.dst).snapshot(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScenarioSnapshot {
    pub cycles: usize,
    pub src: LayerSnapshot,
    pub dst: LayerSnapshot,
}
