use core::hash::Hash;

use hashbrown::HashMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::layer::{Layer, LayerField};
use crate::unit::{Genre, Unit, UnitField};

/// A named state variable that can be recorded every cycle.
pub trait TraceField: Copy + Eq + Hash {
    fn name(self) -> &'static str;
}

/// Per-cycle recording of a fixed set of fields.
///
/// Each field gets an append-only series; all series have the same length.
/// Recording is opt-in (attach a trace to a unit or layer) so long runs do
/// not grow memory unless asked to.
#[derive(Debug, Clone)]
pub struct Trace<F: TraceField> {
    fields: Vec<F>,
    series: HashMap<F, Vec<f64>>,
    len: usize,
}

pub type UnitTrace = Trace<UnitField>;
pub type LayerTrace = Trace<LayerField>;

impl<F: TraceField> Trace<F> {
    pub fn new(fields: &[F]) -> Self {
        let mut ordered = Vec::with_capacity(fields.len());
        for &f in fields {
            if !ordered.contains(&f) {
                ordered.push(f);
            }
        }
        let series = ordered.iter().map(|&f| (f, Vec::new())).collect();
        Self {
            fields: ordered,
            series,
            len: 0,
        }
    }

    /// Recorded fields, in the order they were requested.
    pub fn fields(&self) -> &[F] {
        &self.fields
    }

    /// Number of recorded cycles.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, field: F) -> Option<&[f64]> {
        self.series.get(&field).map(Vec::as_slice)
    }

    pub fn by_name(&self, name: &str) -> Option<&[f64]> {
        let field = self.fields.iter().find(|f| f.name() == name)?;
        self.get(*field)
    }

    pub fn push_with(&mut self, mut value: impl FnMut(F) -> f64) {
        for &f in &self.fields {
            if let Some(series) = self.series.get_mut(&f) {
                series.push(value(f));
            }
        }
        self.len += 1;
    }

    pub fn clear(&mut self) {
        for series in self.series.values_mut() {
            series.clear();
        }
        self.len = 0;
    }

    /// `(name, series)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[f64])> + '_ {
        self.fields
            .iter()
            .filter_map(|&f| self.get(f).map(|s| (f.name(), s)))
    }

    pub fn to_named(&self) -> NamedSeries {
        NamedSeries {
            series: self
                .iter()
                .map(|(name, values)| (name.to_string(), values.to_vec()))
                .collect(),
        }
    }
}

/// Trace contents keyed by field name, ready for serialization.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NamedSeries {
    pub series: Vec<(String, Vec<f64>)>,
}

/// A read-only view of one unit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnitSnapshot {
    pub genre: Genre,
    pub forced: Option<f64>,
    pub net: f64,
    pub g_e: f64,
    pub i_net: f64,
    pub v_m: f64,
    pub v_m_eq: f64,
    pub act: f64,
    pub act_m: f64,
    pub adapt: f64,
    pub avg_s_eff: f64,
    pub avg_m: f64,
    pub avg_l: f64,
    pub avg_l_lrn: f64,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub trace: Option<NamedSeries>,
}

/// A read-only view of a layer and its units.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayerSnapshot {
    pub name: Option<String>,
    pub genre: Genre,
    pub cycle_count: u64,
    pub gc_i: f64,
    pub ffi: f64,
    pub fbi: f64,
    pub avg_act: f64,
    pub avg_act_p_eff: f64,
    pub units: Vec<UnitSnapshot>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub trace: Option<NamedSeries>,
}

pub struct UnitAdapter<'a> {
    unit: &'a Unit,
}

impl<'a> UnitAdapter<'a> {
    pub fn new(unit: &'a Unit) -> Self {
        Self { unit }
    }

    pub fn snapshot(&self) -> UnitSnapshot {
        let u = self.unit;
        UnitSnapshot {
            genre: u.genre,
            forced: u.forced_activity(),
            net: u.net(),
            g_e: u.g_e,
            i_net: u.i_net,
            v_m: u.v_m,
            v_m_eq: u.v_m_eq,
            act: u.act,
            act_m: u.act_m,
            adapt: u.adapt,
            avg_s_eff: u.avg_s_eff,
            avg_m: u.avg_m,
            avg_l: u.avg_l,
            avg_l_lrn: u.avg_l_lrn(),
            trace: u.trace().map(Trace::to_named),
        }
    }
}

pub struct LayerAdapter<'a> {
    layer: &'a Layer,
}

impl<'a> LayerAdapter<'a> {
    pub fn new(layer: &'a Layer) -> Self {
        Self { layer }
    }

    pub fn snapshot(&self) -> LayerSnapshot {
        let l = self.layer;
        LayerSnapshot {
            name: l.name().map(str::to_string),
            genre: l.genre(),
            cycle_count: l.spec().read().cycle_count(),
            gc_i: l.gc_i,
            ffi: l.ffi,
            fbi: l.fbi,
            avg_act: l.avg_act,
            avg_act_p_eff: l.avg_act_p_eff,
            units: l
                .units()
                .iter()
                .map(|u| UnitAdapter::new(u).snapshot())
                .collect(),
            trace: l.trace().map(Trace::to_named),
        }
    }
}
