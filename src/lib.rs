//! # leabra
//!
//! Rate-coded Leabra point neurons and layers with FFFB inhibition.
//!
//! Units integrate excitatory input into a membrane potential and fire
//! through a noise-smoothed `x / (x + 1)` rate code. Layers run their units
//! in lockstep and share one feed-forward/feedback inhibitory conductance.
//! Parameters live in shared, versioned spec handles so many units or layers
//! can be retuned at once.
//!
//! ## Quick Start
//!
//! ```
//! use leabra::prelude::*;
//!
//! let mut layer = Layer::with_defaults(3);
//! for _ in 0..50 {
//!     layer.add_excitatory(&[0.0, 0.5, 1.0])?;
//!     layer.cycle(Phase::Minus);
//! }
//! let acts = layer.activities();
//! assert!(acts[2] > acts[0]);
//! # Ok::<(), LeabraError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): serialization of specs and snapshots, JSON options
//! - `parallel`: update a layer's units on the rayon pool
//!
//! ## Modules
//!
//! - [`unit`]: point-neuron dynamics and the unit spec
//! - [`layer`]: layers, FFFB inhibition, trial bookkeeping
//! - [`projection`]: fixed-weight drivers between layers
//! - [`scenario`]: the two-layer FFFB scenario run by the binaries
//! - [`activation`]: the noisy `xx1` lookup table
//! - [`options`]: named options and shared spec handles
//! - [`observer`]: traces and read-only snapshots

#[path = "core/activation.rs"]
pub mod activation;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/options.rs"]
pub mod options;

#[path = "core/unit.rs"]
pub mod unit;

#[path = "core/layer.rs"]
pub mod layer;

#[path = "core/projection.rs"]
pub mod projection;

#[path = "core/scenario.rs"]
pub mod scenario;

pub mod observer;

/// Prelude module for convenient imports.
///
/// ```
/// use leabra::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::LeabraError;
    pub use crate::layer::{ConnectionId, Layer, LayerField, LayerSpec, SharedLayerSpec};
    pub use crate::observer::{LayerAdapter, LayerSnapshot, Trace, UnitAdapter, UnitSnapshot};
    pub use crate::options::{OptionValue, Spec, SpecHandle};
    pub use crate::projection::{Pattern, Projection, ProjectionSpec};
    pub use crate::scenario::{Scenario, ScenarioConfig, ScenarioSnapshot};
    pub use crate::unit::{
        Genre, Phase, SharedUnitSpec, ThresholdMode, Unit, UnitField, UnitSpec,
    };
}
