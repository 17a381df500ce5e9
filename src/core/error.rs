use thiserror::Error;

/// Errors raised by spec construction and by unit/layer preconditions.
///
/// Numerical edge cases (querying the activation table outside its sampled
/// domain) are never errors; they have defined fallbacks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LeabraError {
    /// A spec was given an option name it does not recognize.
    #[error("the `{name}` parameter does not exist on {spec}")]
    UnknownOption { spec: &'static str, name: String },

    /// A flag option was given a number, or a numeric option a flag.
    #[error("option `{name}` expects a {expected} value")]
    OptionType {
        name: String,
        expected: &'static str,
    },

    #[error("option `{name}` is invalid: {reason}")]
    InvalidOption { name: &'static str, reason: &'static str },

    /// `add_excitatory` was called on a unit whose activity is forced.
    #[error("cannot add excitatory input to a unit with forced activity")]
    ForcedUnitInput,

    /// `force_activity` was called while excitatory inputs were queued.
    #[error("cannot force activity while {pending} excitatory inputs are pending")]
    PendingInputs { pending: usize },

    #[error("expected {expected} values (one per unit), got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("unknown trace field `{0}`")]
    UnknownField(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = core::result::Result<T, LeabraError>;
