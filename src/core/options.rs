use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{LeabraError, Result};

/// A single configuration value: specs only carry numbers and on/off flags.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum OptionValue {
    Number(f64),
    Flag(bool),
}

impl OptionValue {
    pub fn as_number(self, name: &str) -> Result<f64> {
        match self {
            OptionValue::Number(v) => Ok(v),
            OptionValue::Flag(_) => Err(LeabraError::OptionType {
                name: name.to_string(),
                expected: "numeric",
            }),
        }
    }

    pub fn as_flag(self, name: &str) -> Result<bool> {
        match self {
            OptionValue::Flag(v) => Ok(v),
            OptionValue::Number(_) => Err(LeabraError::OptionType {
                name: name.to_string(),
                expected: "boolean",
            }),
        }
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Number(v)
    }
}

impl From<f32> for OptionValue {
    fn from(v: f32) -> Self {
        OptionValue::Number(v as f64)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Number(v as f64)
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Flag(v)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Number(v) => write!(f, "{v}"),
            OptionValue::Flag(v) => write!(f, "{v}"),
        }
    }
}

/// A parameter bundle configured by a closed set of named options.
///
/// Implementors enumerate every recognized name in `OPTION_NAMES`; anything
/// else is rejected by `set_option` with [`LeabraError::UnknownOption`].
pub trait Spec: Clone + Default {
    /// Human-readable kind, used in error messages.
    const KIND: &'static str;

    const OPTION_NAMES: &'static [&'static str];

    fn set_option(&mut self, name: &str, value: OptionValue) -> Result<()>;

    fn get_option(&self, name: &str) -> Option<OptionValue>;

    fn validate(&self) -> Result<()>;

    /// Drop anything derived from the current parameter values.
    fn invalidate_caches(&mut self) {}

    /// Build a spec from defaults overridden by `options`.
    fn from_options<I, K, V>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        let mut spec = Self::default();
        for (name, value) in options {
            spec.set_option(name.as_ref(), value.into())?;
        }
        spec.validate()?;
        Ok(spec)
    }

    /// Build a spec from a JSON object of option names to values.
    #[cfg(feature = "serde")]
    fn from_json(text: &str) -> Result<Self> {
        let options: hashbrown::HashMap<String, OptionValue> =
            serde_json::from_str(text).map_err(|e| LeabraError::Config(e.to_string()))?;
        Self::from_options(options)
    }

    fn options(&self) -> Vec<(&'static str, OptionValue)> {
        Self::OPTION_NAMES
            .iter()
            .filter_map(|name| self.get_option(name).map(|v| (*name, v)))
            .collect()
    }
}

/// Shared, versioned handle to a spec.
///
/// Many units (or layers) hold clones of the same handle, so a mutation made
/// through [`SpecHandle::update`] is seen by every holder. Mutation must only
/// happen between cycles; the lock protects memory safety, not cycle
/// atomicity.
#[derive(Debug)]
pub struct SpecHandle<T> {
    inner: Arc<RwLock<T>>,
    version: Arc<AtomicU64>,
}

impl<T> Clone for SpecHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            version: Arc::clone(&self.version),
        }
    }
}

impl<T: Spec> Default for SpecHandle<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Spec> From<T> for SpecHandle<T> {
    fn from(spec: T) -> Self {
        Self::new(spec)
    }
}

impl<T: Spec> SpecHandle<T> {
    pub fn new(spec: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(spec)),
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of successful updates applied so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Mutate the shared spec.
    ///
    /// The change is applied to a copy and validated first; on error the
    /// shared spec is left untouched. Derived caches are dropped.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        self.try_update(|spec| Ok(f(spec)))
    }

    /// Like [`SpecHandle::update`], for mutations that can themselves fail.
    pub fn try_update<R>(&self, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        let out = f(&mut next)?;
        next.validate()?;
        next.invalidate_caches();
        *guard = next;
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(out)
    }

    pub fn set_option(&self, name: &str, value: impl Into<OptionValue>) -> Result<()> {
        let value = value.into();
        self.try_update(|spec| spec.set_option(name, value))
    }

    /// Whether both handles point at the same shared spec.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Copy of the current spec, detached from this handle.
    pub fn snapshot(&self) -> T {
        self.read().clone()
    }
}

pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(LeabraError::InvalidOption {
            name,
            reason: "must be finite and > 0",
        });
    }
    Ok(())
}

pub(crate) fn require_finite(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(LeabraError::InvalidOption {
            name,
            reason: "must be finite",
        });
    }
    Ok(())
}
