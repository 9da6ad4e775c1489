//! Engine configuration.
//!
//! Settings travel as string [`Properties`] (set on the knowledge, copied into
//! each session, overridable per session) and are resolved into a typed
//! [`EngineConfig`] whenever a session fires.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ember_foundation::{Error, Result};

/// Property key selecting the fire mode.
pub const AGENDA_MODE: &str = "agenda-mode";
/// Property key for the per-`fire()` activation limit.
pub const MAX_ACTIVATIONS: &str = "max-activations";
/// Property key for the initial fact index capacity.
pub const INDEX_CAPACITY: &str = "index-capacity";

// =============================================================================
// Properties
// =============================================================================

/// Ordered string-keyed properties.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    /// Creates an empty property set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder form of [`Properties::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Returns a property value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Fire Mode
// =============================================================================

/// When rule-produced actions are applied during `fire()`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FireMode {
    /// Apply actions after every activation; abandon the rest of the agenda
    /// as soon as an insert is pending.
    #[default]
    Batch,
    /// Buffer the whole agenda's actions and apply them after every
    /// candidate rule has run.
    Continuous,
}

impl FromStr for FireMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BATCH" | "DEFAULT" => Ok(Self::Batch),
            "CONTINUOUS" => Ok(Self::Continuous),
            other => Err(Error::config(format!("unknown agenda mode: {other}"))),
        }
    }
}

impl fmt::Display for FireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch => write!(f, "BATCH"),
            Self::Continuous => write!(f, "CONTINUOUS"),
        }
    }
}

// =============================================================================
// Engine Config
// =============================================================================

/// Typed session configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Fire mode.
    pub mode: FireMode,
    /// Maximum rule activations per `fire()` call (kill switch).
    pub max_activations: usize,
    /// Initial key capacity of each committed fact index.
    pub index_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: FireMode::Batch,
            max_activations: 100_000,
            index_capacity: 16,
        }
    }
}

impl EngineConfig {
    /// Resolves a configuration from properties. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error for an unknown agenda mode or a value that
    /// does not parse as a non-negative integer.
    pub fn from_properties(properties: &Properties) -> Result<Self> {
        let defaults = Self::default();
        let mode = properties
            .get(AGENDA_MODE)
            .map_or(Ok(defaults.mode), str::parse)?;
        let max_activations = parse_count(properties, MAX_ACTIVATIONS, defaults.max_activations)?;
        let index_capacity = parse_count(properties, INDEX_CAPACITY, defaults.index_capacity)?;
        Ok(Self {
            mode,
            max_activations,
            index_capacity,
        })
    }

    /// Builder method to set the fire mode.
    #[must_use]
    pub fn with_mode(mut self, mode: FireMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder method to set the activation limit.
    #[must_use]
    pub fn with_max_activations(mut self, max: usize) -> Self {
        self.max_activations = max;
        self
    }

    /// Builder method to set the index capacity.
    #[must_use]
    pub fn with_index_capacity(mut self, capacity: usize) -> Self {
        self.index_capacity = capacity;
        self
    }

    /// Writes this configuration back as properties.
    #[must_use]
    pub fn to_properties(&self) -> Properties {
        Properties::new()
            .with(AGENDA_MODE, self.mode.to_string())
            .with(MAX_ACTIVATIONS, self.max_activations.to_string())
            .with(INDEX_CAPACITY, self.index_capacity.to_string())
    }
}

fn parse_count(properties: &Properties, key: &str, default: usize) -> Result<usize> {
    match properties.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("{key}: expected a non-negative integer, got {raw:?}"))),
    }
}
