//! Fault modes, per-function fault catalogs and active fault sets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the nominal (fault-free) mode.
pub const NOMINAL: &str = "nom";

/// A named abnormal condition of a function block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultMode {
    /// Occurrence rate.
    pub rate: f64,
    /// Cost to repair the fault.
    pub repair_cost: f64,
}

impl FaultMode {
    /// Creates a fault mode from its occurrence rate and repair cost.
    #[must_use]
    pub const fn new(rate: f64, repair_cost: f64) -> Self {
        Self { rate, repair_cost }
    }
}

/// Mapping from fault-mode name to its rate and repair cost.
pub type FaultCatalog = BTreeMap<String, FaultMode>;

/// The set of fault modes currently active in a function block.
///
/// The set is nominal exactly when no fault mode is present: inserting any
/// mode removes `nom`, and inserting [`NOMINAL`] itself is a no-op. Modes are
/// never removed by the propagation engine; only block authors (or a model
/// reset) may clear them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaultSet {
    modes: BTreeSet<String>,
}

impl FaultSet {
    /// Creates the nominal set `{nom}`.
    #[must_use]
    pub fn nominal() -> Self {
        Self::default()
    }

    /// Returns true if no fault mode is active.
    pub fn is_nominal(&self) -> bool {
        self.modes.is_empty()
    }

    /// Inserts a mode; returns true if the set changed.
    pub fn insert(&mut self, mode: impl Into<String>) -> bool {
        let mode = mode.into();
        if mode == NOMINAL {
            return false;
        }
        self.modes.insert(mode)
    }

    /// Removes a mode; returns true if it was present.
    pub fn remove(&mut self, mode: &str) -> bool {
        self.modes.remove(mode)
    }

    /// Whether `mode` is active; [`NOMINAL`] is contained exactly when the set is nominal.
    pub fn contains(&self, mode: &str) -> bool {
        if mode == NOMINAL {
            return self.is_nominal();
        }
        self.modes.contains(mode)
    }

    /// Number of active (non-nominal) fault modes.
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Active fault modes in sorted order; empty when nominal.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.modes.iter().map(String::as_str)
    }

    pub(crate) fn clear(&mut self) {
        self.modes.clear();
    }
}

impl fmt::Display for FaultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nominal() {
            return write!(f, "{{{NOMINAL}}}");
        }
        let modes: Vec<&str> = self.iter().collect();
        write!(f, "{{{}}}", modes.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for FaultSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::nominal();
        for mode in iter {
            set.insert(mode);
        }
        set
    }
}
