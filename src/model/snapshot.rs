//! Point-in-time copies of a model's observable values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fault::FaultSet;
use crate::record::Record;

use super::Time;

/// State and active faults of one function at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSnapshot {
    /// Internal state values.
    pub state: Record,
    /// Active fault modes.
    pub faults: FaultSet,
}

/// Every flow's attributes and every function's state and faults, keyed by
/// name, as observed at `time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Tick at which the snapshot was taken.
    pub time: Time,
    /// Flow attributes by flow name.
    pub flows: BTreeMap<String, Record>,
    /// Function state and faults by function name.
    pub functions: BTreeMap<String, FunctionSnapshot>,
}

impl ModelSnapshot {
    /// Stable content hash of the snapshot's values (the time is excluded).
    ///
    /// Two snapshots with equal flow and function values hash identically,
    /// regardless of the process or platform that produced them.
    #[must_use]
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"flows");
        for (name, record) in &self.flows {
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            record.hash_into(&mut hasher);
        }
        hasher.update(b"functions");
        for (name, function) in &self.functions {
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            function.state.hash_into(&mut hasher);
            hasher.update(&(function.faults.len() as u64).to_le_bytes());
            for mode in function.faults.iter() {
                hasher.update(&(mode.len() as u64).to_le_bytes());
                hasher.update(mode.as_bytes());
            }
        }
        hasher.finalize()
    }

    /// Functions whose fault set is not nominal, with their active modes.
    pub fn faulty_functions(&self) -> BTreeMap<String, FaultSet> {
        self.functions
            .iter()
            .filter(|(_, f)| !f.faults.is_nominal())
            .map(|(name, f)| (name.clone(), f.faults.clone()))
            .collect()
    }
}
