//! Flows: named bundles of attributes shared between function blocks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Index of a flow within its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub(crate) usize);

impl FlowId {
    /// Position of the flow in model declaration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow#{}", self.0)
    }
}

/// A flow instance.
///
/// Holds its current attribute values and the values it was built with, so
/// that a model reset can restore it.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    name: String,
    attributes: Record,
    initial: Record,
}

impl Flow {
    pub(crate) fn new(name: String, attributes: Record) -> Self {
        Self {
            name,
            initial: attributes.clone(),
            attributes,
        }
    }

    /// Flow name, unique within its model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current attribute values.
    pub fn status(&self) -> &Record {
        &self.attributes
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut Record {
        &mut self.attributes
    }

    /// Attribute values at model construction.
    pub fn initial(&self) -> &Record {
        &self.initial
    }

    pub(crate) fn reset(&mut self) {
        self.attributes.clone_from(&self.initial);
    }
}
