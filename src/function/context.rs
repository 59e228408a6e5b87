//! The view a block hook gets of its own function and connected flows.

use std::collections::BTreeMap;

use crate::fault::{FaultCatalog, FaultSet};
use crate::flow::{Flow, FlowId};
use crate::model::Time;
use crate::record::{FieldError, Record};
use crate::value::Value;

/// Mutable access to one function's state, fault set and ported flows for the
/// duration of a single hook call.
///
/// Flows are reached through the function's declared port names, never by
/// global flow name, so a block can only touch what it is connected to.
pub struct BlockContext<'a> {
    pub(crate) time: Time,
    pub(crate) function: &'a str,
    pub(crate) state: &'a mut Record,
    pub(crate) faults: &'a mut FaultSet,
    pub(crate) catalog: &'a FaultCatalog,
    pub(crate) ports: &'a BTreeMap<String, FlowId>,
    pub(crate) flows: &'a mut [Flow],
}

impl BlockContext<'_> {
    /// Current simulation time.
    pub const fn time(&self) -> Time {
        self.time
    }

    /// Name of the function being updated.
    pub const fn function(&self) -> &str {
        self.function
    }

    /// Internal state of the function.
    pub fn state(&self) -> &Record {
        self.state
    }

    /// Mutable internal state; field kinds stay fixed.
    pub fn state_mut(&mut self) -> &mut Record {
        self.state
    }

    /// Active fault modes.
    pub fn faults(&self) -> &FaultSet {
        self.faults
    }

    /// Whether `mode` is active.
    pub fn has_fault(&self, mode: &str) -> bool {
        self.faults.contains(mode)
    }

    /// Whether any of `modes` is active.
    pub fn has_any_fault<'m>(&self, modes: impl IntoIterator<Item = &'m str>) -> bool {
        modes.into_iter().any(|m| self.faults.contains(m))
    }

    /// Whether no fault mode is active.
    pub fn is_nominal(&self) -> bool {
        self.faults.is_nominal()
    }

    /// Activates a fault mode from this function's catalog.
    ///
    /// Returns true if the mode was not already active.
    pub fn add_fault(&mut self, mode: &str) -> Result<bool, FieldError> {
        if !self.catalog.contains_key(mode) {
            return Err(FieldError::UnknownFaultMode {
                mode: mode.to_string(),
            });
        }
        Ok(self.faults.insert(mode))
    }

    /// Clears an active fault mode, for blocks that model their own repair.
    ///
    /// Returns true if the mode was active.
    pub fn remove_fault(&mut self, mode: &str) -> bool {
        self.faults.remove(mode)
    }

    fn port(&self, port: &str) -> Result<FlowId, FieldError> {
        self.ports.get(port).copied().ok_or_else(|| FieldError::UnknownPort {
            port: port.to_string(),
        })
    }

    /// Attributes of the flow connected at `port`.
    pub fn flow(&self, port: &str) -> Result<&Record, FieldError> {
        let id = self.port(port)?;
        Ok(self.flows[id.0].status())
    }

    /// Mutable attributes of the flow connected at `port`.
    pub fn flow_mut(&mut self, port: &str) -> Result<&mut Record, FieldError> {
        let id = self.port(port)?;
        Ok(self.flows[id.0].attributes_mut())
    }

    /// Reads a numeric attribute of the flow at `port`.
    pub fn read(&self, port: &str, attribute: &str) -> Result<f64, FieldError> {
        self.flow(port)?.float(attribute)
    }

    /// Writes an attribute of the flow at `port`; returns whether it changed.
    pub fn write(&mut self, port: &str, attribute: &str, value: impl Into<Value>) -> Result<bool, FieldError> {
        self.flow_mut(port)?.set(attribute, value)
    }
}
