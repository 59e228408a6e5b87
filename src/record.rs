//! Schema-fixed field maps.
//!
//! A [`Record`] is declared once by the model author (field names and initial
//! values) and its schema never changes afterwards: writes to unknown fields
//! or writes of the wrong [`ValueKind`] are rejected instead of silently
//! creating new attributes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::{Value, ValueKind};

/// Errors raised by block hooks while reading or writing model data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("unknown field '{field}'")]
    UnknownField {
        field: String,
    },

    #[error("field '{field}' holds {expected}, got {actual}")]
    KindMismatch {
        field: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("unknown port '{port}'")]
    UnknownPort {
        port: String,
    },

    #[error("fault mode '{mode}' is not in the catalog")]
    UnknownFaultMode {
        mode: String,
    },

    #[error("{0}")]
    Custom(String),
}

impl FieldError {
    /// Creates a free-form error for block authors.
    #[must_use]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

/// A named set of scalar fields with a fixed schema.
///
/// # Examples
///
/// ```
/// use faultprop::Record;
///
/// let mut water = Record::new().with("rate", 1.0).with("effort", 1.0);
/// assert!(water.set("rate", 2.0).unwrap());
/// assert!(water.set("flowrate", 2.0).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field with its initial value. Redeclaring a field replaces it.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, initial: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), initial.into());
        self
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the schema declares `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Fields with their values, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Reads a field of any kind.
    ///
    /// # Errors
    ///
    /// `UnknownField` if the schema has no field `name`.
    pub fn get(&self, name: &str) -> Result<&Value, FieldError> {
        self.fields.get(name).ok_or_else(|| FieldError::UnknownField {
            field: name.to_string(),
        })
    }

    /// Reads a numeric field as `f64` (int fields are widened).
    pub fn float(&self, name: &str) -> Result<f64, FieldError> {
        let value = self.get(name)?;
        value.as_float().ok_or(FieldError::KindMismatch {
            field: name.to_string(),
            expected: ValueKind::Float,
            actual: value.kind(),
        })
    }

    /// Reads an integer field.
    pub fn int(&self, name: &str) -> Result<i64, FieldError> {
        let value = self.get(name)?;
        value.as_int().ok_or(FieldError::KindMismatch {
            field: name.to_string(),
            expected: ValueKind::Int,
            actual: value.kind(),
        })
    }

    /// Reads a boolean field.
    pub fn bool(&self, name: &str) -> Result<bool, FieldError> {
        let value = self.get(name)?;
        value.as_bool().ok_or(FieldError::KindMismatch {
            field: name.to_string(),
            expected: ValueKind::Bool,
            actual: value.kind(),
        })
    }

    /// Reads a text field.
    pub fn text(&self, name: &str) -> Result<&str, FieldError> {
        let value = self.get(name)?;
        value.as_text().ok_or(FieldError::KindMismatch {
            field: name.to_string(),
            expected: ValueKind::Text,
            actual: value.kind(),
        })
    }

    /// Writes a declared field, returning whether the stored value changed.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<bool, FieldError> {
        let value = value.into();
        let slot = self.fields.get_mut(name).ok_or_else(|| FieldError::UnknownField {
            field: name.to_string(),
        })?;
        if slot.kind() != value.kind() {
            return Err(FieldError::KindMismatch {
                field: name.to_string(),
                expected: slot.kind(),
                actual: value.kind(),
            });
        }
        if *slot == value {
            return Ok(false);
        }
        *slot = value;
        Ok(true)
    }

    /// Names of fields present in both records whose values differ.
    pub fn changed_fields<'a>(&'a self, other: &'a Self) -> impl Iterator<Item = &'a str> + 'a {
        self.fields.iter().filter_map(move |(name, value)| match other.fields.get(name) {
            Some(theirs) if theirs != value => Some(name.as_str()),
            _ => None,
        })
    }

    /// Feeds a canonical encoding of the record into `hasher`.
    pub(crate) fn hash_into(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&(self.fields.len() as u64).to_le_bytes());
        for (name, value) in &self.fields {
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            match value {
                Value::Bool(v) => hasher.update(&[0, u8::from(*v)]),
                Value::Int(v) => hasher.update(&[1]).update(&v.to_le_bytes()),
                Value::Float(v) => hasher.update(&[2]).update(&v.to_bits().to_le_bytes()),
                Value::Text(v) => hasher
                    .update(&[3])
                    .update(&(v.len() as u64).to_le_bytes())
                    .update(v.as_bytes()),
            };
        }
    }

    /// Sum of per-field deviations against another record with the same schema.
    pub fn deviation(&self, other: &Self) -> f64 {
        self.fields
            .iter()
            .filter_map(|(name, value)| other.fields.get(name).map(|theirs| value.deviation(theirs)))
            .sum()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
