//! Form value collection
//!
//! [`collect`] walks input elements in document order and builds a record
//! keyed by element name:
//!
//! - checkboxes contribute their value when checked and `false` otherwise
//! - a radio group contributes the value of its checked member, or nothing
//! - a name seen on several non-radio elements becomes a list, in order
//!
//! `false` never joins a list. A name that already holds a value ignores a
//! later unchecked checkbox, and a name holding `false` is overwritten by the
//! next present value.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::element::{InputElement, InputKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectOptions {
    /// Skip elements whose value is an empty string or an unchecked checkbox
    pub ignore_empty_values: bool,
    /// Skip disabled elements
    pub ignore_disabled: bool,
}

/// One collected value: `string | false | string[]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    Unchecked,
    List(Vec<String>),
}

impl FormValue {
    /// Empty strings and unchecked checkboxes
    pub fn is_falsy(&self) -> bool {
        match self {
            FormValue::Text(text) => text.is_empty(),
            FormValue::Unchecked => true,
            FormValue::List(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FormValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FormValue::List(items) => Some(items),
            _ => None,
        }
    }

    fn raw(element: &InputElement) -> Self {
        match element.kind {
            InputKind::Checkbox if !element.checked => FormValue::Unchecked,
            _ => FormValue::Text(element.value.clone()),
        }
    }
}

impl Serialize for FormValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FormValue::Text(text) => serializer.serialize_str(text),
            FormValue::Unchecked => serializer.serialize_bool(false),
            FormValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// Collected record, keyed by element name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    entries: BTreeMap<String, FormValue>,
}

impl FormValues {
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FormValue::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn set(&mut self, name: &str, value: FormValue) {
        self.entries.insert(name.to_string(), value);
    }

    fn append(&mut self, name: &str, value: FormValue) {
        let mut slot = match self.entries.entry(name.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
                return;
            }
            Entry::Occupied(slot) => slot,
        };

        let FormValue::Text(text) = value else {
            return;
        };

        let existing = slot.get_mut();
        match existing {
            FormValue::Unchecked => *existing = FormValue::Text(text),
            FormValue::Text(prev) => {
                let prev = std::mem::take(prev);
                *existing = FormValue::List(vec![prev, text]);
            }
            FormValue::List(items) => items.push(text),
        }
    }
}

impl Serialize for FormValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Collect the current values of `elements`. Never fails; elements that are
/// skipped are simply absent from the result.
pub fn collect(elements: &[InputElement], options: CollectOptions) -> FormValues {
    let mut values = FormValues::default();

    for element in elements {
        if element.name.is_empty() {
            continue;
        }

        let value = FormValue::raw(element);
        if options.ignore_empty_values && value.is_falsy() {
            continue;
        }
        if options.ignore_disabled && element.disabled {
            continue;
        }

        match element.kind {
            // Last checked radio wins if a group has more than one
            InputKind::Radio => {
                if element.checked {
                    values.set(&element.name, value);
                }
            }
            _ => values.append(&element.name, value),
        }
    }

    values
}
