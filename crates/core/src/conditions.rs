//! Status-condition model for the OpenStack CRDs.
//!
//! Conditions arrive as loosely-typed JSON under `status.conditions`. The
//! decode here follows the controllers' own convention: missing fields decode
//! to empty strings, and any status other than exactly `"True"`/`"False"`
//! reads as `Unknown`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tri-state condition status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConditionState {
    True,
    False,
    Unknown,
}

impl ConditionState {
    /// Total parse: anything but the exact literals maps to `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "True" => Self::True,
            "False" => Self::False,
            _ => Self::Unknown,
        }
    }

    pub fn is_true(self) -> bool {
        matches!(self, Self::True)
    }
}

impl fmt::Display for ConditionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// One entry of `status.conditions`. Identity is `type_` within one object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionState,
    pub reason: String,
    pub message: String,
}

impl Condition {
    /// Synthetic condition for objects that report nothing usable.
    pub fn synthetic(type_: &str, reason: &str, message: &str) -> Self {
        Self {
            type_: type_.to_string(),
            status: ConditionState::Unknown,
            reason: reason.to_string(),
            message: message.to_string(),
        }
    }
}

fn decode(entry: &Value) -> Option<Condition> {
    let map = entry.as_object()?;
    let field = |k: &str| map.get(k).and_then(Value::as_str).unwrap_or("").to_string();
    Some(Condition {
        type_: field("type"),
        status: ConditionState::parse(map.get("status").and_then(Value::as_str).unwrap_or("")),
        reason: field("reason"),
        message: field("message"),
    })
}

/// Conditions of one object, indexed by type for O(1) lookup.
///
/// Document order is preserved; when a type occurs more than once the first
/// occurrence wins and the type is recorded in [`duplicates`](Self::duplicates).
/// Non-object array entries are skipped but still counted by
/// [`raw_len`](Self::raw_len).
#[derive(Debug, Clone, Default)]
pub struct ConditionSet {
    items: Vec<Condition>,
    index: HashMap<String, usize>,
    duplicates: Vec<String>,
    raw_len: usize,
}

impl ConditionSet {
    /// Build from a raw `status.conditions` array.
    pub fn from_slice(entries: &[Value]) -> Self {
        let mut set = ConditionSet { raw_len: entries.len(), ..Default::default() };
        for entry in entries {
            let Some(cond) = decode(entry) else { continue };
            match set.index.get(&cond.type_) {
                Some(_) => {
                    if !set.duplicates.contains(&cond.type_) {
                        set.duplicates.push(cond.type_.clone());
                    }
                }
                None => {
                    set.index.insert(cond.type_.clone(), set.items.len());
                    set.items.push(cond);
                }
            }
        }
        set
    }

    /// Build from a whole object; a missing `status.conditions` yields an
    /// empty set.
    pub fn from_object(obj: &Value) -> Self {
        match obj.pointer("/status/conditions").and_then(Value::as_array) {
            Some(arr) => Self::from_slice(arr),
            None => ConditionSet::default(),
        }
    }

    /// First-occurrence lookup by condition type.
    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.index.get(type_).map(|&i| &self.items[i])
    }

    /// Distinct parsed conditions in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.items.iter()
    }

    /// Raw array length, counting skipped non-object entries.
    pub fn raw_len(&self) -> usize {
        self.raw_len
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Types whose status is exactly `True`, in document order.
    pub fn ready_types(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|c| c.status.is_true())
            .map(|c| c.type_.clone())
            .collect()
    }

    /// Conditions whose status is anything but `True` (`False` and `Unknown`
    /// alike), in document order. Never partitioned further.
    pub fn not_ready(&self) -> Vec<&Condition> {
        self.items.iter().filter(|c| !c.status.is_true()).collect()
    }

    /// Type names of [`not_ready`](Self::not_ready), in document order.
    pub fn not_ready_types(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|c| !c.status.is_true())
            .map(|c| c.type_.clone())
            .collect()
    }

    /// Types that occurred more than once, in first-seen order.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }
}
