//! Version-tracking snapshot of an `OpenStackVersion` object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conditions::ConditionSet;

/// The version-tracking fields one resume decision runs on.
///
/// Extracted from a single object read and immutable afterwards, so a
/// decision never mixes two observations. Extraction is infallible: missing
/// fields decode to empty/`None` exactly like the controllers' unstructured
/// reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    pub target_version: String,
    pub available_version: Option<String>,
    pub deployed_version: Option<String>,
    /// Types of every condition not exactly `True`, in document order.
    pub not_ready_conditions: Vec<String>,
}

impl VersionSnapshot {
    pub fn from_object(obj: &Value) -> Self {
        let field = |ptr: &str| obj.pointer(ptr).and_then(Value::as_str).map(str::to_string);
        VersionSnapshot {
            target_version: field("/spec/targetVersion").unwrap_or_default(),
            available_version: field("/status/availableVersion"),
            deployed_version: field("/status/deployedVersion"),
            not_ready_conditions: ConditionSet::from_object(obj).not_ready_types(),
        }
    }
}

/// Terminal result of one bounded condition wait.
///
/// A timeout is an outcome (`met == false`, `reason == "Timeout"`), not an
/// error; only cancellation and store failures abort a wait.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WaitOutcome {
    pub met: bool,
    pub message: String,
    pub reason: String,
}
