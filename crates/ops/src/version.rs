//! Operations on the `OpenStackVersion` CR: status, target selection, the
//! condition wait and the resume-step decision.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use stackup_core::conditions::ConditionSet;
use stackup_core::resume::{decide_resume_step, ResumePlan};
use stackup_core::version::{VersionSnapshot, WaitOutcome};
use stackup_core::{Error, Result};
use stackup_store::resources;

use crate::watch::{CancelSignal, ConditionWatcher, WaitRequest};
use crate::UpgradeOps;

/// Flattened view of one `OpenStackVersion` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionReport {
    pub name: String,
    pub namespace: String,
    pub target_version: String,
    pub available_version: Option<String>,
    pub deployed_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_container_images: Option<Value>,
    pub ready_conditions: Vec<String>,
    pub not_ready_conditions: Vec<String>,
}

/// Result of a `set_target_version` patch, echoing the object shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetVersionReport {
    pub name: String,
    pub namespace: String,
    pub spec: TargetSpec,
    pub status: TargetStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    pub target_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetStatus {
    pub available_version: Option<String>,
    pub deployed_version: Option<String>,
}

/// Final report of one condition wait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitReport {
    pub name: String,
    pub namespace: String,
    pub condition: String,
    #[serde(flatten)]
    pub outcome: WaitOutcome,
}

/// Where to pick up a half-done minor update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeReport {
    pub name: String,
    pub namespace: String,
    pub target_version: String,
    pub available_version: Option<String>,
    pub deployed_version: Option<String>,
    pub not_ready_conditions: Vec<String>,
    pub resume_step: u8,
    pub explanation: String,
}

impl UpgradeOps {
    /// Version overview. Without a name, the first `OpenStackVersion` in the
    /// namespace is used.
    pub async fn version_status(
        &self,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> Result<VersionReport> {
        let ns = self.namespace(namespace);
        let res = resources::openstack_version();
        let obj = self.fetch_or_discover(&res, ns, name).await?;
        let snapshot = VersionSnapshot::from_object(&obj.data);
        let set = ConditionSet::from_object(&obj.data);
        Ok(VersionReport {
            name: obj.metadata.name.clone().unwrap_or_default(),
            namespace: obj.metadata.namespace.clone().unwrap_or_default(),
            target_version: snapshot.target_version,
            available_version: snapshot.available_version,
            deployed_version: snapshot.deployed_version,
            custom_container_images: obj.data.pointer("/spec/customContainerImages").cloned(),
            ready_conditions: set.ready_types(),
            not_ready_conditions: set.not_ready_types(),
        })
    }

    /// Patch `spec.targetVersion` (and optionally the container image
    /// overrides) on the first `OpenStackVersion` in the namespace.
    pub async fn set_target_version(
        &self,
        namespace: Option<&str>,
        target: &str,
        custom_images: Option<&Value>,
    ) -> Result<TargetVersionReport> {
        if target.is_empty() {
            return Err(Error::Invalid("targetVersion parameter is required".into()));
        }
        let ns = self.namespace(namespace);
        let res = resources::openstack_version();
        let current = self.discover_first(&res, ns).await?;
        let name = current.metadata.name.clone().unwrap_or_default();

        let mut spec = json!({ "targetVersion": target });
        if let Some(images) = custom_images {
            if images.as_object().map(|m| !m.is_empty()).unwrap_or(false) {
                spec["customContainerImages"] = images.clone();
            }
        }
        let patched = self.store.patch_merge(&res, ns, &name, &json!({ "spec": spec })).await?;
        info!(ns = %ns, name = %name, target = %target, "patched targetVersion");

        let snapshot = VersionSnapshot::from_object(&patched.data);
        Ok(TargetVersionReport {
            name,
            namespace: patched.metadata.namespace.clone().unwrap_or_default(),
            spec: TargetSpec { target_version: snapshot.target_version },
            status: TargetStatus {
                available_version: snapshot.available_version,
                deployed_version: snapshot.deployed_version,
            },
        })
    }

    /// Poll the `OpenStackVersion` until `condition` turns `True` or the
    /// timeout runs out. The name is resolved once, before polling starts.
    pub async fn wait_for_condition(
        &self,
        namespace: Option<&str>,
        name: Option<&str>,
        condition: &str,
        timeout_secs: i64,
        poll_interval_secs: i64,
        cancel: CancelSignal,
    ) -> Result<WaitReport> {
        if condition.is_empty() {
            return Err(Error::Invalid("condition parameter is required".into()));
        }
        let ns = self.namespace(namespace);
        let res = resources::openstack_version();
        let name = match name {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => {
                let first = self.discover_first(&res, ns).await?;
                first.metadata.name.clone().unwrap_or_default()
            }
        };

        let watcher =
            ConditionWatcher::new(self.store.clone(), res, self.sink.clone(), self.cfg.wait);
        let req = WaitRequest {
            namespace: ns.to_string(),
            name: name.clone(),
            condition: condition.to_string(),
            timeout_secs,
            poll_interval_secs,
        };
        let outcome = watcher.wait(&req, cancel).await?;
        Ok(WaitReport { name, namespace: ns.to_string(), condition: condition.to_string(), outcome })
    }

    /// Decide which step of the minor-update procedure to resume from, based
    /// on one snapshot of the `OpenStackVersion`.
    pub async fn resume_step(
        &self,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> Result<ResumeReport> {
        let ns = self.namespace(namespace);
        let res = resources::openstack_version();
        let obj = self.fetch_or_discover(&res, ns, name).await?;
        let snapshot = VersionSnapshot::from_object(&obj.data);
        let ResumePlan { step, explanation } = decide_resume_step(&snapshot);
        info!(
            ns = %ns,
            name = ?obj.metadata.name,
            step = step.number(),
            "resume step decided"
        );
        Ok(ResumeReport {
            name: obj.metadata.name.clone().unwrap_or_default(),
            namespace: obj.metadata.namespace.clone().unwrap_or_default(),
            target_version: snapshot.target_version,
            available_version: snapshot.available_version,
            deployed_version: snapshot.deployed_version,
            not_ready_conditions: snapshot.not_ready_conditions,
            resume_step: step.number(),
            explanation,
        })
    }
}
