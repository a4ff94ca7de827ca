//! Stackup ops: imperative operations for the OpenStack minor-update flow.
//!
//! Every call goes through the [`ObjectStore`] seam from `stackup-store`, so
//! the whole crate runs against `MockStore` in tests without an apiserver.
//! The long-running piece is the condition watcher in [`watch`]; the rest are
//! single-shot reads and writes over the four upgrade CRDs.

#![forbid(unsafe_code)]

pub mod controlplane;
pub mod dataplane;
pub mod version;
pub mod watch;

use std::sync::Arc;

use kube::api::{ApiResource, DynamicObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use stackup_core::{Error, Result};
use stackup_store::ObjectStore;

pub use watch::{
    cancel_channel, CancelHandle, CancelSignal, ConditionWatcher, WaitHandle, WaitRequest,
};

/// Fallback wait knobs, applied whenever a request carries a non-positive
/// timeout or poll interval.
#[derive(Debug, Clone, Copy)]
pub struct WaitDefaults {
    pub timeout_secs: i64,
    pub poll_interval_secs: i64,
}

impl Default for WaitDefaults {
    fn default() -> Self {
        Self { timeout_secs: 300, poll_interval_secs: 5 }
    }
}

/// Runtime knobs for the ops layer.
#[derive(Debug, Clone)]
pub struct OpsConfig {
    /// Namespace used when a call does not name one.
    pub default_namespace: String,
    pub wait: WaitDefaults,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self { default_namespace: "openstack".into(), wait: WaitDefaults::default() }
    }
}

impl OpsConfig {
    /// Defaults overridden from `STACKUP_NAMESPACE`, `STACKUP_WAIT_TIMEOUT_SECS`
    /// and `STACKUP_POLL_INTERVAL_SECS` where set.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(ns) = std::env::var("STACKUP_NAMESPACE") {
            if !ns.is_empty() {
                cfg.default_namespace = ns;
            }
        }
        if let Some(t) = env_i64("STACKUP_WAIT_TIMEOUT_SECS") {
            cfg.wait.timeout_secs = t;
        }
        if let Some(p) = env_i64("STACKUP_POLL_INTERVAL_SECS") {
            cfg.wait.poll_interval_secs = p;
        }
        cfg
    }
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|s| s.parse::<i64>().ok())
}

/// Receives the human-readable progress lines of a running wait.
///
/// The watcher announces the wait once up front, then sends one line per poll
/// where the condition exists but is not `True` yet. Attempts where the
/// condition has not appeared at all stay silent.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, message: &str);
}

/// Default sink: forwards progress lines to `tracing` at info level.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn notify(&self, message: &str) {
        info!("{}", message);
    }
}

/// Name, namespace and raw `spec`/`status` of one object, as returned by the
/// read-only status operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReport {
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl ObjectReport {
    pub fn from_object(obj: &DynamicObject) -> Self {
        Self {
            name: obj.metadata.name.clone().unwrap_or_default(),
            namespace: obj.metadata.namespace.clone().unwrap_or_default(),
            spec: obj.data.get("spec").cloned(),
            status: obj.data.get("status").cloned(),
        }
    }
}

/// Entry point for all upgrade operations.
///
/// Holds the store, the resolved config and the progress sink; the per-CRD
/// operations live in [`version`], [`controlplane`] and [`dataplane`].
pub struct UpgradeOps {
    store: Arc<dyn ObjectStore>,
    cfg: OpsConfig,
    sink: Arc<dyn ProgressSink>,
}

impl UpgradeOps {
    pub fn new(store: Arc<dyn ObjectStore>, cfg: OpsConfig) -> Self {
        Self::with_sink(store, cfg, Arc::new(TracingSink))
    }

    pub fn with_sink(
        store: Arc<dyn ObjectStore>,
        cfg: OpsConfig,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self { store, cfg, sink }
    }

    pub fn config(&self) -> &OpsConfig {
        &self.cfg
    }

    fn namespace<'a>(&'a self, namespace: Option<&'a str>) -> &'a str {
        match namespace {
            Some(ns) if !ns.is_empty() => ns,
            _ => &self.cfg.default_namespace,
        }
    }

    /// First listed object of `resource` in the namespace.
    async fn discover_first(
        &self,
        resource: &ApiResource,
        namespace: &str,
    ) -> Result<DynamicObject> {
        let mut items = self.store.list(resource, namespace).await?;
        if items.is_empty() {
            return Err(Error::NotFound(format!(
                "No {} CR found in namespace '{}'",
                resource.kind, namespace
            )));
        }
        Ok(items.remove(0))
    }

    /// Fetch by name when one is given, otherwise fall back to the first
    /// object in the namespace.
    async fn fetch_or_discover(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: Option<&str>,
    ) -> Result<DynamicObject> {
        match name {
            Some(n) if !n.is_empty() => self.store.get(resource, namespace, n).await,
            _ => self.discover_first(resource, namespace).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_report_splits_spec_and_status() {
        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "core.openstack.org/v1beta1",
            "kind": "OpenStackVersion",
            "metadata": { "name": "cr", "namespace": "openstack" },
            "spec": { "targetVersion": "18.0.3" },
            "status": { "deployedVersion": "18.0.2" },
        }))
        .unwrap();

        let report = ObjectReport::from_object(&obj);
        assert_eq!(report.name, "cr");
        assert_eq!(report.namespace, "openstack");
        assert_eq!(report.spec, Some(json!({ "targetVersion": "18.0.3" })));
        assert_eq!(report.status, Some(json!({ "deployedVersion": "18.0.2" })));
    }

    #[test]
    fn object_report_skips_absent_halves() {
        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "core.openstack.org/v1beta1",
            "kind": "OpenStackVersion",
            "metadata": { "name": "cr", "namespace": "openstack" },
            "spec": { "targetVersion": "18.0.3" },
        }))
        .unwrap();

        let report = ObjectReport::from_object(&obj);
        assert_eq!(report.status, None);
        let out = serde_json::to_value(&report).unwrap();
        assert!(out.get("status").is_none());
    }

    #[test]
    fn config_defaults() {
        let cfg = OpsConfig::default();
        assert_eq!(cfg.default_namespace, "openstack");
        assert_eq!(cfg.wait.timeout_secs, 300);
        assert_eq!(cfg.wait.poll_interval_secs, 5);
    }
}
