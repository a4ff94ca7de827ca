//! Operations on the `OpenStackControlPlane` CR.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use stackup_core::conditions::{Condition, ConditionSet};
use stackup_core::{Error, Result};
use stackup_store::resources;

use crate::{ObjectReport, UpgradeOps};

/// Readiness verdict over every condition on one control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneVerification {
    pub name: String,
    pub namespace: String,
    pub all_ready: bool,
    /// Raw entry count from `status.conditions`, duplicates included.
    pub total_conditions: usize,
    pub ready_conditions: Vec<String>,
    pub not_ready_conditions: Vec<Condition>,
}

impl UpgradeOps {
    /// Raw spec and status of the control plane. Without a name, the first
    /// `OpenStackControlPlane` in the namespace is used.
    pub async fn controlplane_status(
        &self,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> Result<ObjectReport> {
        let ns = self.namespace(namespace);
        let res = resources::openstack_controlplane();
        let obj = self.fetch_or_discover(&res, ns, name).await?;
        Ok(ObjectReport::from_object(&obj))
    }

    /// Check that every condition on the control plane is `True`.
    ///
    /// An object with no status, or with a missing or empty condition list,
    /// is rejected as invalid rather than reported as not ready.
    pub async fn verify_controlplane(
        &self,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> Result<ControlPlaneVerification> {
        let ns = self.namespace(namespace);
        let res = resources::openstack_controlplane();
        let obj = self.fetch_or_discover(&res, ns, name).await?;

        if obj.data.get("status").and_then(Value::as_object).is_none() {
            return Err(Error::Invalid("no status found on OpenStackControlPlane".into()));
        }
        let has_conditions = obj
            .data
            .pointer("/status/conditions")
            .and_then(Value::as_array)
            .map(|a| !a.is_empty())
            .unwrap_or(false);
        if !has_conditions {
            return Err(Error::Invalid("no conditions found on OpenStackControlPlane".into()));
        }

        let set = ConditionSet::from_object(&obj.data);
        let not_ready: Vec<Condition> = set.not_ready().into_iter().cloned().collect();
        let name = obj.metadata.name.clone().unwrap_or_default();
        info!(
            ns = %ns,
            name = %name,
            ready = set.ready_types().len(),
            not_ready = not_ready.len(),
            "verified controlplane conditions"
        );
        Ok(ControlPlaneVerification {
            name,
            namespace: ns.to_string(),
            all_ready: not_ready.is_empty(),
            total_conditions: set.raw_len(),
            ready_conditions: set.ready_types(),
            not_ready_conditions: not_ready,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OpsConfig;
    use serde_json::json;
    use std::sync::Arc;
    use stackup_core::conditions::ConditionState;
    use stackup_store::MockStore;

    fn ops(store: &Arc<MockStore>) -> UpgradeOps {
        UpgradeOps::new(store.clone(), OpsConfig::default())
    }

    fn controlplane_obj(name: &str, conditions: Value) -> Value {
        json!({
            "apiVersion": "core.openstack.org/v1beta1",
            "kind": "OpenStackControlPlane",
            "metadata": { "name": name, "namespace": "openstack" },
            "spec": { "secret": "osp-secret" },
            "status": { "conditions": conditions },
        })
    }

    #[tokio::test]
    async fn status_returns_spec_and_status() {
        let store = Arc::new(MockStore::new());
        let res = resources::openstack_controlplane();
        store.insert(
            &res,
            "openstack",
            controlplane_obj("overcloud", json!([
                { "type": "Ready", "status": "True", "reason": "Ready", "message": "Setup complete" },
            ])),
        );

        let report = ops(&store).controlplane_status(None, None).await.unwrap();
        assert_eq!(report.name, "overcloud");
        assert_eq!(report.spec, Some(json!({ "secret": "osp-secret" })));
        assert!(report.status.is_some());
    }

    #[tokio::test]
    async fn verify_passes_when_everything_is_ready() {
        let store = Arc::new(MockStore::new());
        let res = resources::openstack_controlplane();
        store.insert(
            &res,
            "openstack",
            controlplane_obj("overcloud", json!([
                { "type": "Ready", "status": "True", "reason": "Ready", "message": "Setup complete" },
                { "type": "OpenStackControlPlaneExposeServiceReady", "status": "True", "reason": "Ready", "message": "exposed" },
            ])),
        );

        let verdict = ops(&store).verify_controlplane(None, Some("overcloud")).await.unwrap();
        assert!(verdict.all_ready);
        assert_eq!(verdict.total_conditions, 2);
        assert_eq!(
            verdict.ready_conditions,
            vec!["Ready", "OpenStackControlPlaneExposeServiceReady"]
        );
        assert!(verdict.not_ready_conditions.is_empty());
    }

    #[tokio::test]
    async fn verify_carries_full_not_ready_conditions() {
        let store = Arc::new(MockStore::new());
        let res = resources::openstack_controlplane();
        store.insert(
            &res,
            "openstack",
            controlplane_obj("overcloud", json!([
                { "type": "Ready", "status": "False", "reason": "RequirementsNotMet", "message": "galera degraded" },
                { "type": "OpenStackControlPlaneRabbitMQReady", "status": "True", "reason": "Ready", "message": "ok" },
            ])),
        );

        let verdict = ops(&store).verify_controlplane(None, None).await.unwrap();
        assert!(!verdict.all_ready);
        assert_eq!(verdict.total_conditions, 2);
        assert_eq!(verdict.ready_conditions, vec!["OpenStackControlPlaneRabbitMQReady"]);
        assert_eq!(verdict.not_ready_conditions.len(), 1);
        let bad = &verdict.not_ready_conditions[0];
        assert_eq!(bad.type_, "Ready");
        assert_eq!(bad.status, ConditionState::False);
        assert_eq!(bad.reason, "RequirementsNotMet");
        assert_eq!(bad.message, "galera degraded");
    }

    #[tokio::test]
    async fn verify_rejects_missing_status() {
        let store = Arc::new(MockStore::new());
        let res = resources::openstack_controlplane();
        store.insert(
            &res,
            "openstack",
            json!({
                "metadata": { "name": "overcloud", "namespace": "openstack" },
                "spec": {},
            }),
        );

        let err = ops(&store).verify_controlplane(None, None).await.unwrap_err();
        match err {
            Error::Invalid(msg) => assert_eq!(msg, "no status found on OpenStackControlPlane"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn verify_rejects_empty_conditions() {
        let store = Arc::new(MockStore::new());
        let res = resources::openstack_controlplane();
        store.insert(&res, "openstack", controlplane_obj("overcloud", json!([])));

        let err = ops(&store).verify_controlplane(None, None).await.unwrap_err();
        match err {
            Error::Invalid(msg) => assert_eq!(msg, "no conditions found on OpenStackControlPlane"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn verify_auto_discovers_without_a_name() {
        let store = Arc::new(MockStore::new());
        let res = resources::openstack_controlplane();
        store.insert(
            &res,
            "openstack",
            controlplane_obj("first", json!([
                { "type": "Ready", "status": "True", "reason": "Ready", "message": "ok" },
            ])),
        );
        store.insert(
            &res,
            "openstack",
            controlplane_obj("second", json!([
                { "type": "Ready", "status": "False", "reason": "x", "message": "y" },
            ])),
        );

        let verdict = ops(&store).verify_controlplane(None, None).await.unwrap();
        assert_eq!(verdict.name, "first");
        assert!(verdict.all_ready);
    }
}
