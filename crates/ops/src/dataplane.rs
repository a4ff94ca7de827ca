//! Operations on the dataplane CRs: nodesets and deployments.

use kube::api::DynamicObject;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use stackup_core::conditions::{Condition, ConditionSet};
use stackup_core::{Error, Result};
use stackup_store::resources;

use crate::{ObjectReport, UpgradeOps};

/// Readiness verdict for one `OpenStackDataplaneNodeSet`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSetVerification {
    pub name: String,
    pub all_ready: bool,
    /// Raw entry count from `status.conditions`; zero when the object has no
    /// usable status at all.
    pub total_conditions: usize,
    pub ready_conditions: Vec<String>,
    pub not_ready_conditions: Vec<Condition>,
}

/// Aggregate verdict over every nodeset in a namespace. Ready nodesets are
/// listed by name only; the full per-condition detail rides along for the
/// ones holding the upgrade back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSetsVerification {
    pub namespace: String,
    pub all_ready: bool,
    pub total_node_sets: usize,
    pub ready_node_sets: Vec<String>,
    pub not_ready_node_sets: Vec<NodeSetVerification>,
}

/// Inputs for a deployment create. `spec` wins when present; otherwise one
/// is assembled from `node_sets` (auto-discovered when `None`) and the
/// optional `services_override`.
#[derive(Debug, Clone, Default)]
pub struct DeploymentOpts {
    pub node_sets: Option<Vec<String>>,
    pub services_override: Option<Vec<String>>,
    pub spec: Option<Value>,
}

/// What a deployment create actually submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentReport {
    pub name: String,
    pub namespace: String,
    pub spec: Value,
}

/// CR names must be DNS-safe; version-style names arrive with dots.
fn sanitize_name(name: &str) -> String {
    name.replace('.', "-")
}

fn verify_one_nodeset(name: &str, data: &Value) -> NodeSetVerification {
    if data.get("status").and_then(Value::as_object).is_none() {
        return NodeSetVerification {
            name: name.to_string(),
            all_ready: false,
            total_conditions: 0,
            ready_conditions: Vec::new(),
            not_ready_conditions: vec![Condition::synthetic(
                "Status",
                "NoStatus",
                "No status found on NodeSet",
            )],
        };
    }
    let has_conditions = data
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .map(|a| !a.is_empty())
        .unwrap_or(false);
    if !has_conditions {
        return NodeSetVerification {
            name: name.to_string(),
            all_ready: false,
            total_conditions: 0,
            ready_conditions: Vec::new(),
            not_ready_conditions: vec![Condition::synthetic(
                "Conditions",
                "NoConditions",
                "No conditions found on NodeSet",
            )],
        };
    }

    let set = ConditionSet::from_object(data);
    let not_ready: Vec<Condition> = set.not_ready().into_iter().cloned().collect();
    NodeSetVerification {
        name: name.to_string(),
        all_ready: not_ready.is_empty(),
        total_conditions: set.raw_len(),
        ready_conditions: set.ready_types(),
        not_ready_conditions: not_ready,
    }
}

impl UpgradeOps {
    pub async fn list_nodesets(&self, namespace: Option<&str>) -> Result<Vec<ObjectReport>> {
        let ns = self.namespace(namespace);
        let res = resources::dataplane_nodeset();
        let items = self.store.list(&res, ns).await?;
        Ok(items.iter().map(ObjectReport::from_object).collect())
    }

    /// Check every nodeset in the namespace for fully `True` conditions.
    ///
    /// A nodeset without a status, or without conditions, counts as not ready
    /// with a synthetic condition naming what was missing. No nodesets at all
    /// is an error: the update procedure cannot run against nothing.
    pub async fn verify_nodesets(&self, namespace: Option<&str>) -> Result<NodeSetsVerification> {
        let ns = self.namespace(namespace);
        let res = resources::dataplane_nodeset();
        let items = self.store.list(&res, ns).await?;
        if items.is_empty() {
            return Err(Error::NotFound(format!(
                "no OpenStackDataplaneNodeSets found in namespace '{ns}'"
            )));
        }

        let mut ready = Vec::new();
        let mut not_ready = Vec::new();
        for obj in &items {
            let name = obj.metadata.name.clone().unwrap_or_default();
            let verdict = verify_one_nodeset(&name, &obj.data);
            if verdict.all_ready {
                ready.push(name);
            } else {
                not_ready.push(verdict);
            }
        }
        info!(
            ns = %ns,
            total = items.len(),
            ready = ready.len(),
            not_ready = not_ready.len(),
            "verified nodeset conditions"
        );
        Ok(NodeSetsVerification {
            namespace: ns.to_string(),
            all_ready: not_ready.is_empty(),
            total_node_sets: items.len(),
            ready_node_sets: ready,
            not_ready_node_sets: not_ready,
        })
    }

    pub async fn list_deployments(&self, namespace: Option<&str>) -> Result<Vec<ObjectReport>> {
        let ns = self.namespace(namespace);
        let res = resources::dataplane_deployment();
        let items = self.store.list(&res, ns).await?;
        Ok(items.iter().map(ObjectReport::from_object).collect())
    }

    pub async fn deployment_status(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ObjectReport> {
        if name.is_empty() {
            return Err(Error::Invalid(
                "name parameter is required and must be a non-empty string".into(),
            ));
        }
        let ns = self.namespace(namespace);
        let res = resources::dataplane_deployment();
        let obj = self.store.get(&res, ns, &sanitize_name(name)).await?;
        Ok(ObjectReport::from_object(&obj))
    }

    /// Create an `OpenStackDataplaneDeployment`.
    ///
    /// With `opts.spec` the caller's spec is submitted as-is, except that
    /// `nodeSets` must be present and `deploymentRequeueTime` defaults to 1.
    /// Otherwise a spec is assembled from the explicit nodeset names, or
    /// from every nodeset in the namespace when none are given.
    pub async fn create_deployment(
        &self,
        namespace: Option<&str>,
        name: &str,
        opts: DeploymentOpts,
    ) -> Result<DeploymentReport> {
        if name.is_empty() {
            return Err(Error::Invalid(
                "name parameter is required and must be a non-empty string".into(),
            ));
        }
        let ns = self.namespace(namespace);
        let name = sanitize_name(name);

        let mut spec = match opts.spec {
            Some(spec) => spec,
            None => {
                let node_sets = match opts.node_sets {
                    Some(list) => {
                        if list.is_empty() {
                            return Err(Error::Invalid(
                                "nodeSets must contain at least one nodeSet".into(),
                            ));
                        }
                        list
                    }
                    None => self.discover_nodeset_names(ns, false).await?,
                };
                let mut spec = json!({ "nodeSets": node_sets });
                if let Some(services) = opts.services_override {
                    spec["servicesOverride"] = json!(services);
                }
                spec
            }
        };

        if spec.get("nodeSets").is_none() {
            return Err(Error::Invalid("spec must contain 'nodeSets' field".into()));
        }
        if let Some(map) = spec.as_object_mut() {
            map.entry("deploymentRequeueTime").or_insert(json!(1));
        }
        self.create_with_spec(ns, &name, spec).await
    }

    /// Deploy the `ovn` service on every nodeset (step 5 of the procedure).
    pub async fn create_ovn_deployment(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DeploymentReport> {
        self.create_preset_deployment(namespace, name, "ovn").await
    }

    /// Deploy the `update` service on every nodeset (step 8 of the procedure).
    pub async fn create_update_deployment(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DeploymentReport> {
        self.create_preset_deployment(namespace, name, "update").await
    }

    async fn create_preset_deployment(
        &self,
        namespace: Option<&str>,
        name: &str,
        service: &str,
    ) -> Result<DeploymentReport> {
        if name.is_empty() {
            return Err(Error::Invalid(
                "name parameter is required and must be a non-empty string".into(),
            ));
        }
        let ns = self.namespace(namespace);
        let name = sanitize_name(name);
        let node_sets = self.discover_nodeset_names(ns, true).await?;
        let spec = json!({
            "nodeSets": node_sets,
            "servicesOverride": [service],
            "deploymentRequeueTime": 1,
        });
        self.create_with_spec(ns, &name, spec).await
    }

    async fn discover_nodeset_names(&self, namespace: &str, preset: bool) -> Result<Vec<String>> {
        let res = resources::dataplane_nodeset();
        let items = self.store.list(&res, namespace).await?;
        if items.is_empty() {
            let hint = if preset {
                "Please create nodesets first."
            } else {
                "Please create nodesets first or provide explicit nodeSets parameter."
            };
            return Err(Error::Invalid(format!(
                "No OpenStackDataplaneNodeSets found in namespace '{namespace}'. {hint}"
            )));
        }
        Ok(items
            .into_iter()
            .map(|o| o.metadata.name.unwrap_or_default())
            .collect())
    }

    async fn create_with_spec(&self, ns: &str, name: &str, spec: Value) -> Result<DeploymentReport> {
        let res = resources::dataplane_deployment();
        let mut obj = DynamicObject::new(name, &res).within(ns);
        obj.data = json!({ "spec": spec });
        let created = self.store.create(&res, ns, &obj).await?;
        info!(ns = %ns, name = %name, "created OpenStackDataplaneDeployment");
        Ok(DeploymentReport {
            name: created.metadata.name.clone().unwrap_or_else(|| name.to_string()),
            namespace: ns.to_string(),
            spec,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OpsConfig;
    use std::sync::Arc;
    use stackup_core::conditions::ConditionState;
    use stackup_store::MockStore;

    fn ops(store: &Arc<MockStore>) -> UpgradeOps {
        UpgradeOps::new(store.clone(), OpsConfig::default())
    }

    fn nodeset_obj(name: &str, conditions: Option<Value>) -> Value {
        let mut obj = json!({
            "apiVersion": "dataplane.openstack.org/v1beta1",
            "kind": "OpenStackDataplaneNodeSet",
            "metadata": { "name": name, "namespace": "openstack" },
            "spec": { "services": ["ssh-known-hosts", "run-os"] },
        });
        if let Some(conditions) = conditions {
            obj["status"] = json!({ "conditions": conditions });
        }
        obj
    }

    fn ready_conditions() -> Value {
        json!([
            { "type": "Ready", "status": "True", "reason": "Ready", "message": "NodeSet Ready" },
            { "type": "SetupReady", "status": "True", "reason": "Ready", "message": "Setup complete" },
        ])
    }

    fn seed_nodesets(store: &MockStore, names: &[&str]) {
        let res = resources::dataplane_nodeset();
        for name in names {
            store.insert(&res, "openstack", nodeset_obj(name, Some(ready_conditions())));
        }
    }

    #[tokio::test]
    async fn list_nodesets_reports_each_object() {
        let store = Arc::new(MockStore::new());
        seed_nodesets(&store, &["edpm-compute", "edpm-networker"]);

        let reports = ops(&store).list_nodesets(None).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "edpm-compute");
        assert!(reports[0].spec.is_some());
        assert!(reports[0].status.is_some());
    }

    #[tokio::test]
    async fn verify_nodesets_all_ready() {
        let store = Arc::new(MockStore::new());
        seed_nodesets(&store, &["edpm-compute", "edpm-networker"]);

        let verdict = ops(&store).verify_nodesets(None).await.unwrap();
        assert!(verdict.all_ready);
        assert_eq!(verdict.namespace, "openstack");
        assert_eq!(verdict.total_node_sets, 2);
        assert_eq!(verdict.ready_node_sets, vec!["edpm-compute", "edpm-networker"]);
        assert!(verdict.not_ready_node_sets.is_empty());
    }

    #[tokio::test]
    async fn verify_nodesets_flags_failing_conditions() {
        let store = Arc::new(MockStore::new());
        let res = resources::dataplane_nodeset();
        store.insert(&res, "openstack", nodeset_obj("edpm-ok", Some(ready_conditions())));
        store.insert(
            &res,
            "openstack",
            nodeset_obj(
                "edpm-bad",
                Some(json!([
                    { "type": "Ready", "status": "False", "reason": "DeploymentFailed", "message": "run-os failed" },
                    { "type": "SetupReady", "status": "True", "reason": "Ready", "message": "ok" },
                ])),
            ),
        );

        let verdict = ops(&store).verify_nodesets(None).await.unwrap();
        assert!(!verdict.all_ready);
        assert_eq!(verdict.ready_node_sets, vec!["edpm-ok"]);
        assert_eq!(verdict.not_ready_node_sets.len(), 1);
        let bad = &verdict.not_ready_node_sets[0];
        assert_eq!(bad.name, "edpm-bad");
        assert_eq!(bad.total_conditions, 2);
        assert_eq!(bad.ready_conditions, vec!["SetupReady"]);
        assert_eq!(bad.not_ready_conditions.len(), 1);
        assert_eq!(bad.not_ready_conditions[0].reason, "DeploymentFailed");
    }

    #[tokio::test]
    async fn verify_nodesets_synthesizes_missing_status() {
        let store = Arc::new(MockStore::new());
        let res = resources::dataplane_nodeset();
        store.insert(&res, "openstack", nodeset_obj("edpm-new", None));

        let verdict = ops(&store).verify_nodesets(None).await.unwrap();
        assert!(!verdict.all_ready);
        let bad = &verdict.not_ready_node_sets[0];
        assert_eq!(bad.total_conditions, 0);
        let cond = &bad.not_ready_conditions[0];
        assert_eq!(cond.type_, "Status");
        assert_eq!(cond.status, ConditionState::Unknown);
        assert_eq!(cond.reason, "NoStatus");
        assert_eq!(cond.message, "No status found on NodeSet");
    }

    #[tokio::test]
    async fn verify_nodesets_synthesizes_empty_conditions() {
        let store = Arc::new(MockStore::new());
        let res = resources::dataplane_nodeset();
        store.insert(&res, "openstack", nodeset_obj("edpm-new", Some(json!([]))));

        let verdict = ops(&store).verify_nodesets(None).await.unwrap();
        let cond = &verdict.not_ready_node_sets[0].not_ready_conditions[0];
        assert_eq!(cond.type_, "Conditions");
        assert_eq!(cond.reason, "NoConditions");
        assert_eq!(cond.message, "No conditions found on NodeSet");
    }

    #[tokio::test]
    async fn verify_nodesets_requires_at_least_one() {
        let store = Arc::new(MockStore::new());
        let err = ops(&store).verify_nodesets(None).await.unwrap_err();
        match err {
            Error::NotFound(msg) => {
                assert_eq!(msg, "no OpenStackDataplaneNodeSets found in namespace 'openstack'")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_assembles_spec_from_explicit_nodesets() {
        let store = Arc::new(MockStore::new());
        let opts = DeploymentOpts {
            node_sets: Some(vec!["edpm-compute".into()]),
            services_override: Some(vec!["ovn".into()]),
            spec: None,
        };

        let report = ops(&store).create_deployment(None, "ovn-update", opts).await.unwrap();
        assert_eq!(report.name, "ovn-update");
        assert_eq!(
            report.spec,
            json!({
                "nodeSets": ["edpm-compute"],
                "servicesOverride": ["ovn"],
                "deploymentRequeueTime": 1,
            })
        );

        let creates = store.creates();
        assert_eq!(creates.len(), 1);
        let (key, value) = &creates[0];
        assert_eq!(key, "openstackdataplanedeployments/openstack/ovn-update");
        assert_eq!(value.pointer("/apiVersion").unwrap(), "dataplane.openstack.org/v1beta1");
        assert_eq!(value.pointer("/kind").unwrap(), "OpenStackDataplaneDeployment");
        assert_eq!(value.pointer("/metadata/namespace").unwrap(), "openstack");
        assert_eq!(value.pointer("/spec"), Some(&report.spec));
    }

    #[tokio::test]
    async fn create_auto_discovers_nodesets() {
        let store = Arc::new(MockStore::new());
        seed_nodesets(&store, &["edpm-a", "edpm-b"]);

        let report = ops(&store)
            .create_deployment(None, "full-run", DeploymentOpts::default())
            .await
            .unwrap();
        assert_eq!(report.spec["nodeSets"], json!(["edpm-a", "edpm-b"]));
    }

    #[tokio::test]
    async fn create_requires_a_name() {
        let store = Arc::new(MockStore::new());
        let err = ops(&store)
            .create_deployment(None, "", DeploymentOpts::default())
            .await
            .unwrap_err();
        match err {
            Error::Invalid(msg) => {
                assert_eq!(msg, "name parameter is required and must be a non-empty string")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_rejects_empty_nodeset_list() {
        let store = Arc::new(MockStore::new());
        let opts = DeploymentOpts { node_sets: Some(vec![]), ..Default::default() };
        let err = ops(&store).create_deployment(None, "run", opts).await.unwrap_err();
        match err {
            Error::Invalid(msg) => assert_eq!(msg, "nodeSets must contain at least one nodeSet"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_rejects_spec_without_nodesets() {
        let store = Arc::new(MockStore::new());
        let opts = DeploymentOpts {
            spec: Some(json!({ "servicesOverride": ["ovn"] })),
            ..Default::default()
        };
        let err = ops(&store).create_deployment(None, "run", opts).await.unwrap_err();
        match err {
            Error::Invalid(msg) => assert_eq!(msg, "spec must contain 'nodeSets' field"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_without_any_nodesets_names_the_gap() {
        let store = Arc::new(MockStore::new());
        let err = ops(&store)
            .create_deployment(None, "run", DeploymentOpts::default())
            .await
            .unwrap_err();
        match err {
            Error::Invalid(msg) => assert_eq!(
                msg,
                "No OpenStackDataplaneNodeSets found in namespace 'openstack'. \
                 Please create nodesets first or provide explicit nodeSets parameter."
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_sanitizes_dotted_names() {
        let store = Arc::new(MockStore::new());
        seed_nodesets(&store, &["edpm-a"]);

        let report = ops(&store)
            .create_deployment(None, "update-18.0.3", DeploymentOpts::default())
            .await
            .unwrap();
        assert_eq!(report.name, "update-18-0-3");
        assert_eq!(
            store.creates()[0].1.pointer("/metadata/name").unwrap(),
            "update-18-0-3"
        );
    }

    #[tokio::test]
    async fn create_keeps_caller_requeue_time() {
        let store = Arc::new(MockStore::new());
        let opts = DeploymentOpts {
            spec: Some(json!({ "nodeSets": ["edpm-a"], "deploymentRequeueTime": 15 })),
            ..Default::default()
        };

        let report = ops(&store).create_deployment(None, "run", opts).await.unwrap();
        assert_eq!(report.spec["deploymentRequeueTime"], json!(15));
    }

    #[tokio::test]
    async fn ovn_preset_forces_service_and_discovery() {
        let store = Arc::new(MockStore::new());
        seed_nodesets(&store, &["edpm-a", "edpm-b"]);

        let report = ops(&store).create_ovn_deployment(None, "ovn-run").await.unwrap();
        assert_eq!(
            report.spec,
            json!({
                "nodeSets": ["edpm-a", "edpm-b"],
                "servicesOverride": ["ovn"],
                "deploymentRequeueTime": 1,
            })
        );
    }

    #[tokio::test]
    async fn update_preset_without_nodesets_uses_preset_hint() {
        let store = Arc::new(MockStore::new());
        let err = ops(&store).create_update_deployment(None, "run").await.unwrap_err();
        match err {
            Error::Invalid(msg) => assert_eq!(
                msg,
                "No OpenStackDataplaneNodeSets found in namespace 'openstack'. \
                 Please create nodesets first."
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn deployment_status_sanitizes_the_name() {
        let store = Arc::new(MockStore::new());
        seed_nodesets(&store, &["edpm-a"]);
        ops(&store)
            .create_deployment(None, "update-18.0.3", DeploymentOpts::default())
            .await
            .unwrap();

        let report = ops(&store).deployment_status(None, "update-18.0.3").await.unwrap();
        assert_eq!(report.name, "update-18-0-3");
        assert!(report.spec.is_some());
    }

    #[tokio::test]
    async fn list_deployments_returns_empty_namespace_as_empty() {
        let store = Arc::new(MockStore::new());
        let reports = ops(&store).list_deployments(None).await.unwrap();
        assert!(reports.is_empty());
    }
}
