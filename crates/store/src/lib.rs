//! Stackup object store: namespaced access to the OpenStack CRDs through the
//! kube dynamic API, behind a seam that scripted test stores can fill.

#![forbid(unsafe_code)]

pub mod mock;
pub mod resources;

use async_trait::async_trait;
use kube::{
    api::{Api, ListParams, Patch, PatchParams, PostParams},
    core::{ApiResource, DynamicObject},
    Client,
};
use serde_json::Value;
use stackup_core::{Error, Result};
use tracing::debug;

pub use mock::MockStore;

/// Namespaced object access the upgrade operations run on. All four CRD
/// kinds this tool drives are namespace scoped, so every call names one.
///
/// Implementations must be safe under concurrent reads; the polling watcher
/// shares one store across invocations.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, resource: &ApiResource, namespace: &str, name: &str)
        -> Result<DynamicObject>;

    async fn list(&self, resource: &ApiResource, namespace: &str) -> Result<Vec<DynamicObject>>;

    /// JSON merge patch (RFC 7386) against an existing object.
    async fn patch_merge(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject>;

    async fn create(
        &self,
        resource: &ApiResource,
        namespace: &str,
        obj: &DynamicObject,
    ) -> Result<DynamicObject>;
}

/// Live store backed by a kube client.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Connect with the default chain: in-cluster config first, then the
    /// local kubeconfig.
    pub async fn connect() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| Error::Transport(format!("kube client init: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, resource: &ApiResource, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, resource)
    }
}

/// Collapse kube failures into the store error taxonomy: 404 is `NotFound`,
/// everything else is `Transport`.
fn map_kube_err(what: &str, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => {
            Error::NotFound(format!("{what}: {}", ae.message))
        }
        other => Error::Transport(format!("{what}: {other}")),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject> {
        debug!(kind = %resource.kind, ns = %namespace, name = %name, "store get");
        self.api(resource, namespace)
            .get(name)
            .await
            .map_err(|e| {
                map_kube_err(&format!("get {} '{}/{}'", resource.kind, namespace, name), e)
            })
    }

    async fn list(&self, resource: &ApiResource, namespace: &str) -> Result<Vec<DynamicObject>> {
        debug!(kind = %resource.kind, ns = %namespace, "store list");
        let list = self
            .api(resource, namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| map_kube_err(&format!("list {} in '{}'", resource.plural, namespace), e))?;
        Ok(list.items)
    }

    async fn patch_merge(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject> {
        debug!(kind = %resource.kind, ns = %namespace, name = %name, "store merge patch");
        let pp = PatchParams::default();
        self.api(resource, namespace)
            .patch(name, &pp, &Patch::Merge(patch))
            .await
            .map_err(|e| {
                map_kube_err(&format!("patch {} '{}/{}'", resource.kind, namespace, name), e)
            })
    }

    async fn create(
        &self,
        resource: &ApiResource,
        namespace: &str,
        obj: &DynamicObject,
    ) -> Result<DynamicObject> {
        let name = obj.metadata.name.as_deref().unwrap_or_default();
        debug!(kind = %resource.kind, ns = %namespace, name = %name, "store create");
        self.api(resource, namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| {
                map_kube_err(&format!("create {} '{}/{}'", resource.kind, namespace, name), e)
            })
    }
}
