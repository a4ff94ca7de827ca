//! `ApiResource` handles for the CRD kinds the update procedure drives.
//!
//! The plurals are fixed by the operators' CRD definitions, so no discovery
//! round trip is needed.

use kube::core::{ApiResource, GroupVersionKind};

/// `core.openstack.org/v1beta1` `OpenStackVersion`.
pub fn openstack_version() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("core.openstack.org", "v1beta1", "OpenStackVersion"),
        "openstackversions",
    )
}

/// `core.openstack.org/v1beta1` `OpenStackControlPlane`.
pub fn openstack_controlplane() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("core.openstack.org", "v1beta1", "OpenStackControlPlane"),
        "openstackcontrolplanes",
    )
}

/// `dataplane.openstack.org/v1beta1` `OpenStackDataplaneDeployment`.
pub fn dataplane_deployment() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("dataplane.openstack.org", "v1beta1", "OpenStackDataplaneDeployment"),
        "openstackdataplanedeployments",
    )
}

/// `dataplane.openstack.org/v1beta1` `OpenStackDataplaneNodeSet`.
pub fn dataplane_nodeset() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("dataplane.openstack.org", "v1beta1", "OpenStackDataplaneNodeSet"),
        "openstackdataplanenodesets",
    )
}
