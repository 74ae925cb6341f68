//! The typed target record: a kubeadm-style init configuration
//!
//! This is the fully-typed output of the derivation engine. Field names
//! follow the kubeadm wire format (camelCase, `certSANs`, `localAPIEndpoint`)
//! so the serialized YAML can be handed to `kubeadm init` unchanged.
//!
//! The record is allocated once, mutated field by field through the fixed
//! derivation order, and returned to the caller as an immutable result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::token::BootstrapToken;
use crate::Result;

/// Init configuration for bootstrapping the first control-plane node
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitConfiguration {
    /// Cluster-wide configuration shared by all control-plane nodes
    #[serde(rename = "clusterConfiguration")]
    pub cluster: ClusterConfiguration,

    /// The API endpoint this specific node binds and advertises
    #[serde(rename = "localAPIEndpoint")]
    pub local_api_endpoint: ApiEndpoint,

    /// Node-local registration settings (CRI socket, kubelet args)
    pub node_registration: NodeRegistration,

    /// Bootstrap tokens installed during init
    ///
    /// The schema expects a collection even though the derivation only ever
    /// produces a single token.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bootstrap_tokens: Vec<BootstrapToken>,
}

impl InitConfiguration {
    /// Serialize the configuration to kubeadm-compatible YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| crate::Error::serialization(e.to_string()))
    }
}

/// Cluster-wide configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfiguration {
    /// Advertised control-plane endpoint (host:port), empty if none
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub control_plane_endpoint: String,

    /// Kubernetes version override, empty if the default applies
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kubernetes_version: String,

    /// API server settings
    #[serde(rename = "apiServer")]
    pub api_server: ApiServer,

    /// Controller-manager settings
    pub controller_manager: ControlPlaneComponent,

    /// Scheduler settings
    pub scheduler: ControlPlaneComponent,

    /// Cluster networking settings
    pub networking: Networking,

    /// Image repository override for control-plane images
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_repository: String,

    /// Etcd datastore: local (embedded) or external, never both
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etcd: Option<Etcd>,
}

/// API server settings: extra args plus certificate SANs
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ApiServer {
    /// Extra command-line arguments for the API server
    #[serde(default, rename = "extraArgs", skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_args: BTreeMap<String, String>,

    /// Certificate subject alternative names
    ///
    /// Grows only; the derivation appends and never dedups (duplicates are
    /// tolerated downstream).
    #[serde(default, rename = "certSANs", skip_serializing_if = "Vec::is_empty")]
    pub cert_sans: Vec<String>,
}

/// A control-plane component carrying only extra command-line arguments
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ControlPlaneComponent {
    /// Extra command-line arguments for the component
    #[serde(default, rename = "extraArgs", skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_args: BTreeMap<String, String>,
}

/// Cluster networking settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Networking {
    /// CIDR for service virtual IPs
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_subnet: String,

    /// CIDR for pod IPs
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pod_subnet: String,

    /// Cluster DNS domain (DNS-1123 subdomain, e.g. "cluster.local")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_domain: String,
}

/// The API endpoint a control-plane node binds and advertises
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    /// Address the API server advertises and binds to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub advertise_address: String,

    /// Port the API server binds to; 0 means "use the default"
    #[serde(default, skip_serializing_if = "is_zero_port")]
    pub bind_port: u16,
}

fn is_zero_port(port: &u16) -> bool {
    *port == 0
}

/// Node-local registration settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeRegistration {
    /// Control socket of the container runtime on this node
    #[serde(rename = "criSocket", default, skip_serializing_if = "String::is_empty")]
    pub cri_socket: String,

    /// Extra command-line arguments for the kubelet
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub kubelet_extra_args: BTreeMap<String, String>,
}

/// Etcd datastore selection
///
/// Local (embedded) and external etcd are mutually exclusive variants of one
/// field; the tagged representation makes that exclusivity structural rather
/// than a pair of independently-nullable sub-records.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Etcd {
    /// Embedded etcd managed by kubeadm on the control-plane nodes
    Local(LocalEtcd),
    /// Externally operated etcd reached over the network
    External(ExternalEtcd),
}

/// Image overrides for the embedded etcd
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalEtcd {
    /// Image repository override for the etcd image
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_repository: String,

    /// Image tag override for the etcd image
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_tag: String,
}

/// Connection settings for an externally operated etcd
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ExternalEtcd {
    /// Client endpoints of the external etcd cluster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<String>,
}
