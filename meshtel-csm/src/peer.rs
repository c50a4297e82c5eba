//! Workload identity exchanged between mesh peers.

use meshtel_core::{LabelBundle, UNKNOWN};

use crate::env::CsmEnvironment;

pub const GKE_TYPE: &str = "gcp_kubernetes_engine";
pub const GCE_TYPE: &str = "gcp_compute_engine";

/// Keys of the exchanged bundle.
pub mod exchange_key {
    pub const TYPE: &str = "type";
    pub const CANONICAL_SERVICE: &str = "canonical_service";
    pub const WORKLOAD_NAME: &str = "workload_name";
    pub const NAMESPACE_NAME: &str = "namespace_name";
    pub const CLUSTER_NAME: &str = "cluster_name";
    pub const LOCATION: &str = "location";
    pub const PROJECT_ID: &str = "project_id";
}

/// Resource attributes the local identity is read from.
pub mod resource_key {
    pub const CLOUD_PLATFORM: &str = "cloud.platform";
    pub const K8S_NAMESPACE_NAME: &str = "k8s.namespace.name";
    pub const K8S_CLUSTER_NAME: &str = "k8s.cluster.name";
    pub const CLOUD_AVAILABILITY_ZONE: &str = "cloud.availability_zone";
    pub const CLOUD_REGION: &str = "cloud.region";
    pub const CLOUD_ACCOUNT_ID: &str = "cloud.account.id";
}

/// Platform a workload runs on, as named in the `type` exchange key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerType {
    Gke,
    Gce,
    Unknown,
}

impl PeerType {
    pub fn from_type(value: &str) -> Self {
        match value {
            GKE_TYPE => PeerType::Gke,
            GCE_TYPE => PeerType::Gce,
            _ => PeerType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeerType::Gke => GKE_TYPE,
            PeerType::Gce => GCE_TYPE,
            PeerType::Unknown => UNKNOWN,
        }
    }

    /// Variant-specific exchange keys, in projection order.
    pub fn exchange_keys(&self) -> &'static [&'static str] {
        use exchange_key::*;
        match self {
            PeerType::Gke => &[WORKLOAD_NAME, NAMESPACE_NAME, CLUSTER_NAME, LOCATION, PROJECT_ID],
            PeerType::Gce => &[WORKLOAD_NAME, LOCATION, PROJECT_ID],
            PeerType::Unknown => &[],
        }
    }
}

/// Identity of the local workload. Missing attributes are `unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerIdentity {
    Gke {
        workload_name: String,
        namespace_name: String,
        cluster_name: String,
        location: String,
        project_id: String,
    },
    Gce {
        workload_name: String,
        location: String,
        project_id: String,
    },
    Unknown,
}

impl PeerIdentity {
    /// Resolve the identity from detected resource attributes and the
    /// `CSM_WORKLOAD_NAME` override.
    pub fn detect(env: &CsmEnvironment) -> Self {
        use resource_key::*;
        let attr = |key: &str| env.resource_attr(key).unwrap_or(UNKNOWN).to_string();
        let workload_name = env.workload_name.clone().unwrap_or_else(|| UNKNOWN.to_string());
        let location = env
            .resource_attr(CLOUD_AVAILABILITY_ZONE)
            .or_else(|| env.resource_attr(CLOUD_REGION))
            .unwrap_or(UNKNOWN)
            .to_string();

        let platform = env.resource_attr(CLOUD_PLATFORM).unwrap_or(UNKNOWN);
        match PeerType::from_type(platform) {
            PeerType::Gke => PeerIdentity::Gke {
                workload_name,
                namespace_name: attr(K8S_NAMESPACE_NAME),
                cluster_name: attr(K8S_CLUSTER_NAME),
                location,
                project_id: attr(CLOUD_ACCOUNT_ID),
            },
            PeerType::Gce => PeerIdentity::Gce {
                workload_name,
                location,
                project_id: attr(CLOUD_ACCOUNT_ID),
            },
            PeerType::Unknown => PeerIdentity::Unknown,
        }
    }

    pub fn peer_type(&self) -> PeerType {
        match self {
            PeerIdentity::Gke { .. } => PeerType::Gke,
            PeerIdentity::Gce { .. } => PeerType::Gce,
            PeerIdentity::Unknown => PeerType::Unknown,
        }
    }

    /// Bundle advertised to peers: `type`, `canonical_service`, then the
    /// variant's attributes.
    pub fn to_exchange_bundle(&self, canonical_service: &str) -> LabelBundle {
        use exchange_key::*;
        let bundle = LabelBundle::new()
            .with(TYPE, self.peer_type().as_str())
            .with(CANONICAL_SERVICE, canonical_service);
        match self {
            PeerIdentity::Gke {
                workload_name,
                namespace_name,
                cluster_name,
                location,
                project_id,
            } => bundle
                .with(WORKLOAD_NAME, workload_name.as_str())
                .with(NAMESPACE_NAME, namespace_name.as_str())
                .with(CLUSTER_NAME, cluster_name.as_str())
                .with(LOCATION, location.as_str())
                .with(PROJECT_ID, project_id.as_str()),
            PeerIdentity::Gce {
                workload_name,
                location,
                project_id,
            } => bundle
                .with(WORKLOAD_NAME, workload_name.as_str())
                .with(LOCATION, location.as_str())
                .with(PROJECT_ID, project_id.as_str()),
            PeerIdentity::Unknown => bundle,
        }
    }
}
