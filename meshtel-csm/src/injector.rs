use meshtel_core::codec;
use meshtel_core::{LabelBundle, LabelInjector, LabelMap, RawLabels, EXCHANGE_LABEL_KEY, UNKNOWN};

use crate::bootstrap;
use crate::env::CsmEnvironment;
use crate::peer::{exchange_key, PeerIdentity, PeerType};

pub const REMOTE_TYPE: &str = "csm.remote_workload_type";
pub const REMOTE_CANONICAL_SERVICE: &str = "csm.remote_workload_canonical_service";
pub const REMOTE_WORKLOAD_NAME: &str = "csm.remote_workload_name";
pub const REMOTE_NAMESPACE_NAME: &str = "csm.remote_workload_namespace_name";
pub const REMOTE_CLUSTER_NAME: &str = "csm.remote_workload_cluster_name";
pub const REMOTE_LOCATION: &str = "csm.remote_workload_location";
pub const REMOTE_PROJECT_ID: &str = "csm.remote_workload_project_id";

pub const WORKLOAD_CANONICAL_SERVICE: &str = "csm.workload_canonical_service";
pub const MESH_ID: &str = "csm.mesh_id";

pub const SERVICE_NAME: &str = "csm.service_name";
pub const SERVICE_NAMESPACE_NAME: &str = "csm.service_namespace_name";

/// Optional-label keys supplied by the xDS control plane.
const XDS_SERVICE_NAME: &str = "service_name";
const XDS_SERVICE_NAMESPACE: &str = "service_namespace";

/// (output attribute, exchange key) pairs projected for every peer.
const FIXED_ATTRIBUTES: [(&str, &str); 2] = [
    (REMOTE_TYPE, exchange_key::TYPE),
    (REMOTE_CANONICAL_SERVICE, exchange_key::CANONICAL_SERVICE),
];

/// (output attribute, exchange key) pairs projected depending on peer type.
/// GCE peers carry a subset of these.
const VARIANT_ATTRIBUTES: [(&str, &str); 5] = [
    (REMOTE_WORKLOAD_NAME, exchange_key::WORKLOAD_NAME),
    (REMOTE_NAMESPACE_NAME, exchange_key::NAMESPACE_NAME),
    (REMOTE_CLUSTER_NAME, exchange_key::CLUSTER_NAME),
    (REMOTE_LOCATION, exchange_key::LOCATION),
    (REMOTE_PROJECT_ID, exchange_key::PROJECT_ID),
];

/// Label injector for Cloud Service Mesh workloads.
///
/// Built once from a [`CsmEnvironment`]; reading the bootstrap file happens
/// here and never again.
#[derive(Debug, Clone)]
pub struct CsmLabelInjector {
    identity: PeerIdentity,
    canonical_service: String,
    mesh_id: String,
    exchange: LabelBundle,
}

impl CsmLabelInjector {
    pub fn new(env: &CsmEnvironment) -> Self {
        let identity = PeerIdentity::detect(env);
        let canonical_service = env
            .canonical_service
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string());
        let mesh_id = bootstrap::mesh_id(env);
        let exchange = identity.to_exchange_bundle(&canonical_service);
        tracing::debug!(
            peer_type = identity.peer_type().as_str(),
            canonical_service = %canonical_service,
            mesh_id = %mesh_id,
            "CSM label injector ready"
        );
        Self {
            identity,
            canonical_service,
            mesh_id,
            exchange,
        }
    }

    pub fn from_env() -> Self {
        Self::new(&CsmEnvironment::from_env())
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn mesh_id(&self) -> &str {
        &self.mesh_id
    }

    pub fn canonical_service(&self) -> &str {
        &self.canonical_service
    }
}

impl LabelInjector for CsmLabelInjector {
    fn labels_for_exchange(&self) -> &LabelBundle {
        &self.exchange
    }

    fn deserialize_and_merge(&self, incoming: &RawLabels) -> LabelMap {
        let remote = incoming
            .get(EXCHANGE_LABEL_KEY)
            .map(|raw| codec::decode(raw))
            .unwrap_or_default();
        let remote_type = PeerType::from_type(codec::lookup_or_unknown(&remote, exchange_key::TYPE));
        let carried = remote_type.exchange_keys();

        let mut out = LabelMap::new();
        for (attribute, key) in FIXED_ATTRIBUTES {
            out.insert(
                attribute.to_string(),
                codec::lookup_or_unknown(&remote, key).to_string(),
            );
        }
        for (attribute, key) in VARIANT_ATTRIBUTES {
            let value = if carried.contains(&key) {
                codec::lookup_or_unknown(&remote, key)
            } else {
                UNKNOWN
            };
            out.insert(attribute.to_string(), value.to_string());
        }
        out
    }

    fn additional_labels(&self) -> LabelBundle {
        LabelBundle::new()
            .with(WORKLOAD_CANONICAL_SERVICE, self.canonical_service.as_str())
            .with(MESH_ID, self.mesh_id.as_str())
    }

    fn optional_labels(&self, is_client: bool, optional: &LabelMap) -> LabelMap {
        let mut out = LabelMap::new();
        if !is_client {
            return out;
        }
        let lookup = |key: &str| {
            optional
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| UNKNOWN.to_string())
        };
        out.insert(SERVICE_NAME.to_string(), lookup(XDS_SERVICE_NAME));
        out.insert(SERVICE_NAMESPACE_NAME.to_string(), lookup(XDS_SERVICE_NAMESPACE));
        out
    }
}
