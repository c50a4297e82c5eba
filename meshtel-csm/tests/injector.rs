use meshtel_core::codec;
use meshtel_core::{LabelBundle, LabelInjector, LabelMap, RawLabels, EXCHANGE_LABEL_KEY, UNKNOWN};
use meshtel_csm::injector::*;
use meshtel_csm::peer::GKE_TYPE;
use meshtel_csm::{CsmEnvironment, CsmLabelInjector, PeerIdentity, PeerType};

const REMOTE_KEYS: [&str; 7] = [
    REMOTE_TYPE,
    REMOTE_CANONICAL_SERVICE,
    REMOTE_WORKLOAD_NAME,
    REMOTE_NAMESPACE_NAME,
    REMOTE_CLUSTER_NAME,
    REMOTE_LOCATION,
    REMOTE_PROJECT_ID,
];

fn gke_env() -> CsmEnvironment {
    CsmEnvironment::new()
        .with_canonical_service("checkout")
        .with_workload_name("checkout-7d9f")
        .with_resource_attribute("cloud.platform", GKE_TYPE)
        .with_resource_attribute("k8s.namespace.name", "shop")
        .with_resource_attribute("k8s.cluster.name", "prod-1")
        .with_resource_attribute("cloud.region", "us-central1")
        .with_resource_attribute("cloud.availability_zone", "us-central1-a")
        .with_resource_attribute("cloud.account.id", "proj-42")
}

fn raw(bundle: &LabelBundle) -> RawLabels {
    let mut raw = RawLabels::new();
    raw.insert(EXCHANGE_LABEL_KEY.to_string(), codec::encode(bundle));
    raw
}

fn get<'a>(map: &'a LabelMap, key: &str) -> &'a str {
    map.get(key).map(String::as_str).unwrap_or("<missing>")
}

#[test]
fn gke_workload_advertises_five_attributes() {
    let injector = CsmLabelInjector::new(&gke_env());
    let bundle = injector.labels_for_exchange();

    assert_eq!(bundle.len(), 7);
    assert_eq!(bundle.get_str("type"), Some(GKE_TYPE));
    assert_eq!(bundle.get_str("canonical_service"), Some("checkout"));
    assert_eq!(bundle.get_str("workload_name"), Some("checkout-7d9f"));
    assert_eq!(bundle.get_str("namespace_name"), Some("shop"));
    assert_eq!(bundle.get_str("cluster_name"), Some("prod-1"));
    assert_eq!(bundle.get_str("location"), Some("us-central1-a"));
    assert_eq!(bundle.get_str("project_id"), Some("proj-42"));
}

#[test]
fn location_falls_back_to_region() {
    let env = CsmEnvironment::new()
        .with_resource_attribute("cloud.platform", "gcp_compute_engine")
        .with_resource_attribute("cloud.region", "europe-west1");
    let injector = CsmLabelInjector::new(&env);

    assert_eq!(injector.identity().peer_type(), PeerType::Gce);
    let bundle = injector.labels_for_exchange();
    assert_eq!(bundle.len(), 5);
    assert_eq!(bundle.get_str("location"), Some("europe-west1"));
    assert_eq!(bundle.get_str("workload_name"), Some(UNKNOWN));
    assert!(!bundle.contains_key("cluster_name"));
}

#[test]
fn unknown_platform_advertises_fixed_keys_only() {
    let injector = CsmLabelInjector::new(&CsmEnvironment::new());
    assert_eq!(injector.identity(), &PeerIdentity::Unknown);

    let bundle = injector.labels_for_exchange();
    assert_eq!(bundle.len(), 2);
    assert_eq!(bundle.get_str("type"), Some(UNKNOWN));
    assert_eq!(bundle.get_str("canonical_service"), Some(UNKNOWN));
}

#[test]
fn missing_peer_bundle_yields_every_key_as_unknown() {
    let injector = CsmLabelInjector::new(&gke_env());
    let merged = injector.deserialize_and_merge(&RawLabels::new());

    assert_eq!(merged.len(), REMOTE_KEYS.len());
    for key in REMOTE_KEYS {
        assert_eq!(get(&merged, key), UNKNOWN, "{key}");
    }
}

#[test]
fn malformed_peer_bundle_yields_unknown() {
    let injector = CsmLabelInjector::new(&gke_env());
    let mut incoming = RawLabels::new();
    incoming.insert(EXCHANGE_LABEL_KEY.to_string(), bytes::Bytes::from_static(b"\xff\x00garbage"));

    let merged = injector.deserialize_and_merge(&incoming);
    for key in REMOTE_KEYS {
        assert_eq!(get(&merged, key), UNKNOWN, "{key}");
    }
}

#[test]
fn gke_peer_projects_all_variant_keys() {
    let peer = CsmLabelInjector::new(&gke_env());
    let local = CsmLabelInjector::new(&CsmEnvironment::new());

    let merged = local.deserialize_and_merge(&raw(peer.labels_for_exchange()));
    assert_eq!(get(&merged, REMOTE_TYPE), GKE_TYPE);
    assert_eq!(get(&merged, REMOTE_CANONICAL_SERVICE), "checkout");
    assert_eq!(get(&merged, REMOTE_WORKLOAD_NAME), "checkout-7d9f");
    assert_eq!(get(&merged, REMOTE_NAMESPACE_NAME), "shop");
    assert_eq!(get(&merged, REMOTE_CLUSTER_NAME), "prod-1");
    assert_eq!(get(&merged, REMOTE_LOCATION), "us-central1-a");
    assert_eq!(get(&merged, REMOTE_PROJECT_ID), "proj-42");
}

#[test]
fn gce_peer_projects_three_variant_keys() {
    let peer = LabelBundle::new()
        .with("type", "gcp_compute_engine")
        .with("canonical_service", "billing")
        .with("workload_name", "billing-vm")
        .with("location", "us-east1-b")
        .with("project_id", "proj-7")
        .with("namespace_name", "ignored-for-gce");
    let local = CsmLabelInjector::new(&CsmEnvironment::new());

    let merged = local.deserialize_and_merge(&raw(&peer));
    assert_eq!(get(&merged, REMOTE_WORKLOAD_NAME), "billing-vm");
    assert_eq!(get(&merged, REMOTE_LOCATION), "us-east1-b");
    assert_eq!(get(&merged, REMOTE_PROJECT_ID), "proj-7");
    assert_eq!(get(&merged, REMOTE_NAMESPACE_NAME), UNKNOWN);
    assert_eq!(get(&merged, REMOTE_CLUSTER_NAME), UNKNOWN);
}

#[test]
fn unrecognised_peer_type_keeps_fixed_keys() {
    let peer = LabelBundle::new()
        .with("type", "aws_ec2")
        .with("canonical_service", "legacy")
        .with("workload_name", "should-not-appear");
    let local = CsmLabelInjector::new(&CsmEnvironment::new());

    let merged = local.deserialize_and_merge(&raw(&peer));
    assert_eq!(get(&merged, REMOTE_TYPE), "aws_ec2");
    assert_eq!(get(&merged, REMOTE_CANONICAL_SERVICE), "legacy");
    assert_eq!(get(&merged, REMOTE_WORKLOAD_NAME), UNKNOWN);
}

#[test]
fn additional_labels_are_local_only() {
    let env = gke_env().with_bootstrap_config(
        r#"{"node":{"id":"projects/42/networks/mesh:shop-mesh/nodes/abc"}}"#,
    );
    let injector = CsmLabelInjector::new(&env);

    let additional = injector.additional_labels();
    assert_eq!(additional.get_str(WORKLOAD_CANONICAL_SERVICE), Some("checkout"));
    assert_eq!(additional.get_str(MESH_ID), Some("shop-mesh"));
    assert!(!injector.labels_for_exchange().contains_key(MESH_ID));
}

#[test]
fn optional_labels_apply_to_clients_only() {
    let injector = CsmLabelInjector::new(&CsmEnvironment::new());
    let mut optional = LabelMap::new();
    optional.insert("service_name".to_string(), "cart".to_string());

    let client = injector.optional_labels(true, &optional);
    assert_eq!(get(&client, SERVICE_NAME), "cart");
    assert_eq!(get(&client, SERVICE_NAMESPACE_NAME), UNKNOWN);

    assert!(injector.optional_labels(false, &optional).is_empty());
}
