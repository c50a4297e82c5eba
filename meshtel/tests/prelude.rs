use meshtel::prelude::*;

#[test]
fn csm_plugin_through_facade() {
    let option = CsmPluginOption::with_environment(
        &CsmEnvironment::new().with_canonical_service("frontend"),
    );
    let observability = Observability::builder()
        .plugin(
            meshtel::csm::csm_plugin(option)
                .enable_metrics(std::iter::empty())
                .build(),
        )
        .build();

    let client = observability.client_exchange_labels("xds:///backend");
    assert_eq!(client.get_str("canonical_service"), Some("frontend"));
    assert!(observability
        .client_exchange_labels("dns:///backend")
        .is_empty());
    assert!(observability
        .enabled_optional_labels()
        .contains(&OptionalLabel::XdsServiceLabels));
}

#[test]
fn interceptor_through_facade() {
    let observability = Observability::builder().build();
    let interceptor = PeerMetadataInterceptor::for_target(&observability, "xds:///backend");
    assert!(!interceptor.is_active());
}
