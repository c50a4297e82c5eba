use meshtel_core::{LabelInjector, PluginOption};
use url::Url;

use crate::env::CsmEnvironment;
use crate::injector::CsmLabelInjector;

/// Authority of the global Traffic Director control plane.
pub const TRAFFIC_DIRECTOR_AUTHORITY: &str = "traffic-director-global.xds.googleapis.com";

const XDS_SCHEME: &str = "xds";

/// Activates CSM labels on xDS client channels and on every server.
///
/// A server can be part of the mesh without being xDS managed, so the server
/// side is never gated. Client channels must use the `xds` scheme and, when
/// the target names an authority, it must be Traffic Director.
#[derive(Debug, Clone)]
pub struct CsmPluginOption {
    injector: CsmLabelInjector,
}

impl CsmPluginOption {
    pub fn new(injector: CsmLabelInjector) -> Self {
        Self { injector }
    }

    pub fn from_env() -> Self {
        Self::new(CsmLabelInjector::from_env())
    }

    pub fn with_environment(env: &CsmEnvironment) -> Self {
        Self::new(CsmLabelInjector::new(env))
    }

    pub fn injector(&self) -> &CsmLabelInjector {
        &self.injector
    }
}

impl PluginOption for CsmPluginOption {
    fn is_active_on_client(&self, target: &str) -> bool {
        let Ok(url) = Url::parse(target) else {
            return false;
        };
        if url.scheme() != XDS_SCHEME {
            return false;
        }
        let authority = authority(&url);
        authority.is_empty() || authority == TRAFFIC_DIRECTOR_AUTHORITY
    }

    fn is_active_on_server(&self, _xds_enabled: bool) -> bool {
        true
    }

    fn label_injector(&self) -> Option<&dyn LabelInjector> {
        Some(&self.injector)
    }
}

/// Full authority of `url`: userinfo, host and port as written.
fn authority(url: &Url) -> String {
    let mut authority = String::new();
    if !url.username().is_empty() || url.password().is_some() {
        authority.push_str(url.username());
        if let Some(password) = url.password() {
            authority.push(':');
            authority.push_str(password);
        }
        authority.push('@');
    }
    authority.push_str(url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        authority.push(':');
        authority.push_str(&port.to_string());
    }
    authority
}
