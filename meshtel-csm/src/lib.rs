//! Cloud Service Mesh peer labels.
//!
//! [`CsmLabelInjector`] advertises the local workload's identity (GKE, GCE
//! or unknown) to peers and turns the peer's bundle into
//! `csm.remote_workload_*` labels. [`CsmPluginOption`] activates it on xDS
//! client channels and on every server.
//!
//! ```ignore
//! let plugin = meshtel_csm::csm_plugin(CsmPluginOption::from_env())
//!     .meter_provider(telemetry.meter_provider())
//!     .build();
//! ```

pub mod bootstrap;
pub mod env;
pub mod injector;
pub mod option;
pub mod peer;

pub use env::CsmEnvironment;
pub use injector::CsmLabelInjector;
pub use option::{CsmPluginOption, TRAFFIC_DIRECTOR_AUTHORITY};
pub use peer::{PeerIdentity, PeerType};

use meshtel_core::{OptionalLabel, PluginBuilder};

/// Plugin builder preconfigured with `option` and the xDS service labels.
pub fn csm_plugin(option: CsmPluginOption) -> PluginBuilder {
    PluginBuilder::new()
        .option(option)
        .enable_optional_label(OptionalLabel::XdsServiceLabels)
}
