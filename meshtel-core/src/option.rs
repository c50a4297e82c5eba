use crate::injector::LabelInjector;

/// Per-call input to an option's activation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationContext {
    /// Client call on a channel created for `target`.
    Client { target: String },
    /// Server call; `xds_enabled` tells whether the server is xDS managed.
    Server { xds_enabled: bool },
}

impl ActivationContext {
    pub fn client(target: impl Into<String>) -> Self {
        ActivationContext::Client {
            target: target.into(),
        }
    }

    pub fn server(xds_enabled: bool) -> Self {
        ActivationContext::Server { xds_enabled }
    }

    pub fn is_client(&self) -> bool {
        matches!(self, ActivationContext::Client { .. })
    }

    /// Evaluate `option`'s activation predicate for this context.
    pub fn activates(&self, option: &dyn PluginOption) -> bool {
        match self {
            ActivationContext::Client { target } => option.is_active_on_client(target),
            ActivationContext::Server { xds_enabled } => option.is_active_on_server(*xds_enabled),
        }
    }
}

/// Policy deciding, per call, whether an option takes part in recording.
///
/// An option either carries a [`LabelInjector`] or it does not; callers
/// branch on [`label_injector`](Self::label_injector) instead of probing
/// for optional hooks.
pub trait PluginOption: Send + Sync {
    /// Whether the option applies to a client channel for `target`.
    fn is_active_on_client(&self, target: &str) -> bool;

    /// Whether the option applies to a server.
    fn is_active_on_server(&self, xds_enabled: bool) -> bool;

    /// The label injector used by this option, if any.
    fn label_injector(&self) -> Option<&dyn LabelInjector> {
        None
    }
}
