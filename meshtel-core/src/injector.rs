use crate::labels::{LabelBundle, LabelMap, RawLabels};

/// Produces the local peer-identity bundle and interprets the remote one.
///
/// Implementations compute their local state once, at construction, and are
/// shared read-only across concurrent call completions afterwards.
///
/// # Example
///
/// ```ignore
/// struct StaticInjector {
///     exchange: LabelBundle,
/// }
///
/// impl LabelInjector for StaticInjector {
///     fn labels_for_exchange(&self) -> &LabelBundle {
///         &self.exchange
///     }
///
///     fn deserialize_and_merge(&self, incoming: &RawLabels) -> LabelMap {
///         let remote = incoming
///             .get(EXCHANGE_LABEL_KEY)
///             .map(|raw| codec::decode(raw))
///             .unwrap_or_default();
///         remote.to_label_map()
///     }
/// }
/// ```
pub trait LabelInjector: Send + Sync {
    /// Bundle sent to the peer through call metadata.
    fn labels_for_exchange(&self) -> &LabelBundle;

    /// Decode the remote bundle found in `incoming` (if any) and merge it with
    /// locally known labels into a flat label map.
    fn deserialize_and_merge(&self, incoming: &RawLabels) -> LabelMap;

    /// Labels derived from local state only. Never transmitted.
    fn additional_labels(&self) -> LabelBundle {
        LabelBundle::new()
    }

    /// Labels derived from control-plane supplied optional labels.
    fn optional_labels(&self, _is_client: bool, _optional: &LabelMap) -> LabelMap {
        LabelMap::new()
    }
}
