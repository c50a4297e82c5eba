//! tonic and tower glue for the peer label exchange.
//!
//! - [`PeerMetadataInterceptor`] adds the local bundle to outgoing client
//!   calls.
//! - [`PeerExchangeLayer`] answers it on the server and records server call
//!   metrics.
//! - [`peer_labels_from_metadata`] turns a received header back into raw
//!   labels for a [`MetricRecord`](meshtel_core::MetricRecord).

pub mod interceptor;
pub mod layer;
pub mod metadata;

pub use interceptor::{client_call_record, PeerMetadataInterceptor};
pub use layer::{ExchangeBody, PeerExchangeFuture, PeerExchangeLayer, PeerExchangeService};
pub use metadata::{
    exchange_metadata_value, insert_exchange_metadata, peer_labels_from_headers,
    peer_labels_from_metadata, status_from_headers, status_label,
};
