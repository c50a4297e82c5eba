//! Mesh id discovery from the xDS bootstrap.

use std::path::Path;

use meshtel_core::UNKNOWN;
use serde::Deserialize;

use crate::env::CsmEnvironment;

#[derive(Debug, Deserialize)]
struct Bootstrap {
    node: Node,
}

#[derive(Debug, Deserialize)]
struct Node {
    id: String,
}

/// Contents of the xDS bootstrap.
///
/// `GRPC_XDS_BOOTSTRAP` is consulted before `GRPC_XDS_BOOTSTRAP_CONFIG`. A
/// value that names an existing file is read from disk; any other value is
/// taken as inline JSON.
pub fn bootstrap_contents(env: &CsmEnvironment) -> Option<String> {
    let value = env
        .bootstrap
        .as_deref()
        .or(env.bootstrap_config.as_deref())?;
    if Path::new(value).is_file() {
        match std::fs::read_to_string(value) {
            Ok(contents) => return Some(contents),
            Err(e) => {
                tracing::warn!(path = value, error = %e, "Failed to read xDS bootstrap file");
                return None;
            }
        }
    }
    Some(value.to_string())
}

/// Extract the mesh id from a node id of the form
/// `projects/<project>/networks/mesh:<mesh>/nodes/<uuid>`.
pub fn parse_mesh_id(node_id: &str) -> Option<&str> {
    let parts: Vec<&str> = node_id.split('/').collect();
    if parts.len() != 6 {
        return None;
    }
    parts[3].strip_prefix("mesh:")
}

/// Mesh id from bootstrap JSON, or `unknown`.
pub fn mesh_id_from_json(json: &str) -> String {
    let bootstrap: Bootstrap = match serde_json::from_str(json) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse xDS bootstrap, mesh id is unknown");
            return UNKNOWN.to_string();
        }
    };
    match parse_mesh_id(&bootstrap.node.id) {
        Some(id) => id.to_string(),
        None => {
            tracing::debug!(node_id = %bootstrap.node.id, "Node id does not carry a mesh id");
            UNKNOWN.to_string()
        }
    }
}

/// Mesh id for `env`, or `unknown` when no usable bootstrap is found.
pub fn mesh_id(env: &CsmEnvironment) -> String {
    match bootstrap_contents(env) {
        Some(json) => mesh_id_from_json(&json),
        None => UNKNOWN.to_string(),
    }
}
