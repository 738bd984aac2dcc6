//! Helpers for the value shapes that flow between IFC nodes
//!
//! Upstream outputs reach a node in several shapes: a bare model, a
//! `{model, ...}` file-manager output, a bare element array, or an
//! `{elements, ...}` search output. Processors accept all of them.

use serde::de::DeserializeOwned;
use serde_json::Value;

use node_engine::{GraphNode, NodeEngineError, Result};

use crate::model::{IfcElement, IfcModel};

/// Deserialize a node's data bag into its typed configuration
///
/// Unknown keys (display state) are ignored; missing keys take defaults.
pub fn node_config<T: DeserializeOwned>(node: &GraphNode) -> Result<T> {
    serde_json::from_value(Value::Object(node.data.clone())).map_err(|e| {
        NodeEngineError::failed(format!("Invalid configuration for node '{}': {}", node.id, e))
    })
}

/// Extract a model from a model or `{model}` value
pub fn model_from(value: &Value) -> Result<IfcModel> {
    let inner = value.get("model").unwrap_or(value);
    if !inner.is_object() || inner.get("elements").is_none() {
        return Err(NodeEngineError::InvalidInputType {
            port: "input".to_string(),
            expected: "model".to_string(),
        });
    }
    Ok(serde_json::from_value(inner.clone())?)
}

/// Extract an element list from any supported shape
pub fn elements_from(value: &Value) -> Result<Vec<IfcElement>> {
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value.clone())?),
        Value::Object(map) => {
            if let Some(elements) = map.get("elements") {
                elements_from(elements)
            } else if let Some(model) = map.get("model") {
                elements_from(model)
            } else {
                Err(NodeEngineError::InvalidInputType {
                    port: "input".to_string(),
                    expected: "elements".to_string(),
                })
            }
        }
        _ => Err(NodeEngineError::InvalidInputType {
            port: "input".to_string(),
            expected: "elements".to_string(),
        }),
    }
}

/// GlobalIds from elements, or from a plain array of id strings
pub fn global_ids_from(value: &Value) -> Result<Vec<String>> {
    let ids_only = value
        .as_array()
        .filter(|items| !items.is_empty() && items.iter().all(Value::is_string));
    if let Some(ids) = ids_only {
        return Ok(ids
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect());
    }
    Ok(elements_from(value)?
        .into_iter()
        .map(|e| e.global_id)
        .collect())
}
