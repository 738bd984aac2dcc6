//! Export Node
//!
//! Serializes elements as CSV or JSON, optionally writing the result to
//! a file under the host's [`ExportRoot`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use node_engine::{
    GraphNode, InputsExt, NodeCategory, NodeDescriptor, NodeEngineError, NodeInputs, NodeOutput,
    NodeProcessor, NodeTypeMetadata, PortDataType, PortMetadata, ProcessorContext, Result,
    ToolDescriptor,
};

use crate::model::IfcElement;
use crate::resources::{export_root, ExportRoot};
use crate::values::{elements_from, node_config};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

const DEFAULT_COLUMNS: [&str; 4] = ["globalId", "ifcType", "name", "storey"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ExportConfig {
    format: ExportFormat,
    columns: Vec<String>,
    path: Option<PathBuf>,
}

impl ExportConfig {
    fn columns(&self) -> Vec<String> {
        if self.columns.is_empty() {
            DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect()
        } else {
            self.columns.clone()
        }
    }
}

fn cell(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}

fn to_csv(elements: &[IfcElement], columns: &[String]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_error = |e: csv::Error| NodeEngineError::failed(format!("CSV export failed: {}", e));

    writer.write_record(columns).map_err(csv_error)?;
    for element in elements {
        writer
            .write_record(columns.iter().map(|c| cell(element.field(c))))
            .map_err(csv_error)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| NodeEngineError::failed(format!("CSV export failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| NodeEngineError::failed(e.to_string()))
}

fn to_json(elements: &[IfcElement], columns: &[String]) -> Result<String> {
    let rows: Vec<Map<String, Value>> = elements
        .iter()
        .map(|element| {
            columns
                .iter()
                .map(|c| (c.clone(), element.field(c).unwrap_or(Value::Null)))
                .collect()
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

async fn write_export(root: &ExportRoot, target: &Path, content: &str) -> Result<PathBuf> {
    let path = root.resolve(target)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, content).await?;
    Ok(path)
}

/// Writes one row per input element
///
/// Columns are field references as understood by [`IfcElement::field`].
pub struct ExportProcessor;

impl ExportProcessor {
    pub const NODE_TYPE: &'static str = "exportNode";
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_CONTENT: &'static str = "content";
}

impl NodeDescriptor for ExportProcessor {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::NODE_TYPE, NodeCategory::Output, "Export")
            .with_description("Export elements as CSV or JSON")
            .with_icon("download")
            .with_default_data(json!({"format": "csv", "columns": []}))
            .with_input(PortMetadata::required(
                Self::PORT_INPUT,
                "Elements",
                PortDataType::Elements,
            ))
            .with_output(PortMetadata::optional(
                Self::PORT_CONTENT,
                "Content",
                PortDataType::String,
            ))
            .with_tool(ToolDescriptor::new(
                "export_elements",
                "Export the previous result as CSV or JSON",
                json!({
                    "type": "object",
                    "properties": {
                        "format": {"enum": ["csv", "json"]},
                        "columns": {"type": "array", "items": {"type": "string"}},
                        "path": {
                            "type": "string",
                            "description": "File name relative to the export directory"
                        }
                    }
                }),
            ))
    }
}

#[async_trait]
impl NodeProcessor for ExportProcessor {
    async fn process(
        &self,
        node: &GraphNode,
        inputs: NodeInputs,
        context: &ProcessorContext,
    ) -> Result<NodeOutput> {
        let config: ExportConfig = node_config(node)?;
        let elements = elements_from(inputs.require(Self::PORT_INPUT)?)?;
        let columns = config.columns();

        let content = match config.format {
            ExportFormat::Csv => to_csv(&elements, &columns)?,
            ExportFormat::Json => to_json(&elements, &columns)?,
        };

        let written = match &config.path {
            Some(target) => {
                let root = export_root(context.extensions())
                    .ok_or_else(|| NodeEngineError::resource("No export directory configured"))?;
                Some(write_export(root, target, &content).await?)
            }
            None => None,
        };
        if let Some(path) = &written {
            log::info!("Exported {} rows to {:?}", elements.len(), path);
        }

        Ok(NodeOutput::new(json!({
            "format": config.format,
            "content": content,
            "rowCount": elements.len(),
            "path": written,
        }))
        .with_display(json!({"rowCount": elements.len()})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::sample_model;
    use crate::resources::keys;
    use crate::test_support::{context_from, context_with, run};
    use node_engine::processor::ResultCache;
    use node_engine::ExecutorExtensions;

    async fn export_in(data: Value, context: &ProcessorContext) -> Result<Value> {
        let mut node = GraphNode::new("x1", ExportProcessor::NODE_TYPE);
        if let Value::Object(map) = data {
            node.data = map;
        }
        let mut inputs = NodeInputs::new();
        inputs.insert("input".into(), json!({"model": sample_model()}));
        Ok(run(&ExportProcessor, &node, inputs, context).await?.value)
    }

    async fn export(data: Value) -> Value {
        export_in(data, &context_with(vec![], None, None)).await.unwrap()
    }

    fn rooted(dir: &Path) -> ProcessorContext {
        let extensions = ExecutorExtensions::new().with(keys::EXPORT_ROOT, ExportRoot::new(dir));
        context_from(vec![], ResultCache::default(), extensions)
    }

    #[tokio::test]
    async fn test_csv_with_default_columns() {
        let output = export(json!({"format": "csv"})).await;
        let content = output["content"].as_str().unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(output["rowCount"], json!(5));
        assert_eq!(lines[0], "globalId,ifcType,name,storey");
        assert_eq!(lines[1], "1wall,IfcWall,Exterior Wall,Ground Floor");
        assert_eq!(lines[5], "5proxy,IfcBuildingElementProxy,,");
    }

    #[tokio::test]
    async fn test_json_with_property_columns() {
        let output = export(json!({
            "format": "json",
            "columns": ["globalId", "Pset_WallCommon.FireRating"]
        }))
        .await;
        let rows: Vec<Value> = serde_json::from_str(output["content"].as_str().unwrap()).unwrap();

        assert_eq!(rows[0], json!({"globalId": "1wall", "Pset_WallCommon.FireRating": "REI60"}));
        assert!(rows[1]["Pset_WallCommon.FireRating"].is_null());
        assert!(output["path"].is_null());
    }

    #[tokio::test]
    async fn test_writes_file_under_export_root() {
        let dir = tempfile::tempdir().unwrap();
        let output = export_in(json!({"path": "out/walls.csv"}), &rooted(dir.path()))
            .await
            .unwrap();

        let path = dir.path().join("out").join("walls.csv");
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, output["content"].as_str().unwrap());
        assert!(written.starts_with("globalId,"));
        assert_eq!(output["path"], json!(path));
    }

    #[tokio::test]
    async fn test_refuses_paths_outside_export_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("exports");
        let context = rooted(&root);
        let outside = dir.path().join("escaped.csv");

        for target in [json!(outside), json!("../escaped.csv")] {
            let err = export_in(json!({"path": target}), &context).await.unwrap_err();
            assert!(err.to_string().contains("export directory"), "{}", err);
        }
        assert!(!outside.exists());

        let unrooted = context_with(vec![], None, None);
        let err = export_in(json!({"path": "walls.csv"}), &unrooted).await.unwrap_err();
        assert!(matches!(err, NodeEngineError::Resource(_)));
    }
}
