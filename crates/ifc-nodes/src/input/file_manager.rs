//! File Manager Node
//!
//! Loads a model through the injected model store and, when a viewer is
//! present, displays it.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use node_engine::{
    GraphNode, NodeCategory, NodeDescriptor, NodeEngineError, NodeInputs, NodeOutput,
    NodeProcessor, NodeTypeMetadata, PortDataType, PortMetadata, ProcessorContext, Result,
    ToolDescriptor,
};

use crate::resources::{model_store, model_viewer};
use crate::values::node_config;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileManagerConfig {
    file: Option<String>,
}

/// Loads `data.file`
///
/// # Outputs
/// - `model` - The loaded model
/// - `fileName` - Source name
/// - `elementCount` - Number of elements
pub struct FileManagerProcessor;

impl FileManagerProcessor {
    pub const NODE_TYPE: &'static str = "fileManagerNode";
    pub const PORT_MODEL: &'static str = "model";
    pub const PORT_FILE_NAME: &'static str = "fileName";
    pub const PORT_ELEMENT_COUNT: &'static str = "elementCount";
}

impl NodeDescriptor for FileManagerProcessor {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::NODE_TYPE, NodeCategory::Input, "IFC File")
            .with_description("Loads an IFC model")
            .with_icon("file")
            .with_default_data(json!({"file": null, "isLoading": false}))
            .with_output(PortMetadata::optional(Self::PORT_MODEL, "Model", PortDataType::Model))
            .with_output(PortMetadata::optional(
                Self::PORT_FILE_NAME,
                "File name",
                PortDataType::String,
            ))
            .with_output(PortMetadata::optional(
                Self::PORT_ELEMENT_COUNT,
                "Element count",
                PortDataType::Number,
            ))
            .with_tool(ToolDescriptor::new(
                "load_ifc_file",
                "Load an IFC file so later tools can query it",
                json!({
                    "type": "object",
                    "properties": {
                        "file": {"type": "string", "minLength": 1, "description": "IFC file name"}
                    },
                    "required": ["file"]
                }),
            ))
    }
}

#[async_trait]
impl NodeProcessor for FileManagerProcessor {
    async fn process(
        &self,
        node: &GraphNode,
        _inputs: NodeInputs,
        context: &ProcessorContext,
    ) -> Result<NodeOutput> {
        let config: FileManagerConfig = node_config(node)?;
        let file = config
            .file
            .filter(|f| !f.is_empty())
            .ok_or_else(|| NodeEngineError::MissingInput("file".to_string()))?;

        let store = model_store(context.extensions())?;
        context.update_node_data(&node.id, json!({"isLoading": true, "error": null}));
        log::debug!("FileManager {}: loading '{}'", node.id, file);

        let model = match store.load(&file).await {
            Ok(model) => model,
            Err(e) => {
                context.update_node_data(
                    &node.id,
                    json!({"isLoading": false, "error": e.to_string()}),
                );
                return Err(e);
            }
        };

        if let Some(viewer) = model_viewer(context.extensions()) {
            viewer.load_model(&model).await?;
        }

        let element_count = model.elements.len();
        let display = json!({
            "isLoading": false,
            "error": null,
            "fileName": file,
            "schema": model.schema,
            "elementCount": element_count,
        });
        Ok(NodeOutput::new(json!({
            "model": model,
            "fileName": file,
            "elementCount": element_count,
        }))
        .with_display(display))
    }
}
