//! Project Info Node
//!
//! Summarizes a model: project identity, schema, storeys and element
//! counts per type.

use async_trait::async_trait;
use serde_json::json;

use node_engine::{
    GraphNode, NodeCategory, NodeDescriptor, NodeEngineError, NodeInputs, NodeOutput,
    NodeProcessor, NodeTypeMetadata, PortDataType, PortMetadata, ProcessorContext, Result,
    ToolDescriptor,
};

use super::FileManagerProcessor;
use crate::model::IfcModel;
use crate::values::model_from;

pub struct ProjectInfoProcessor;

impl ProjectInfoProcessor {
    pub const NODE_TYPE: &'static str = "projectInfoNode";
    pub const PORT_INPUT: &'static str = "input";

    /// The connected model, or else the first file manager node's cached
    /// result
    ///
    /// The executor wires an unconnected node to that file manager through
    /// `implicit_upstream`, so the cache lookup only matters when the node is
    /// invoked outside a whole-graph run.
    async fn resolve_model(inputs: &NodeInputs, context: &ProcessorContext) -> Result<IfcModel> {
        if let Some(value) = inputs.get(Self::PORT_INPUT) {
            return model_from(value);
        }

        let file_node = context
            .graph()
            .find_node_by_type(FileManagerProcessor::NODE_TYPE)
            .ok_or_else(|| NodeEngineError::MissingInput(Self::PORT_INPUT.to_string()))?;
        let cached = context.result(&file_node.id).await.ok_or_else(|| {
            NodeEngineError::failed(format!(
                "File node '{}' has not produced a model yet",
                file_node.id
            ))
        })?;
        model_from(&cached)
    }
}

impl NodeDescriptor for ProjectInfoProcessor {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::NODE_TYPE, NodeCategory::Input, "Project Info")
            .with_description("Project name, schema, storeys and element counts")
            .with_icon("info")
            .with_implicit_upstream(FileManagerProcessor::NODE_TYPE)
            .with_input(PortMetadata::optional(Self::PORT_INPUT, "Model", PortDataType::Model))
            .with_output(PortMetadata::optional("project", "Project", PortDataType::Json))
            .with_output(PortMetadata::optional("storeys", "Storeys", PortDataType::Json))
            .with_output(PortMetadata::optional("typeCounts", "Type counts", PortDataType::Json))
            .with_tool(ToolDescriptor::new(
                "get_project_info",
                "Summarize the loaded model: project, schema, storeys and element types",
                json!({"type": "object", "properties": {}}),
            ))
    }
}

#[async_trait]
impl NodeProcessor for ProjectInfoProcessor {
    async fn process(
        &self,
        node: &GraphNode,
        inputs: NodeInputs,
        context: &ProcessorContext,
    ) -> Result<NodeOutput> {
        let model = Self::resolve_model(&inputs, context).await?;
        log::debug!("ProjectInfo {}: summarizing '{}'", node.id, model.file_name);

        let project = model.project.clone().unwrap_or_default();
        let info = json!({
            "project": {
                "globalId": project.global_id,
                "name": project.name,
                "description": project.description,
                "phase": project.phase,
            },
            "schema": model.schema,
            "fileName": model.file_name,
            "storeys": model.storeys(),
            "elementCount": model.elements.len(),
            "typeCounts": model.type_counts(),
        });
        Ok(NodeOutput::new(info.clone()).with_display(json!({"info": info})))
    }
}
