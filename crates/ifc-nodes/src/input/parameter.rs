//! Parameter Node
//!
//! Emits a constant from its data bag.

use async_trait::async_trait;
use serde_json::json;

use node_engine::{
    GraphNode, NodeCategory, NodeDescriptor, NodeInputs, NodeOutput, NodeProcessor,
    NodeTypeMetadata, PortDataType, PortMetadata, ProcessorContext, Result,
};

pub struct ParameterProcessor;

impl ParameterProcessor {
    pub const NODE_TYPE: &'static str = "parameterNode";
    pub const PORT_VALUE: &'static str = "value";
}

impl NodeDescriptor for ParameterProcessor {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::NODE_TYPE, NodeCategory::Input, "Parameter")
            .with_description("A constant value")
            .with_icon("sliders")
            .with_default_data(json!({"value": ""}))
            .with_output(PortMetadata::optional(Self::PORT_VALUE, "Value", PortDataType::Any))
    }
}

#[async_trait]
impl NodeProcessor for ParameterProcessor {
    async fn process(
        &self,
        node: &GraphNode,
        _inputs: NodeInputs,
        _context: &ProcessorContext,
    ) -> Result<NodeOutput> {
        Ok(NodeOutput::new(
            node.data.get(Self::PORT_VALUE).cloned().unwrap_or_default(),
        ))
    }
}
