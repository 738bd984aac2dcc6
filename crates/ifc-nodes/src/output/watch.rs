//! Watch Node
//!
//! Shows whatever flows into it on the node itself.

use async_trait::async_trait;
use serde_json::{json, Value};

use node_engine::{
    GraphNode, NodeCategory, NodeDescriptor, NodeInputs, NodeOutput, NodeProcessor,
    NodeTypeMetadata, PortDataType, PortMetadata, ProcessorContext, Result,
};

pub struct WatchProcessor;

impl WatchProcessor {
    pub const NODE_TYPE: &'static str = "watchNode";
    pub const PORT_INPUT: &'static str = "input";
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl NodeDescriptor for WatchProcessor {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::NODE_TYPE, NodeCategory::Output, "Watch")
            .with_description("Displays the incoming value")
            .with_icon("monitor")
            .with_default_data(json!({"displayValue": null}))
            .with_input(PortMetadata::optional(Self::PORT_INPUT, "Value", PortDataType::Any))
            .with_output(PortMetadata::optional("value", "Value", PortDataType::Any))
    }
}

#[async_trait]
impl NodeProcessor for WatchProcessor {
    async fn process(
        &self,
        node: &GraphNode,
        inputs: NodeInputs,
        context: &ProcessorContext,
    ) -> Result<NodeOutput> {
        let value = inputs.get(Self::PORT_INPUT).cloned().unwrap_or_default();
        context.update_node_data(
            &node.id,
            json!({"displayValue": value, "valueType": value_type(&value)}),
        );
        Ok(NodeOutput::new(value))
    }
}
