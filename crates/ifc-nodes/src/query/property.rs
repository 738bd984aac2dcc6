//! Property Node
//!
//! Extracts one property from every input element.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use node_engine::{
    GraphNode, InputsExt, NodeCategory, NodeDescriptor, NodeEngineError, NodeInputs, NodeOutput,
    NodeProcessor, NodeTypeMetadata, PortDataType, PortMetadata, ProcessorContext, Result,
    ToolDescriptor,
};

use crate::values::{elements_from, node_config};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PropertyConfig {
    property_name: String,
    property_set: Option<String>,
}

/// Reads `data.propertyName` (optionally from `data.propertySet`)
///
/// Elements without the property are skipped, so `count` is the number
/// of values found rather than the number of input elements.
pub struct PropertyProcessor;

impl PropertyProcessor {
    pub const NODE_TYPE: &'static str = "propertyNode";
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_VALUES: &'static str = "values";
}

impl NodeDescriptor for PropertyProcessor {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::NODE_TYPE, NodeCategory::Query, "Property")
            .with_description("Reads a property value from each element")
            .with_icon("list")
            .with_default_data(json!({"propertyName": "", "propertySet": ""}))
            .with_input(PortMetadata::required(
                Self::PORT_INPUT,
                "Elements",
                PortDataType::Elements,
            ))
            .with_output(PortMetadata::optional(Self::PORT_VALUES, "Values", PortDataType::Json))
            .with_tool(ToolDescriptor::new(
                "get_element_properties",
                "Read one property from each element of the previous result",
                json!({
                    "type": "object",
                    "properties": {
                        "propertyName": {"type": "string", "minLength": 1},
                        "propertySet": {"type": "string"}
                    },
                    "required": ["propertyName"]
                }),
            ))
    }
}

#[async_trait]
impl NodeProcessor for PropertyProcessor {
    async fn process(
        &self,
        node: &GraphNode,
        inputs: NodeInputs,
        _context: &ProcessorContext,
    ) -> Result<NodeOutput> {
        let config: PropertyConfig = node_config(node)?;
        if config.property_name.is_empty() {
            return Err(NodeEngineError::MissingInput("propertyName".to_string()));
        }
        let property_set = config.property_set.as_deref().filter(|s| !s.is_empty());
        let elements = elements_from(inputs.require(Self::PORT_INPUT)?)?;

        let values: Vec<_> = elements
            .iter()
            .filter_map(|element| {
                let value = element.property(property_set, &config.property_name)?;
                Some(json!({
                    "globalId": element.global_id,
                    "name": element.name,
                    "value": value,
                }))
            })
            .collect();

        log::debug!(
            "Property {}: '{}' found on {}/{} elements",
            node.id,
            config.property_name,
            values.len(),
            elements.len()
        );

        let count = values.len();
        Ok(NodeOutput::new(json!({
            "property": config.property_name,
            "values": values,
            "count": count,
        }))
        .with_display(json!({"resultCount": count})))
    }
}
