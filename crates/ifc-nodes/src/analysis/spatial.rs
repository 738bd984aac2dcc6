//! Spatial Node
//!
//! Groups elements by their containing storey.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use node_engine::{
    GraphNode, InputsExt, NodeCategory, NodeDescriptor, NodeInputs, NodeOutput, NodeProcessor,
    NodeStatus, NodeTypeMetadata, PortDataType, PortMetadata, ProcessorContext, Result,
    ToolDescriptor,
};

use crate::values::elements_from;

pub struct SpatialProcessor;

impl SpatialProcessor {
    pub const NODE_TYPE: &'static str = "spatialNode";
    pub const PORT_INPUT: &'static str = "input";
}

impl NodeDescriptor for SpatialProcessor {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::NODE_TYPE, NodeCategory::Analysis, "Spatial Structure")
            .with_description("Elements per building storey")
            .with_icon("layers")
            .with_status(NodeStatus::WorkInProgress)
            .with_input(PortMetadata::required(
                Self::PORT_INPUT,
                "Elements",
                PortDataType::Elements,
            ))
            .with_output(PortMetadata::optional("storeys", "Storeys", PortDataType::Json))
            .with_tool(ToolDescriptor::new(
                "analyze_spatial_structure",
                "Group the previous result by building storey",
                json!({"type": "object", "properties": {}}),
            ))
    }
}

#[async_trait]
impl NodeProcessor for SpatialProcessor {
    async fn process(
        &self,
        node: &GraphNode,
        inputs: NodeInputs,
        _context: &ProcessorContext,
    ) -> Result<NodeOutput> {
        let elements = elements_from(inputs.require(Self::PORT_INPUT)?)?;

        // Storeys keep first-seen order
        let mut storeys: Vec<(String, Vec<String>)> = Vec::new();
        let mut unassigned = Vec::new();
        for element in elements {
            match element.storey {
                Some(storey) => match storeys.iter_mut().find(|(name, _)| *name == storey) {
                    Some((_, ids)) => ids.push(element.global_id),
                    None => storeys.push((storey, vec![element.global_id])),
                },
                None => unassigned.push(element.global_id),
            }
        }

        log::debug!("Spatial {}: {} storeys", node.id, storeys.len());

        let storey_count = storeys.len();
        let storeys: Map<String, Value> = storeys
            .into_iter()
            .map(|(name, ids)| (name, json!(ids)))
            .collect();
        Ok(NodeOutput::new(json!({
            "storeys": storeys,
            "unassigned": unassigned,
            "storeyCount": storey_count,
        }))
        .with_display(json!({"storeyCount": storey_count})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::sample_model;
    use crate::test_support::{context_with, run};

    #[tokio::test]
    async fn test_groups_by_storey() {
        let mut inputs = NodeInputs::new();
        inputs.insert("input".into(), json!({"model": sample_model()}));
        let context = context_with(vec![], None, None);

        let output = run(
            &SpatialProcessor,
            &GraphNode::new("sp", SpatialProcessor::NODE_TYPE),
            inputs,
            &context,
        )
        .await
        .unwrap()
        .value;

        assert_eq!(output["storeys"]["Ground Floor"], json!(["1wall", "3door", "4slab"]));
        assert_eq!(output["storeys"]["First Floor"], json!(["2wall"]));
        assert_eq!(output["unassigned"], json!(["5proxy"]));
        assert_eq!(output["storeyCount"], json!(2));
    }
}
