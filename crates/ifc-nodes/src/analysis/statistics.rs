//! Statistics Node
//!
//! Aggregates a numeric property or quantity, optionally grouped by
//! entity type or storey.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use node_engine::{
    GraphNode, InputsExt, NodeCategory, NodeDescriptor, NodeEngineError, NodeInputs, NodeOutput,
    NodeProcessor, NodeTypeMetadata, PortDataType, PortMetadata, ProcessorContext, Result,
    ToolDescriptor,
};

use crate::model::IfcElement;
use crate::values::{elements_from, node_config};

/// Group key for aggregation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupBy {
    #[default]
    None,
    Type,
    Storey,
}

impl GroupBy {
    fn key(self, element: &IfcElement) -> Option<String> {
        match self {
            Self::None => None,
            Self::Type => Some(element.ifc_type.clone()),
            Self::Storey => Some(
                element
                    .storey
                    .clone()
                    .unwrap_or_else(|| "Unassigned".to_string()),
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StatisticsConfig {
    property: String,
    group_by: GroupBy,
}

/// Running aggregate over numeric samples
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub total: f64,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Summary {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.average = Some(self.total / self.count as f64);
    }
}

/// Aggregates `data.property` over the input elements
///
/// Elements where the property is absent or not numeric are left out.
/// With no samples `average`, `min` and `max` are null.
pub struct StatisticsProcessor;

impl StatisticsProcessor {
    pub const NODE_TYPE: &'static str = "statisticsNode";
    pub const PORT_INPUT: &'static str = "input";
}

impl NodeDescriptor for StatisticsProcessor {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::NODE_TYPE, NodeCategory::Analysis, "Statistics")
            .with_description("Count, total, average, min and max of a numeric property")
            .with_icon("bar-chart")
            .with_default_data(json!({"property": "", "groupBy": "none"}))
            .with_input(PortMetadata::required(
                Self::PORT_INPUT,
                "Elements",
                PortDataType::Elements,
            ))
            .with_output(PortMetadata::optional("total", "Total", PortDataType::Number))
            .with_output(PortMetadata::optional("groups", "Groups", PortDataType::Json))
            .with_tool(ToolDescriptor::new(
                "calculate_statistics",
                "Aggregate a numeric property or quantity over the previous result",
                json!({
                    "type": "object",
                    "properties": {
                        "property": {"type": "string", "minLength": 1, "description": "e.g. NetVolume or Qto_WallBaseQuantities.NetVolume"},
                        "groupBy": {"enum": ["none", "type", "storey"]}
                    },
                    "required": ["property"]
                }),
            ))
    }
}

#[async_trait]
impl NodeProcessor for StatisticsProcessor {
    async fn process(
        &self,
        node: &GraphNode,
        inputs: NodeInputs,
        _context: &ProcessorContext,
    ) -> Result<NodeOutput> {
        let config: StatisticsConfig = node_config(node)?;
        if config.property.is_empty() {
            return Err(NodeEngineError::MissingInput("property".to_string()));
        }
        let elements = elements_from(inputs.require(Self::PORT_INPUT)?)?;

        let mut overall = Summary::default();
        let mut groups: BTreeMap<String, Summary> = BTreeMap::new();
        for element in &elements {
            let Some(value) = element.numeric_field(&config.property) else {
                continue;
            };
            overall.add(value);
            if let Some(key) = config.group_by.key(element) {
                groups.entry(key).or_default().add(value);
            }
        }

        log::debug!(
            "Statistics {}: {} samples of '{}'",
            node.id,
            overall.count,
            config.property
        );

        let output = json!({
            "property": config.property,
            "count": overall.count,
            "total": overall.total,
            "average": overall.average,
            "min": overall.min,
            "max": overall.max,
            "groups": groups,
        });
        Ok(NodeOutput::new(output.clone()).with_display(json!({"statistics": output})))
    }
}
