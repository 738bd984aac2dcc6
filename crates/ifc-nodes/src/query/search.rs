//! Search Node
//!
//! Filters elements by free text, entity type and an optional property
//! condition. All given filters must match.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use node_engine::{
    GraphNode, InputsExt, NodeCategory, NodeDescriptor, NodeInputs, NodeOutput, NodeProcessor,
    NodeTypeMetadata, PortDataType, PortMetadata, ProcessorContext, Result, ToolDescriptor,
};

use crate::model::{as_number, IfcElement};
use crate::values::{elements_from, node_config};

/// Comparison applied by a property condition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    #[default]
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    Exists,
}

/// `propertySet.property <operator> value`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyCondition {
    pub property_set: Option<String>,
    pub property: String,
    pub operator: ConditionOperator,
    pub value: Option<Value>,
}

impl PropertyCondition {
    pub fn matches(&self, element: &IfcElement) -> bool {
        let pset = self.property_set.as_deref().filter(|s| !s.is_empty());
        let actual = match pset {
            Some(pset) => element.property(Some(pset), &self.property).cloned(),
            None => element.field(&self.property),
        };
        let Some(actual) = actual.filter(|v| !v.is_null()) else {
            return matches!(self.operator, ConditionOperator::NotEquals);
        };
        let expected = self.value.as_ref().unwrap_or(&Value::Null);

        match self.operator {
            ConditionOperator::Exists => true,
            ConditionOperator::Equals => loosely_equal(&actual, expected),
            ConditionOperator::NotEquals => !loosely_equal(&actual, expected),
            ConditionOperator::Contains => text_of(&actual)
                .to_lowercase()
                .contains(&text_of(expected).to_lowercase()),
            ConditionOperator::GreaterThan => compare(&actual, expected, |a, b| a > b),
            ConditionOperator::LessThan => compare(&actual, expected, |a, b| a < b),
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return (a - b).abs() < f64::EPSILON;
    }
    match (actual, expected) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Bool(a), Value::String(b)) | (Value::String(b), Value::Bool(a)) => {
            b.eq_ignore_ascii_case(if *a { "true" } else { "false" })
        }
        _ => text_of(actual).eq_ignore_ascii_case(&text_of(expected)),
    }
}

fn compare(actual: &Value, expected: &Value, op: fn(f64, f64) -> bool) -> bool {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SearchConfig {
    query: Option<String>,
    ifc_type: Option<String>,
    condition: Option<PropertyCondition>,
}

impl SearchConfig {
    fn matches(&self, element: &IfcElement) -> bool {
        let text_ok = match self.query.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => element.matches_text(q),
            _ => true,
        };
        let type_ok = match self.ifc_type.as_deref() {
            Some(t) if !t.is_empty() => element.is_type(t),
            _ => true,
        };
        let condition_ok = match &self.condition {
            Some(c) if !c.property.is_empty() => c.matches(element),
            _ => true,
        };
        text_ok && type_ok && condition_ok
    }
}

/// Filters the input elements
///
/// # Inputs
/// - `input` (required) - A model or an element list
///
/// # Node Data
/// - `query` - Text matched against name, type and GlobalId
/// - `ifcType` - Entity name, case-insensitive
/// - `condition` - `{propertySet, property, operator, value}`
///
/// # Outputs
/// - `elements` - Matching elements
/// - `count` - Number of matches
pub struct SearchProcessor;

impl SearchProcessor {
    pub const NODE_TYPE: &'static str = "searchNode";
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_ELEMENTS: &'static str = "elements";
    pub const PORT_COUNT: &'static str = "count";
}

impl NodeDescriptor for SearchProcessor {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::NODE_TYPE, NodeCategory::Query, "Search")
            .with_description("Finds elements by text, type or property value")
            .with_icon("search")
            .with_default_data(json!({"query": "", "ifcType": ""}))
            .with_input(PortMetadata::required(Self::PORT_INPUT, "Model", PortDataType::Model))
            .with_output(PortMetadata::optional(
                Self::PORT_ELEMENTS,
                "Elements",
                PortDataType::Elements,
            ))
            .with_output(PortMetadata::optional(Self::PORT_COUNT, "Count", PortDataType::Number))
            .with_tool(ToolDescriptor::new(
                "search_elements",
                "Find elements in the loaded model by text, IFC type or property value",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "ifcType": {"type": "string", "description": "e.g. IfcWall"},
                        "condition": {
                            "type": "object",
                            "properties": {
                                "propertySet": {"type": "string"},
                                "property": {"type": "string"},
                                "operator": {
                                    "enum": ["equals", "notEquals", "contains", "greaterThan", "lessThan", "exists"]
                                },
                                "value": {}
                            },
                            "required": ["property"]
                        }
                    }
                }),
            ))
    }
}

#[async_trait]
impl NodeProcessor for SearchProcessor {
    async fn process(
        &self,
        node: &GraphNode,
        inputs: NodeInputs,
        _context: &ProcessorContext,
    ) -> Result<NodeOutput> {
        let config: SearchConfig = node_config(node)?;
        let elements = elements_from(inputs.require(Self::PORT_INPUT)?)?;

        let matches: Vec<IfcElement> = elements.into_iter().filter(|e| config.matches(e)).collect();
        log::debug!("Search {}: {} matches", node.id, matches.len());

        let count = matches.len();
        Ok(NodeOutput::new(json!({
            "elements": matches,
            "count": count,
        }))
        .with_display(json!({"resultCount": count})))
    }
}
