//! In-memory building model
//!
//! The shape produced by the IFC parsing worker and consumed by every
//! processor: a flat element list with spatial containment and property
//! sets already resolved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Property set name → property name → value
pub type PropertySets = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

/// A loaded model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IfcModel {
    pub id: String,
    pub file_name: String,
    /// Schema identifier, e.g. "IFC4"
    pub schema: String,
    pub project: Option<IfcProject>,
    pub elements: Vec<IfcElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IfcProject {
    pub global_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub phase: Option<String>,
}

/// A single building element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IfcElement {
    pub express_id: u64,
    pub global_id: String,
    /// Entity name, e.g. "IfcWall"
    pub ifc_type: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub object_type: Option<String>,
    /// Name of the containing building storey
    pub storey: Option<String>,
    /// Includes `Qto_*` quantity sets
    pub property_sets: PropertySets,
}

impl IfcElement {
    /// Look up a property, optionally restricted to one property set
    ///
    /// Without a set name the first set (by name) holding the property wins.
    pub fn property(&self, property_set: Option<&str>, name: &str) -> Option<&serde_json::Value> {
        match property_set {
            Some(pset) => self.property_sets.get(pset)?.get(name),
            None => self.property_sets.values().find_map(|props| props.get(name)),
        }
    }

    /// Resolve a column or field reference
    ///
    /// Accepts an attribute name (`globalId`, `ifcType`, `name`, ...), a
    /// `Pset.Property` reference, or a bare property name.
    pub fn field(&self, key: &str) -> Option<serde_json::Value> {
        use serde_json::Value;

        let text = |v: &Option<String>| v.clone().map(Value::String);
        match key {
            "expressId" => Some(Value::from(self.express_id)),
            "globalId" => Some(Value::String(self.global_id.clone())),
            "ifcType" | "type" => Some(Value::String(self.ifc_type.clone())),
            "name" => text(&self.name),
            "description" => text(&self.description),
            "objectType" => text(&self.object_type),
            "storey" => text(&self.storey),
            _ => match key.split_once('.') {
                Some((pset, prop)) => self.property(Some(pset), prop).cloned(),
                None => self.property(None, key).cloned(),
            },
        }
    }

    /// Numeric value of a field; numeric strings are accepted
    pub fn numeric_field(&self, key: &str) -> Option<f64> {
        as_number(&self.field(key)?)
    }

    /// Case-insensitive substring match over name, type and GlobalId
    pub fn matches_text(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        [
            self.name.as_deref(),
            Some(self.ifc_type.as_str()),
            Some(self.global_id.as_str()),
            self.object_type.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|s| s.to_lowercase().contains(&query))
    }

    /// Case-insensitive entity name comparison
    pub fn is_type(&self, ifc_type: &str) -> bool {
        self.ifc_type.eq_ignore_ascii_case(ifc_type)
    }
}

/// Interpret a JSON value as a number
pub fn as_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl IfcModel {
    /// Storey names in first-seen order
    pub fn storeys(&self) -> Vec<String> {
        let mut storeys: Vec<String> = Vec::new();
        for storey in self.elements.iter().filter_map(|e| e.storey.as_ref()) {
            if !storeys.contains(storey) {
                storeys.push(storey.clone());
            }
        }
        storeys
    }

    /// Element count per entity name
    pub fn type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for element in &self.elements {
            *counts.entry(element.ifc_type.clone()).or_insert(0) += 1;
        }
        counts
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_model;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_resolution() {
        let model = sample_model();
        let wall = &model.elements[0];

        assert_eq!(wall.field("globalId"), Some(json!("1wall")));
        assert_eq!(wall.field("Pset_WallCommon.FireRating"), Some(json!("REI60")));
        assert_eq!(wall.field("NetVolume"), Some(json!(4.5)));
        assert_eq!(wall.field("description"), None);
        assert_eq!(model.elements[1].numeric_field("NetVolume"), Some(1.5));
    }

    #[test]
    fn test_text_and_type_matching() {
        let model = sample_model();
        let door = &model.elements[2];

        assert!(door.matches_text("front"));
        assert!(door.matches_text("swing"));
        assert!(door.matches_text("3DOOR"));
        assert!(!door.matches_text("window"));
        assert!(door.is_type("IFCDOOR"));
    }

    #[test]
    fn test_model_summaries() {
        let model = sample_model();
        assert_eq!(model.storeys(), vec!["Ground Floor", "First Floor"]);
        assert_eq!(model.type_counts()["IfcWall"], 2);
    }

    #[test]
    fn test_model_document_shape() {
        let model: IfcModel = serde_json::from_value(json!({
            "fileName": "a.ifc",
            "schema": "IFC2X3",
            "elements": [{"expressId": 7, "globalId": "g", "ifcType": "IfcBeam",
                          "propertySets": {"Pset_BeamCommon": {"Span": 3}}}]
        }))
        .unwrap();

        assert_eq!(model.elements[0].express_id, 7);
        assert_eq!(model.elements[0].property(Some("Pset_BeamCommon"), "Span"), Some(&json!(3)));
        assert!(model.project.is_none());
    }
}
