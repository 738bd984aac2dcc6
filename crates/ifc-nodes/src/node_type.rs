//! The closed set of IFC node types
//!
//! Every type id the editor knows is a variant here. The registry, the
//! tool table and the auto-wiring defaults are all derived from it, so a
//! new node type cannot be half-registered.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use node_engine::{
    AutoWiring, NodeDescriptor, NodeEngineError, NodeProcessor, NodeRegistry, NodeTypeMetadata,
    ToolNodeMap,
};

use crate::analysis::{SpatialProcessor, StatisticsProcessor};
use crate::input::{FileManagerProcessor, ParameterProcessor, ProjectInfoProcessor};
use crate::output::{ExportProcessor, WatchProcessor};
use crate::query::{PropertyProcessor, SearchProcessor};
use crate::viewer::AiVisibilityProcessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IfcNodeType {
    FileManager,
    ProjectInfo,
    Parameter,
    Search,
    Property,
    Statistics,
    Spatial,
    AiVisibility,
    Export,
    Watch,
}

impl IfcNodeType {
    pub const ALL: [IfcNodeType; 10] = [
        Self::FileManager,
        Self::ProjectInfo,
        Self::Parameter,
        Self::Search,
        Self::Property,
        Self::Statistics,
        Self::Spatial,
        Self::AiVisibility,
        Self::Export,
        Self::Watch,
    ];

    /// Type id as stored in `node.type`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileManager => FileManagerProcessor::NODE_TYPE,
            Self::ProjectInfo => ProjectInfoProcessor::NODE_TYPE,
            Self::Parameter => ParameterProcessor::NODE_TYPE,
            Self::Search => SearchProcessor::NODE_TYPE,
            Self::Property => PropertyProcessor::NODE_TYPE,
            Self::Statistics => StatisticsProcessor::NODE_TYPE,
            Self::Spatial => SpatialProcessor::NODE_TYPE,
            Self::AiVisibility => AiVisibilityProcessor::NODE_TYPE,
            Self::Export => ExportProcessor::NODE_TYPE,
            Self::Watch => WatchProcessor::NODE_TYPE,
        }
    }

    pub fn descriptor(self) -> NodeTypeMetadata {
        match self {
            Self::FileManager => FileManagerProcessor::descriptor(),
            Self::ProjectInfo => ProjectInfoProcessor::descriptor(),
            Self::Parameter => ParameterProcessor::descriptor(),
            Self::Search => SearchProcessor::descriptor(),
            Self::Property => PropertyProcessor::descriptor(),
            Self::Statistics => StatisticsProcessor::descriptor(),
            Self::Spatial => SpatialProcessor::descriptor(),
            Self::AiVisibility => AiVisibilityProcessor::descriptor(),
            Self::Export => ExportProcessor::descriptor(),
            Self::Watch => WatchProcessor::descriptor(),
        }
    }

    /// A fresh processor instance
    ///
    /// The registry keeps one per type; stateful processors share their
    /// state across every node of that type.
    pub fn processor(self) -> Arc<dyn NodeProcessor> {
        match self {
            Self::FileManager => Arc::new(FileManagerProcessor),
            Self::ProjectInfo => Arc::new(ProjectInfoProcessor),
            Self::Parameter => Arc::new(ParameterProcessor),
            Self::Search => Arc::new(SearchProcessor),
            Self::Property => Arc::new(PropertyProcessor),
            Self::Statistics => Arc::new(StatisticsProcessor),
            Self::Spatial => Arc::new(SpatialProcessor),
            Self::AiVisibility => Arc::new(AiVisibilityProcessor::new()),
            Self::Export => Arc::new(ExportProcessor),
            Self::Watch => Arc::new(WatchProcessor),
        }
    }

    /// Handle this type's output is read from when auto-wired
    fn source_handle(self) -> Option<&'static str> {
        match self {
            Self::FileManager => Some(FileManagerProcessor::PORT_MODEL),
            Self::Search => Some(SearchProcessor::PORT_ELEMENTS),
            _ => None,
        }
    }

    /// Port an auto-wired edge lands on
    fn target_handle(self) -> Option<&'static str> {
        match self {
            Self::AiVisibility
            | Self::Property
            | Self::Statistics
            | Self::Spatial
            | Self::Export => Some("input"),
            _ => None,
        }
    }
}

impl fmt::Display for IfcNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IfcNodeType {
    type Err = NodeEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| NodeEngineError::UnknownNodeType(s.to_string()))
    }
}

/// Registry holding every IFC node type with its processor
pub fn build_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    for node_type in IfcNodeType::ALL {
        registry.register(node_type.descriptor(), node_type.processor());
    }
    registry
}

/// Agent tool name to node type, from the descriptors
pub fn default_tool_map() -> ToolNodeMap {
    IfcNodeType::ALL
        .into_iter()
        .filter_map(|t| {
            let tool = t.descriptor().tool?;
            Some((tool.name, t.as_str().to_string()))
        })
        .collect()
}

pub fn default_wiring() -> AutoWiring {
    let mut wiring = AutoWiring::default();
    for node_type in IfcNodeType::ALL {
        if let Some(handle) = node_type.source_handle() {
            wiring
                .source_handles
                .insert(node_type.as_str().to_string(), handle.to_string());
        }
        if let Some(handle) = node_type.target_handle() {
            wiring
                .target_handles
                .insert(node_type.as_str().to_string(), handle.to_string());
        }
    }
    wiring
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ids_round_trip_through_from_str() {
        for node_type in IfcNodeType::ALL {
            assert_eq!(node_type.as_str().parse::<IfcNodeType>().unwrap(), node_type);
            assert_eq!(node_type.descriptor().node_type, node_type.as_str());
        }
        assert!(matches!(
            "teleportNode".parse::<IfcNodeType>(),
            Err(NodeEngineError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn test_tool_table() {
        let tools = default_tool_map();
        assert_eq!(tools.len(), 8);
        assert_eq!(tools["load_ifc_file"], "fileManagerNode");
        assert_eq!(tools["get_project_info"], "projectInfoNode");
        assert_eq!(tools["search_elements"], "searchNode");
        assert_eq!(tools["get_element_properties"], "propertyNode");
        assert_eq!(tools["calculate_statistics"], "statisticsNode");
        assert_eq!(tools["analyze_spatial_structure"], "spatialNode");
        assert_eq!(tools["set_element_visibility"], "aiVisibilityNode");
        assert_eq!(tools["export_elements"], "exportNode");
    }

    #[test]
    fn test_wiring_defaults() {
        let wiring = default_wiring();
        assert_eq!(
            wiring.handles_for("fileManagerNode", "searchNode"),
            (Some("model".to_string()), None)
        );
        assert_eq!(
            wiring.handles_for("searchNode", "statisticsNode"),
            (Some("elements".to_string()), Some("input".to_string()))
        );
        assert_eq!(wiring.target_handles.len(), 5);
    }

    #[test]
    fn test_registry_has_processor_for_every_type() {
        let registry = build_registry();
        assert_eq!(registry.node_types().len(), IfcNodeType::ALL.len());
        for node_type in IfcNodeType::ALL {
            let node = node_engine::GraphNode::new("n", node_type.as_str());
            assert!(registry.get_processor(&node).is_ok(), "{}", node_type);
        }
    }
}
