//! AI Visibility Node
//!
//! Drives the viewer's visibility and highlighting from element results.
//!
//! One instance serves every node of this type, so the remembered
//! highlight set belongs to the viewer rather than to a single node.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use node_engine::{
    GraphNode, NodeCategory, NodeDescriptor, NodeEngineError, NodeInputs, NodeOutput,
    NodeProcessor, NodeStatus, NodeTypeMetadata, PortDataType, PortMetadata, ProcessorContext,
    Result, ToolDescriptor,
};

use crate::resources::model_viewer;
use crate::values::{global_ids_from, node_config};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisibilityMode {
    Show,
    Hide,
    Isolate,
    #[default]
    Highlight,
    Reset,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct VisibilityConfig {
    mode: VisibilityMode,
}

#[derive(Default)]
pub struct AiVisibilityProcessor {
    last_highlighted: Mutex<Vec<String>>,
}

impl AiVisibilityProcessor {
    pub const NODE_TYPE: &'static str = "aiVisibilityNode";
    pub const PORT_INPUT: &'static str = "input";

    pub fn new() -> Self {
        Self::default()
    }

    /// Ids highlighted by the most recent highlight call
    pub fn last_highlighted(&self) -> Vec<String> {
        self.last_highlighted.lock().clone()
    }
}

impl NodeDescriptor for AiVisibilityProcessor {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::NODE_TYPE, NodeCategory::Viewer, "AI Visibility")
            .with_description("Show, hide, isolate or highlight elements in the viewer")
            .with_icon("eye")
            .with_status(NodeStatus::NewFeature)
            .with_default_data(json!({"mode": "highlight"}))
            .with_input(PortMetadata::optional(
                Self::PORT_INPUT,
                "Elements",
                PortDataType::Elements,
            ))
            .with_output(PortMetadata::optional("affected", "Affected", PortDataType::Number))
            .with_tool(ToolDescriptor::new(
                "set_element_visibility",
                "Change how the previous result's elements appear in the 3D viewer",
                json!({
                    "type": "object",
                    "properties": {
                        "mode": {"enum": ["show", "hide", "isolate", "highlight", "reset"]}
                    },
                    "required": ["mode"]
                }),
            ))
    }
}

#[async_trait]
impl NodeProcessor for AiVisibilityProcessor {
    async fn process(
        &self,
        node: &GraphNode,
        inputs: NodeInputs,
        context: &ProcessorContext,
    ) -> Result<NodeOutput> {
        let config: VisibilityConfig = node_config(node)?;
        let viewer = model_viewer(context.extensions())
            .ok_or_else(|| NodeEngineError::resource("No model viewer is attached"))?;

        let ids = match (config.mode, inputs.get(Self::PORT_INPUT)) {
            (VisibilityMode::Reset, _) => Vec::new(),
            (_, Some(value)) => global_ids_from(value)?,
            (_, None) => return Err(NodeEngineError::MissingInput(Self::PORT_INPUT.to_string())),
        };

        match config.mode {
            VisibilityMode::Show => viewer.show(&ids).await?,
            VisibilityMode::Hide => viewer.hide(&ids).await?,
            VisibilityMode::Isolate => viewer.isolate(&ids).await?,
            VisibilityMode::Highlight => {
                // Remembered set changes only once the viewer took both calls
                let previous = self.last_highlighted();
                if !previous.is_empty() {
                    viewer.clear_highlight(&previous).await?;
                }
                viewer.highlight(&ids).await?;
                *self.last_highlighted.lock() = ids.clone();
            }
            VisibilityMode::Reset => {
                viewer.reset().await?;
                self.last_highlighted.lock().clear();
            }
        }

        log::debug!("AiVisibility {}: {:?} on {} elements", node.id, config.mode, ids.len());

        Ok(NodeOutput::new(json!({
            "mode": config.mode,
            "affected": ids.len(),
        }))
        .with_display(json!({"lastMode": config.mode, "affected": ids.len()})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::sample_model;
    use crate::model::IfcModel;
    use crate::resources::{keys, ModelViewer, RecordingViewer};
    use crate::test_support::{context_from, context_with, run};
    use node_engine::processor::ResultCache;
    use node_engine::ExecutorExtensions;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Recording viewer whose highlight calls fail while `offline` is set
    #[derive(Default)]
    struct FlakyViewer {
        inner: RecordingViewer,
        offline: AtomicBool,
    }

    impl FlakyViewer {
        fn check(&self) -> Result<()> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(NodeEngineError::resource("Viewer disconnected"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ModelViewer for FlakyViewer {
        async fn load_model(&self, model: &IfcModel) -> Result<()> {
            self.inner.load_model(model).await
        }
        async fn show(&self, global_ids: &[String]) -> Result<()> {
            self.inner.show(global_ids).await
        }
        async fn hide(&self, global_ids: &[String]) -> Result<()> {
            self.inner.hide(global_ids).await
        }
        async fn isolate(&self, global_ids: &[String]) -> Result<()> {
            self.inner.isolate(global_ids).await
        }
        async fn highlight(&self, global_ids: &[String]) -> Result<()> {
            self.check()?;
            self.inner.highlight(global_ids).await
        }
        async fn clear_highlight(&self, global_ids: &[String]) -> Result<()> {
            self.check()?;
            self.inner.clear_highlight(global_ids).await
        }
        async fn reset(&self) -> Result<()> {
            self.inner.reset().await
        }
    }

    fn node(mode: &str) -> GraphNode {
        let mut node = GraphNode::new("v1", AiVisibilityProcessor::NODE_TYPE);
        node.data.insert("mode".into(), json!(mode));
        node
    }

    fn ids(ids: &[&str]) -> NodeInputs {
        let mut inputs = NodeInputs::new();
        inputs.insert("input".into(), json!(ids));
        inputs
    }

    async fn loaded_viewer() -> Arc<RecordingViewer> {
        let viewer = Arc::new(RecordingViewer::new());
        viewer.load_model(&sample_model()).await.unwrap();
        viewer
    }

    #[tokio::test]
    async fn test_new_highlight_replaces_previous() {
        let viewer = loaded_viewer().await;
        let context = context_with(vec![], None, Some(viewer.clone()));
        let processor = AiVisibilityProcessor::new();

        run(&processor, &node("highlight"), ids(&["1wall", "2wall"]), &context)
            .await
            .unwrap();
        let output = run(&processor, &node("highlight"), ids(&["3door"]), &context)
            .await
            .unwrap();

        assert_eq!(output.value["affected"], json!(1));
        assert_eq!(viewer.state().highlighted.len(), 1);
        assert!(viewer.state().highlighted.contains("3door"));
        assert_eq!(processor.last_highlighted(), vec!["3door"]);
    }

    #[tokio::test]
    async fn test_isolate_and_reset() {
        let viewer = loaded_viewer().await;
        let context = context_with(vec![], None, Some(viewer.clone()));
        let processor = AiVisibilityProcessor::new();

        let mut inputs = NodeInputs::new();
        inputs.insert(
            "input".into(),
            json!({"elements": [{"globalId": "1wall", "ifcType": "IfcWall"}], "count": 1}),
        );
        run(&processor, &node("isolate"), inputs, &context).await.unwrap();
        assert_eq!(viewer.state().visible().len(), 1);

        run(&processor, &node("highlight"), ids(&["1wall"]), &context)
            .await
            .unwrap();
        let output = run(&processor, &node("reset"), NodeInputs::new(), &context)
            .await
            .unwrap();

        assert_eq!(output.value["mode"], json!("reset"));
        assert_eq!(viewer.state().visible().len(), 5);
        assert!(viewer.state().highlighted.is_empty());
        assert!(processor.last_highlighted().is_empty());
    }

    #[tokio::test]
    async fn test_requires_viewer_and_input() {
        let processor = AiVisibilityProcessor::new();
        let headless = context_with(vec![], None, None);
        let err = run(&processor, &node("hide"), ids(&["1wall"]), &headless)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeEngineError::Resource(_)));

        let context = context_with(vec![], None, Some(loaded_viewer().await));
        let err = run(&processor, &node("hide"), NodeInputs::new(), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeEngineError::MissingInput(_)));

        let value: Value = run(&processor, &node("hide"), ids(&["1wall"]), &context)
            .await
            .unwrap()
            .value;
        assert_eq!(value["affected"], json!(1));
    }

    #[tokio::test]
    async fn test_failed_highlight_keeps_previous_set() {
        let viewer = Arc::new(FlakyViewer::default());
        viewer.load_model(&sample_model()).await.unwrap();
        let handle: Arc<dyn ModelViewer> = viewer.clone();
        let context = context_from(
            vec![],
            ResultCache::default(),
            ExecutorExtensions::new().with(keys::MODEL_VIEWER, handle),
        );
        let processor = AiVisibilityProcessor::new();

        run(&processor, &node("highlight"), ids(&["1wall", "2wall"]), &context)
            .await
            .unwrap();

        viewer.offline.store(true, Ordering::SeqCst);
        let err = run(&processor, &node("highlight"), ids(&["3door"]), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeEngineError::Resource(_)));
        assert_eq!(processor.last_highlighted(), vec!["1wall", "2wall"]);

        viewer.offline.store(false, Ordering::SeqCst);
        run(&processor, &node("highlight"), ids(&["3door"]), &context)
            .await
            .unwrap();

        let highlighted = viewer.inner.state().highlighted;
        assert_eq!(highlighted.len(), 1);
        assert!(highlighted.contains("3door"));
        assert_eq!(processor.last_highlighted(), vec!["3door"]);
    }
}
