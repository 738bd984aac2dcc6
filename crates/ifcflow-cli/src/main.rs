//! ifcflow - run IFC workflows without the editor
//!
//! Logs go to stderr, results to stdout as JSON.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ifc_nodes::resources::keys;
use ifc_nodes::{
    build_registry, default_tool_map, default_wiring, setup_extensions, ExportRoot,
    JsonModelStore, ModelViewer, RecordingViewer,
};
use node_engine::constants::files;
use node_engine::{
    validate_workflow, ChannelEventSink, EngineConfig, EventSink, NodeEngineError, Result,
    ToolGraphBuilder, WorkflowExecutor, WorkflowGraph,
};
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "ifcflow", version, about = "Run IFC node workflows from the command line")]
struct Cli {
    /// Engine configuration file
    #[arg(short, long, global = true, default_value = files::CONFIG)]
    config: PathBuf,

    /// Directory holding parsed model documents (`<file>.json`)
    #[arg(short, long, global = true, env = "IFCFLOW_MODEL_DIR", default_value = ".")]
    model_dir: PathBuf,

    /// Directory export nodes write into; without it exports stay in memory
    #[arg(short, long, global = true, env = "IFCFLOW_EXPORT_DIR")]
    export_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the registered node types
    Nodes {
        /// Print full metadata as JSON
        #[arg(long)]
        json: bool,
    },
    /// Execute a saved workflow graph
    Run {
        /// Graph snapshot (`{nodes, edges}`)
        graph: PathBuf,
        /// Evaluate in topological order instead of pulling from the sinks
        #[arg(long)]
        batch: bool,
    },
    /// Build and run a graph through a chain of tool calls
    Tool {
        /// Alternating tool names and JSON parameters
        #[arg(required = true, num_args = 2.., value_names = ["NAME", "PARAMS"])]
        calls: Vec<String>,
        /// Start a new grid column after every call
        #[arg(long)]
        per_turn: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Filesystem locations processors may touch
struct Dirs {
    models: PathBuf,
    exports: Option<PathBuf>,
}

impl Dirs {
    fn models(models: &Path) -> Self {
        Self {
            models: models.to_path_buf(),
            exports: None,
        }
    }
}

async fn dispatch(cli: Cli) -> Result<String> {
    let dirs = Dirs {
        models: cli.model_dir,
        exports: cli.export_dir,
    };
    let output = match cli.command {
        Commands::Nodes { json } => return list_nodes(json),
        Commands::Run { graph, batch } => {
            let graph = read_graph(&graph).await?;
            run_graph(graph, &dirs, batch).await?
        }
        Commands::Tool { calls, per_turn } => {
            let config = EngineConfig::load(&cli.config).await?;
            run_tools(&config, &dirs, &parse_calls(&calls)?, per_turn).await?
        }
    };
    Ok(serde_json::to_string_pretty(&output)?)
}

fn list_nodes(as_json: bool) -> Result<String> {
    let registry = build_registry();
    if as_json {
        return Ok(serde_json::to_string_pretty(&registry.all_metadata())?);
    }

    let lines: Vec<String> = registry
        .all_metadata()
        .into_iter()
        .map(|m| {
            format!(
                "{:<18} {:<9} {:<15} {}",
                m.node_type,
                format!("{:?}", m.category),
                format!("{:?}", m.status),
                m.tool.as_ref().map(|t| t.name.as_str()).unwrap_or("-")
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

async fn read_graph(path: &Path) -> Result<WorkflowGraph> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&contents)?)
}

/// Event sink that forwards workflow events to the debug log
fn logging_sink() -> Arc<dyn EventSink> {
    let (sink, mut events) = ChannelEventSink::new();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log::debug!("{:?}", event);
        }
    });
    Arc::new(sink)
}

fn extensions(dirs: &Dirs) -> node_engine::ExecutorExtensions {
    let viewer: Arc<dyn ModelViewer> = Arc::new(RecordingViewer::new());
    let mut extensions = setup_extensions(Arc::new(JsonModelStore::new(&dirs.models)), Some(viewer));
    if let Some(exports) = &dirs.exports {
        extensions.set(keys::EXPORT_ROOT, ExportRoot::new(exports));
    }
    extensions
}

async fn run_graph(graph: WorkflowGraph, dirs: &Dirs, batch: bool) -> Result<Value> {
    let registry = Arc::new(build_registry());
    let problems = validate_workflow(&graph, Some(&registry));
    if !problems.is_empty() {
        let message: Vec<String> = problems.iter().map(|p| p.to_string()).collect();
        return Err(NodeEngineError::ExecutionFailed(message.join("; ")));
    }

    let executor = WorkflowExecutor::new(graph, registry)
        .with_extensions(extensions(dirs))
        .with_event_sink(logging_sink());
    let results = if batch {
        executor.execute_batch().await?
    } else {
        executor.execute().await?
    };

    Ok(json!({
        "results": results,
        "nodes": executor.get_updated_nodes(),
    }))
}

fn parse_calls(args: &[String]) -> Result<Vec<(String, Value)>> {
    if args.len() % 2 != 0 {
        return Err(NodeEngineError::Config(
            "tool calls must be given as NAME PARAMS pairs".to_string(),
        ));
    }
    args.chunks(2)
        .map(|pair| {
            let params = serde_json::from_str(&pair[1]).map_err(|e| {
                NodeEngineError::Config(format!("parameters for '{}': {}", pair[0], e))
            })?;
            Ok((pair[0].clone(), params))
        })
        .collect()
}

async fn run_tools(
    config: &EngineConfig,
    dirs: &Dirs,
    calls: &[(String, Value)],
    per_turn: bool,
) -> Result<Value> {
    let (tools, wiring) = config.layered_over(default_tool_map(), default_wiring());
    let mut builder = ToolGraphBuilder::new(Arc::new(build_registry()), tools, wiring)
        .with_layout(config.layout)
        .with_extensions(extensions(dirs))
        .with_event_sink(logging_sink());

    let mut steps = Vec::with_capacity(calls.len());
    for (name, params) in calls {
        let (node, value) = builder.run_tool(name, params.clone()).await?;
        log::info!("{} -> {}", name, node.id);
        steps.push(json!({"tool": name, "nodeId": node.id, "result": value}));
        if per_turn {
            builder.next_iteration();
        }
    }

    Ok(json!({
        "steps": steps,
        "graph": builder.graph(),
        "nodes": builder.get_updated_nodes(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn model_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let document = json!({
            "schema": "IFC4",
            "elements": [
                {"expressId": 1, "globalId": "w1", "ifcType": "IfcWall", "name": "North",
                 "storey": "Level 1", "propertySets": {"Qto_WallBaseQuantities": {"NetVolume": 2.0}}},
                {"expressId": 2, "globalId": "w2", "ifcType": "IfcWall", "name": "South",
                 "storey": "Level 1", "propertySets": {"Qto_WallBaseQuantities": {"NetVolume": 3.0}}},
                {"expressId": 3, "globalId": "d1", "ifcType": "IfcDoor", "name": "Entry"}
            ]
        });
        tokio::fs::write(dir.path().join("site.ifc.json"), document.to_string())
            .await
            .unwrap();
        dir
    }

    #[test]
    fn test_cli_parses_tool_chain() {
        let cli = Cli::try_parse_from([
            "ifcflow",
            "tool",
            "load_ifc_file",
            r#"{"file": "a.ifc"}"#,
            "--per-turn",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Tool { ref calls, per_turn: true } if calls.len() == 2));
    }

    #[test]
    fn test_parse_calls_rejects_unpaired_or_bad_json() {
        let ok = parse_calls(&["search_elements".into(), r#"{"query": "x"}"#.into()]).unwrap();
        assert_eq!(ok[0].1, json!({"query": "x"}));

        assert!(parse_calls(&["a".into(), "{}".into(), "b".into()]).is_err());
        assert!(parse_calls(&["a".into(), "{nope".into()]).is_err());
    }

    #[test]
    fn test_list_nodes_table() {
        let table = list_nodes(false).unwrap();
        assert_eq!(table.lines().count(), 10);
        assert!(table.contains("search_elements"));
    }

    #[tokio::test]
    async fn test_run_graph_both_strategies() {
        let dir = model_dir().await;
        let graph: WorkflowGraph = serde_json::from_value(json!({
            "nodes": [
                {"id": "f", "type": "fileManagerNode", "data": {"file": "site.ifc"}},
                {"id": "s", "type": "statisticsNode", "data": {"property": "NetVolume"}}
            ],
            "edges": [{"id": "e1", "source": "f", "target": "s", "sourceHandle": "model"}]
        }))
        .unwrap();

        let pulled = run_graph(graph.clone(), &Dirs::models(dir.path()), false).await.unwrap();
        let batched = run_graph(graph, &Dirs::models(dir.path()), true).await.unwrap();

        assert_eq!(pulled["results"]["s"]["total"], json!(5.0));
        assert_eq!(pulled["results"], batched["results"]);
    }

    #[tokio::test]
    async fn test_run_graph_rejects_invalid_graph() {
        let graph: WorkflowGraph = serde_json::from_value(json!({
            "nodes": [{"id": "s", "type": "searchNode"}]
        }))
        .unwrap();
        let err = run_graph(graph, &Dirs::models(Path::new(".")), false).await.unwrap_err();
        assert!(err.to_string().contains("input"));
    }

    #[tokio::test]
    async fn test_tool_chain_with_config_overlay() {
        let dir = model_dir().await;
        let config_path = dir.path().join(files::CONFIG);
        tokio::fs::write(
            &config_path,
            r#"{"layout": {"startX": 0, "spacingX": 50}, "tools": {"find": "searchNode"}}"#,
        )
        .await
        .unwrap();
        let config = EngineConfig::load(&config_path).await.unwrap();

        let calls = parse_calls(&[
            "load_ifc_file".into(),
            r#"{"file": "site.ifc"}"#.into(),
            "find".into(),
            r#"{"ifcType": "IfcWall"}"#.into(),
        ])
        .unwrap();
        let output = run_tools(&config, &Dirs::models(dir.path()), &calls, true).await.unwrap();

        assert_eq!(output["steps"][1]["result"]["count"], json!(2));
        assert_eq!(output["graph"]["edges"].as_array().unwrap().len(), 1);
        assert_eq!(output["graph"]["nodes"][1]["position"]["x"], json!(50.0));
    }
}
