//! CLI binary for RPG-Encoder: build, query and evolve semantic code graphs
//! without going through the MCP server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rpg_core::config::RpgConfig;
use rpg_core::model::RepositoryConfig;
use rpg_core::store::memory::MemoryGraphStore;
use rpg_core::store::{GraphStore, TraverseDirection, TraverseEdgeType};
use rpg_core::storage;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rpg-encoder", about = "Repository Planning Graph encoder")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the three-phase encoder against the project root
    Encode {
        /// Glob patterns to include (repeatable)
        #[arg(long)]
        include: Vec<String>,

        /// Glob patterns to exclude (repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        /// Fail instead of silently skipping Phase 2 if no LLM provider is available
        #[arg(long)]
        require_llm: bool,
    },

    /// Incrementally update the graph from a git commit range
    Evolve {
        /// Base commit to diff from
        #[arg(long)]
        since: String,

        /// Use an LLM to re-extract drifted features
        #[arg(long)]
        llm: bool,
    },

    /// Search for entities by feature description or snippet
    Search {
        /// Search query
        query: String,

        /// Search mode: features, snippets, auto (default)
        #[arg(short, long, default_value = "auto")]
        mode: String,

        /// Retrieval strategy: hybrid (default), vector, fts, string
        #[arg(short, long, default_value = "hybrid")]
        strategy: String,

        /// Glob pattern to filter entities by file path
        #[arg(long)]
        file_pattern: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Fetch a node's feature, snippet and feature-path by id
    Fetch {
        /// Node id to fetch
        id: String,
    },

    /// Explore the graph from a node
    Explore {
        /// Starting node id
        id: String,

        /// Direction: out (default), in, both
        #[arg(short, long, default_value = "out")]
        direction: String,

        /// Maximum traversal depth
        #[arg(long, default_value = "2")]
        depth: usize,
    },

    /// Show graph statistics
    Stats,
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn open_store(project_root: &PathBuf) -> Result<MemoryGraphStore> {
    let repo_name = project_root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let config = RepositoryConfig {
        name: repo_name,
        root_path: Some(project_root.display().to_string()),
        description: None,
    };
    if storage::rpg_exists(project_root) {
        Ok(MemoryGraphStore::open_path(storage::rpg_file(project_root), config)?)
    } else {
        Ok(MemoryGraphStore::open_memory(config))
    }
}

async fn persist(project_root: &PathBuf, store: &MemoryGraphStore) -> Result<()> {
    let envelope = store.export().await?;
    storage::save(project_root, &envelope)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;

    match cli.command {
        Commands::Encode { include, exclude, require_llm } => {
            cmd_encode(&project_root, include, exclude, require_llm).await
        }
        Commands::Evolve { since, llm } => cmd_evolve(&project_root, &since, llm).await,
        Commands::Search { query, mode, strategy, file_pattern, limit } => {
            cmd_search(&project_root, &query, &mode, &strategy, file_pattern.as_deref(), limit).await
        }
        Commands::Fetch { id } => cmd_fetch(&project_root, &id).await,
        Commands::Explore { id, direction, depth } => cmd_explore(&project_root, &id, &direction, depth).await,
        Commands::Stats => cmd_stats(&project_root).await,
    }
}

async fn cmd_encode(project_root: &PathBuf, include: Vec<String>, exclude: Vec<String>, require_llm: bool) -> Result<()> {
    let mut config = RpgConfig::load(project_root)?;
    if !include.is_empty() {
        config.discovery.include = include;
    }
    config.discovery.exclude.extend(exclude);
    if require_llm {
        config.semantic.use_llm = true;
    }

    let mut store = open_store(project_root)?;
    let pipeline = rpg_encoder::EncoderPipeline::new(config);
    let result = pipeline.encode(project_root, &mut store).await?;
    persist(project_root, &store).await?;

    eprintln!(
        "encoded {} files: {} low-level nodes, {} high-level nodes, {} dependency edges ({}ms, phase2_skipped={})",
        result.files_processed,
        result.low_level_nodes,
        result.high_level_nodes,
        result.dependency_edges,
        result.duration.as_millis(),
        result.phase2_skipped,
    );
    for warning in &result.warnings {
        eprintln!("  warning: {}", warning.message);
    }
    Ok(())
}

async fn cmd_evolve(project_root: &PathBuf, since: &str, use_llm: bool) -> Result<()> {
    let config = RpgConfig::load(project_root)?;
    let options = rpg_encoder::EvolutionOptions {
        drift_threshold: config.evolution.drift_threshold,
        force_regenerate_threshold: config.evolution.force_regenerate_threshold,
        use_llm,
        include_source: config.discovery.include_source,
    };
    let engine = rpg_encoder::EvolutionEngine::new(options);
    let mut store = open_store(project_root)?;
    let result = engine.evolve(project_root, since, &mut store, None).await?;
    persist(project_root, &store).await?;

    eprintln!(
        "evolved: {} inserted, {} deleted, {} modified, {} rerouted, {} pruned ({}ms)",
        result.inserted, result.deleted, result.modified, result.rerouted, result.pruned_nodes, result.duration.as_millis(),
    );
    if result.suggest_full_reencode {
        eprintln!("  note: change ratio exceeds the force-regenerate threshold; consider `encode` instead");
    }
    Ok(())
}

async fn cmd_search(
    project_root: &PathBuf,
    query: &str,
    mode: &str,
    strategy: &str,
    file_pattern: Option<&str>,
    limit: usize,
) -> Result<()> {
    let store = open_store(project_root)?;
    let mode = match mode {
        "features" => rpg_nav::SearchMode::Features,
        "snippets" => rpg_nav::SearchMode::Snippets,
        _ => rpg_nav::SearchMode::Auto,
    };
    let strategy = match strategy {
        "vector" => rpg_nav::SearchStrategy::Vector,
        "fts" => rpg_nav::SearchStrategy::Fts,
        "string" => rpg_nav::SearchStrategy::String,
        _ => rpg_nav::SearchStrategy::Hybrid,
    };
    let mut params = rpg_nav::SearchParams::new(query, mode, strategy);
    params.file_pattern = file_pattern;
    params.limit = limit;

    let hits = rpg_nav::search(&store, &params).await?;
    let json: Vec<_> = hits
        .iter()
        .map(|h| {
            serde_json::json!({
                "node_id": h.node_id,
                "score": h.score,
                "path": h.path,
                "description": h.description,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn cmd_fetch(project_root: &PathBuf, id: &str) -> Result<()> {
    let store = open_store(project_root)?;
    let outcome = rpg_nav::fetch(&store, &[id.to_string()], &[]).await?;
    match outcome.entities.first() {
        Some(entity) => {
            println!("id: {}", entity.node.id);
            println!("description: {}", entity.node.feature.description);
            println!("feature_path: {}", entity.feature_path.join(" > "));
            if let Some(src) = &entity.source_code {
                println!("---\n{src}");
            }
        }
        None => eprintln!("not found: {id}"),
    }
    Ok(())
}

async fn cmd_explore(project_root: &PathBuf, id: &str, direction: &str, depth: usize) -> Result<()> {
    let store = open_store(project_root)?;
    let direction = match direction {
        "in" => TraverseDirection::In,
        "both" => TraverseDirection::Both,
        _ => TraverseDirection::Out,
    };
    let result = rpg_nav::explore(&store, id, TraverseEdgeType::Functional, direction, depth).await?;
    for node_id in &result.nodes {
        println!("{node_id}");
    }
    eprintln!("(max depth reached: {})", result.max_depth_reached);
    Ok(())
}

async fn cmd_stats(project_root: &PathBuf) -> Result<()> {
    let store = open_store(project_root)?;
    let stats = store.stats().await?;
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
        "high_level_count": stats.high_level_count,
        "low_level_count": stats.low_level_count,
        "functional_edge_count": stats.functional_edge_count,
        "dependency_edge_count": stats.dependency_edge_count,
        "data_flow_edge_count": stats.data_flow_edge_count,
    }))?);
    Ok(())
}
