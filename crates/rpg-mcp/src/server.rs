//! `RpgServer` struct definition, non-tool helper methods, and the
//! `ServerHandler` impl. Tool methods themselves live in `tools.rs`.

use rmcp::{model::ServerInfo, tool_handler, ServerHandler};
use rpg_core::config::RpgConfig;
use rpg_core::model::RepositoryConfig;
use rpg_core::store::memory::MemoryGraphStore;
use rpg_core::storage;
use rpg_interactive::InteractiveSession;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The RPG MCP server state: one [`MemoryGraphStore`] and one
/// [`InteractiveSession`] per process — the store handle is owned by the
/// encoder/session, never shared across sessions.
#[derive(Clone)]
pub(crate) struct RpgServer {
    pub(crate) project_root: PathBuf,
    pub(crate) store: Arc<RwLock<MemoryGraphStore>>,
    pub(crate) session: Arc<RwLock<InteractiveSession>>,
    pub(crate) config: Arc<RwLock<RpgConfig>>,
    pub(crate) tool_router: rmcp::handler::server::router::tool::ToolRouter<Self>,
}

impl std::fmt::Debug for RpgServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpgServer")
            .field("project_root", &self.project_root)
            .finish()
    }
}

impl RpgServer {
    /// Create a new server, loading an existing graph from
    /// `<project_root>/.rpg/graph.json` if present; otherwise starts with
    /// an empty in-memory graph.
    pub(crate) fn new(project_root: PathBuf) -> Self {
        let config = RpgConfig::load(&project_root).unwrap_or_default();
        let repo_name = project_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let repo_config = RepositoryConfig {
            name: repo_name,
            root_path: Some(project_root.display().to_string()),
            description: None,
        };

        let store = if storage::rpg_exists(&project_root) {
            MemoryGraphStore::open_path(storage::rpg_file(&project_root), repo_config)
                .unwrap_or_else(|_| MemoryGraphStore::open_memory(RepositoryConfig::default()))
        } else {
            MemoryGraphStore::open_memory(repo_config)
        };

        Self {
            project_root,
            store: Arc::new(RwLock::new(store)),
            session: Arc::new(RwLock::new(InteractiveSession::new())),
            config: Arc::new(RwLock::new(config)),
            tool_router: Self::create_tool_router(),
        }
    }

    /// Persist the current graph to `<project_root>/.rpg/graph.json`. Called
    /// after every successful mutating tool call — persistence is rewritten
    /// after every successful mutation.
    pub(crate) async fn persist(&self) -> Result<(), String> {
        let store = self.store.read().await;
        let envelope = store
            .export()
            .await
            .map_err(|e| format!("failed to export graph: {e}"))?;
        storage::save(&self.project_root, &envelope).map_err(|e| e.to_string())
    }
}

#[tool_handler]
impl ServerHandler for RpgServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Exposes the Repository Planning Graph tool surface: search/fetch/explore for \
                 read-only navigation, encode/evolve/stats for whole-repo operations, and the \
                 ten interactive-protocol tools (build_index..submit_routing) for agent-driven \
                 incremental construction."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
