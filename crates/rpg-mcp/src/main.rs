//! Entry point for the RPG MCP server: one process per repository, serving
//! the tool surface over stdio to whatever MCP client launched it.

mod params;
mod server;
mod tools;

use rmcp::ServiceExt;
use server::RpgServer;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let project_root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or(std::env::current_dir()?);

    let server = RpgServer::new(project_root);
    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
