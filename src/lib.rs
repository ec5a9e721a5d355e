pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod models;
pub mod outfit;
pub mod rank;
pub mod search;
pub mod server;
pub mod store;
pub mod tryon;

use agent::StylistAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Store Type: {}", args.store_type);
    info!("Extraction LLM Type: {}", args.extract_llm_type);
    info!("Shopping Search Configured: {}", !args.shopping_api_key.is_empty());
    info!(
        "Try-On Configured: {}",
        args.tryon_endpoint
            .as_deref()
            .map(|e| !e.trim().is_empty())
            .unwrap_or(false)
    );
    info!("Search Limit: {}", args.search_limit);
    info!("Search Concurrency: {}", args.search_concurrency);
    info!("Lexicon Path: {}", args.lexicon_path);
    info!("Seed Products Path: {}", args.seed_products_path);
    info!("-------------------------");

    let agent = Arc::new(StylistAgent::new(&args).await?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}
