pub mod app;
pub mod assistant;
pub mod cli;
pub mod concierge;
pub mod error;
pub mod models;
pub mod repl;
pub mod session;
pub mod storage;
pub mod stores;

use app::AppContext;
use cli::Args;
use log::info;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Storage Backend: {}", args.storage_backend);
    info!("Key-Value Store Type: {}", args.kv_type);
    match args.kv_type.to_lowercase().as_str() {
        "file" => info!("Key-Value File: {}", args.kv_path),
        "redis" => info!("Key-Value Redis URL: {}", args.kv_redis_url),
        _ => {}
    }
    if args.remote_enabled() {
        info!("Remote URL: {}", args.supabase_url.as_deref().unwrap_or("<unset>"));
    }
    info!("Signed-in User: {}", args.user_id.as_deref().unwrap_or("<anonymous>"));
    info!("Chat History Limit: {}", args.history_limit);
    info!("-------------------------");

    let app = AppContext::from_args(&args).await?;
    app.load().await;
    repl::run(&app).await?;

    Ok(())
}
