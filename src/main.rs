//! Node entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Init logger at the default level
//!   3. Load config, then switch the logger to the configured level
//!   4. Bootstrap the node identity (load, or create on first run)
//!   5. Start the peer list once the identity is ready
//!   6. Print status and exit

use node_credentials::bootstrap::PeerListSignal;
use node_credentials::error::AppError;
use node_credentials::{config, logger};
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    // Default level until config is loaded.
    let log = logger::init("info")?;

    let config = config::load()?;
    log.set_level(&config.log_level)?;

    info!(
        node_name = %config.node_name,
        data_dir = %config.data_dir.display(),
        log_level = %config.log_level,
        "config loaded"
    );

    let (signal, start) = PeerListSignal::channel();
    let peer_list = tokio::spawn(async move {
        start.wait().await?;
        info!("peer list starting");
        Ok::<_, AppError>(())
    });

    let node = tokio::task::spawn_blocking(move || node_credentials::start(&config, &signal))
        .await
        .map_err(|e| AppError::IdentityUnavailable(format!("bootstrap task: {e}")))??;

    peer_list
        .await
        .map_err(|e| AppError::PeerList(format!("peer list task: {e}")))??;

    println!("✓ Node initialized: node_id={}", node.identity.node_id());
    Ok(())
}
