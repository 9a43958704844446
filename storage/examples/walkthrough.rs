//! Exercise the hybrid driver against in-memory backends
//!
//! Run with: cargo run -p storage --example walkthrough

use std::sync::Arc;

use object_store::MemoryObjectStore;
use storage::{Driver, HybridDriver, MetaStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let meta = MetaStore::in_memory().await?;
    let store = Arc::new(MemoryObjectStore::new().with_prefix("files"));
    let driver = HybridDriver::new(meta, store);

    // Small content is inlined in the metadata row
    driver.put("/v2/demo/config".as_ref(), b"{}").await?;

    // Large content is tiered out to the object store
    let layer = vec![0u8; 4096];
    driver.put("/v2/demo/layers/base".as_ref(), &layer).await?;

    for path in driver.list("/v2/demo".as_ref()).await? {
        let meta = driver.stat(&path).await?;
        tracing::info!(%path, size = meta.size, dir = meta.is_dir, "entry");
    }

    let body = driver.get("/v2/demo/layers/base".as_ref()).await?;
    tracing::info!(bytes = body.len(), "fetched layer");

    driver.delete("/v2/demo".as_ref()).await?;
    Ok(())
}
