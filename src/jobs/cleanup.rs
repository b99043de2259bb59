//! Background job: delete expired auto-delete private urls.
//!
//! An expired url can never become available again, so one flagged for
//! auto-delete is removed here instead of waiting for a consumption that
//! will never come.

use std::time::Duration;

use tokio::time;

use crate::service::PrivateUrls;

/// Spawn the background cleanup task. Call this once at startup.
pub fn spawn(urls: PrivateUrls, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = sweep(&urls, true).await {
                tracing::error!("cleanup job failed: {}", e);
            }
        }
    })
}

/// One pass. Without `only_auto_delete`, every expired url goes.
pub async fn sweep(urls: &PrivateUrls, only_auto_delete: bool) -> anyhow::Result<u64> {
    let deleted = urls.purge_expired(only_auto_delete).await?;

    if deleted > 0 {
        tracing::info!(rows = deleted, only_auto_delete, "deleted expired private urls");
    }

    Ok(deleted)
}
