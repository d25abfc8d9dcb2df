use crate::services::staging::StagingArea;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Periodically removes staged files left behind by crashed or aborted uploads.
pub struct StagingSweeper {
    staging: Arc<StagingArea>,
    max_age: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl StagingSweeper {
    pub fn new(
        staging: Arc<StagingArea>,
        max_age: Duration,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            staging,
            max_age,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Staging sweeper started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Staging sweeper shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep().await;
                }
            }
        }
    }

    pub async fn sweep(&self) -> usize {
        match self.staging.sweep_orphans(self.max_age).await {
            Ok(0) => 0,
            Ok(removed) => {
                tracing::info!("✅ Removed {} orphaned staging files", removed);
                removed
            }
            Err(e) => {
                tracing::error!(
                    "Failed to sweep staging directory {}: {}",
                    self.staging.dir().display(),
                    e
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = Arc::new(StagingArea::new(tmp.path(), 1024));
        let (tx, rx) = watch::channel(false);

        let sweeper = StagingSweeper::new(
            staging,
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            rx,
        );
        let handle = tokio::spawn(sweeper.run());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_removes_old_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("orphan.bin"), b"x").unwrap();
        let staging = Arc::new(StagingArea::new(tmp.path(), 1024));
        let (_tx, rx) = watch::channel(false);

        let sweeper = StagingSweeper::new(staging, Duration::ZERO, Duration::from_secs(60), rx);
        assert_eq!(sweeper.sweep().await, 1);
        assert!(!tmp.path().join("orphan.bin").exists());
    }
}
