use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::service::{ConversationService, FlushReport};

/// Periodic flusher for dirty conversations. At most one flush runs at a time.
pub struct WriteBack {
    service: Arc<ConversationService>,
    flushing: AtomicBool,
}

impl WriteBack {
    pub fn new(service: Arc<ConversationService>) -> Self {
        Self {
            service,
            flushing: AtomicBool::new(false),
        }
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Run one flush pass, or return `None` if another pass is in progress.
    /// A skipped call is not queued.
    pub fn flush_once(&self) -> Option<FlushReport> {
        if self
            .flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Flush already in progress, skipping");
            return None;
        }
        let _flag = FlushFlag(&self.flushing);

        Some(self.service.flush_dirty())
    }
}

/// Clears the in-progress flag when the pass ends, including by panic.
struct FlushFlag<'a>(&'a AtomicBool);

impl Drop for FlushFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Background task that writes dirty conversations back to the store.
///
/// Flushes every `interval` until `shutdown` is cancelled. Ticks missed while
/// a pass is running are dropped. A pass already running when `shutdown`
/// fires is allowed to finish.
pub async fn run_write_back_loop(
    write_back: Arc<WriteBack>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; start counting from now.
    ticker.tick().await;

    info!("Write-back loop started ({:?} interval)", interval);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let wb = write_back.clone();
        match tokio::task::spawn_blocking(move || wb.flush_once()).await {
            Ok(Some(report)) => {
                if report.failed > 0 {
                    warn!(
                        "Write-back: saved {} conversations, {} failed",
                        report.saved, report.failed
                    );
                } else if report.saved > 0 {
                    info!("Write-back: saved {} conversations", report.saved);
                }
            }
            Ok(None) => debug!("Write-back tick skipped"),
            Err(e) => error!("Write-back pass panicked: {}", e),
        }
    }

    info!("Write-back loop stopped");
}
