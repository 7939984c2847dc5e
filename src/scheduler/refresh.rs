//! Display matrix refresh scheduler
//!
//! Recomputes the matrix on a fixed interval and whenever a manual refresh is
//! requested. Both paths go through `ScannerService::get_matrix`; the latest
//! view is published on a watch channel.

use crate::services::{MatrixView, ScannerService};
use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Periodic matrix refresh
pub struct RefreshScheduler {
    state: Arc<AppState>,
    interval: Duration,
}

/// Cloneable handle to a running scheduler
#[derive(Clone)]
pub struct RefreshHandle {
    trigger: Arc<Notify>,
    view: watch::Receiver<MatrixView>,
}

impl RefreshHandle {
    /// Ask for an immediate refresh. Requests made while a refresh is
    /// running are coalesced into the next one.
    pub fn request_refresh(&self) {
        self.trigger.notify_one();
    }

    /// Most recently published view
    pub fn latest(&self) -> MatrixView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MatrixView> {
        self.view.clone()
    }
}

impl RefreshScheduler {
    pub fn new(state: Arc<AppState>) -> Self {
        let interval = Duration::from_secs(state.config.refresh_interval_secs.max(1));
        Self { state, interval }
    }

    /// Spawn the refresh loop. The first refresh runs immediately.
    pub fn start(self) -> (RefreshHandle, JoinHandle<()>) {
        let (tx, rx) = watch::channel(MatrixView::no_data());
        let trigger = Arc::new(Notify::new());
        let handle = RefreshHandle {
            trigger: Arc::clone(&trigger),
            view: rx,
        };

        let task = tokio::spawn(async move {
            info!("Refresh scheduler started, every {}s", self.interval.as_secs());

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = trigger.notified() => {
                        debug!("Manual refresh requested");
                        ticker.reset();
                    }
                }

                let view = refresh_once(&self.state).await;
                debug!("Published matrix: {:?}, {} rows", view.status, view.rows.len());

                if tx.send(view).is_err() {
                    info!("No matrix subscribers left, refresh scheduler stopping");
                    break;
                }
            }
        });

        (handle, task)
    }
}

/// Compute one view off the async runtime
pub async fn refresh_once(state: &Arc<AppState>) -> MatrixView {
    let state = Arc::clone(state);
    match tokio::task::spawn_blocking(move || ScannerService::get_matrix(&state)).await {
        Ok(view) => view,
        Err(e) => {
            error!("Matrix refresh task failed: {}", e);
            MatrixView::refresh_failed(format!("Refresh task failed: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use crate::datasource::YahooSource;
    use crate::db::memory::MemoryStore;
    use crate::db::test_support::records;
    use crate::db::BarStore;
    use crate::services::MatrixStatus;
    use crate::types::Timeframe;

    fn seed(store: &MemoryStore, ticker: &str) {
        store.upsert(&records(ticker, Timeframe::Daily, 5, &[None])).unwrap();
        store.upsert(&records(ticker, Timeframe::Hourly, 5, &[None])).unwrap();
    }

    #[tokio::test]
    async fn test_initial_and_manual_refresh_publish_views() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "SPY");

        let config = ScannerConfig {
            refresh_interval_secs: 3600,
            ..ScannerConfig::default()
        };
        let source = Arc::new(YahooSource::new(Duration::from_secs(1)).unwrap());
        let state = Arc::new(AppState::with_parts(config, store.clone(), source));

        let (handle, task) = RefreshScheduler::new(state).start();
        let mut rx = handle.subscribe();

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        let first = rx.borrow_and_update().clone();
        assert_eq!(first.status, MatrixStatus::Ok);
        assert_eq!(first.rows.len(), 1);

        seed(&store, "QQQ");
        handle.request_refresh();

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rx.borrow().rows.len(), 2);
        assert_eq!(handle.latest().rows.len(), 2);

        task.abort();
    }
}
