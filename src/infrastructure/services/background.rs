//! Background maintenance tasks
//!
//! The sweep deletes expired semantic cache entries; the route refresher
//! reloads route definitions so examples confirmed by other processes
//! sharing the store reach this one.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{SemanticCacheService, SemanticRouterService};

/// Handle to a running periodic task
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl BackgroundTask {
    /// Signal the task and wait for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(task = self.name, error = %e, "Background task ended abnormally");
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Sweep `cache` every `every` until stopped
#[must_use]
pub fn spawn_sweeper(cache: Arc<SemanticCacheService>, every: Duration) -> BackgroundTask {
    spawn_periodic("cache_sweeper", every, move || {
        let cache = Arc::clone(&cache);
        async move {
            match cache.sweep().await {
                Ok(deleted) => debug!(deleted, "Cache sweep finished"),
                Err(e) => warn!(error = %e, "Cache sweep failed"),
            }
        }
    })
}

/// Reload `router` from the store every `every` until stopped
#[must_use]
pub fn spawn_route_refresher(router: Arc<SemanticRouterService>, every: Duration) -> BackgroundTask {
    spawn_periodic("route_refresher", every, move || {
        let router = Arc::clone(&router);
        async move {
            if let Err(e) = router.refresh().await {
                warn!(error = %e, "Route refresh failed, keeping current routes");
            }
        }
    })
}

/// Run `job` every `every`
///
/// The first run happens one full interval after start. A failed run is
/// the job's to log; the next tick runs it again.
fn spawn_periodic<F, Fut>(name: &'static str, every: Duration, mut job: F) -> BackgroundTask
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (shutdown, mut stopped) = watch::channel(false);
    let every = every.max(Duration::from_millis(10));

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(task = name, interval_secs = every.as_secs_f64(), "Background task started");

        loop {
            tokio::select! {
                _ = ticker.tick() => job().await,
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                }
            }
        }

        info!(task = name, "Background task stopped");
    });

    BackgroundTask {
        name,
        shutdown,
        task,
    }
}
