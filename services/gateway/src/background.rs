//! Interval tasks: booking sweep and snapshots

use crate::snapshots::SnapshotStore;
use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

pub struct Background {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Background {
    pub fn start(state: AppState, store: Option<Arc<SnapshotStore>>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let mut tasks = vec![tokio::spawn(sweep_loop(
            state.clone(),
            state.config.sweep_interval(),
            shutdown.subscribe(),
        ))];
        if let Some(store) = store {
            tasks.push(tokio::spawn(snapshot_loop(
                state.clone(),
                store,
                state.config.snapshot_interval(),
                shutdown.subscribe(),
            )));
        }
        Self { shutdown, tasks }
    }

    /// Signal every task and wait for in-flight work to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "background task failed");
            }
        }
    }
}

async fn sweep_loop(state: AppState, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = state.sweep().await;
                let pruned = state.rate_limiter.prune();
                debug!(?report, pruned, "sweep tick");
            }
            _ = shutdown.changed() => break,
        }
    }
    info!("sweep task stopped");
}

async fn snapshot_loop(
    state: AppState,
    store: Arc<SnapshotStore>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; nothing has changed yet
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = store.snapshot(&state, false).await {
                    error!(error = ?e, "periodic snapshot failed");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    info!("snapshot task stopped");
}
