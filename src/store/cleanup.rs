use super::StoreHandle;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Spawn a task that calls `delete_expired` every `every`.
///
/// Returns `None` when `every` is zero. Failed sweeps are logged and the
/// loop continues; abort the returned handle to stop it.
pub fn spawn_expiry_sweep(store: StoreHandle, every: Duration) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        return None;
    }
    Some(tokio::spawn(async move {
        info!(
            backend = store.backend(),
            every_secs = every.as_secs(),
            "expiry sweep started"
        );
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.delete_expired().await {
                Ok(0) => {}
                Ok(removed) => debug!(backend = store.backend(), removed, "expired sessions removed"),
                Err(e) => warn!(backend = store.backend(), error = %e, "expiry sweep failed"),
            }
        }
    }))
}
