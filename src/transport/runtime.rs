use crate::config::MatrixConfig;
use crate::transport::traits::{Channel, InboundEvent};
use std::sync::Arc;
use std::time::Duration;

const MIN_INITIAL_BACKOFF_SECS: u64 = 1;

/// `(initial, max)` restart delays for a listener, sanitized so neither is
/// zero and the ceiling is never below the starting delay.
pub(crate) fn listener_backoff_settings(matrix: &MatrixConfig) -> (u64, u64) {
    let initial_backoff_secs = matrix.initial_backoff_secs.max(MIN_INITIAL_BACKOFF_SECS);
    let max_backoff_secs = matrix.max_backoff_secs.max(initial_backoff_secs);
    (initial_backoff_secs, max_backoff_secs)
}

/// Keep `ch.listen` running until the receiving side of `tx` is dropped,
/// restarting it with exponential backoff whenever it returns.
pub fn spawn_supervised_listener(
    ch: Arc<dyn Channel>,
    tx: tokio::sync::mpsc::Sender<InboundEvent>,
    initial_backoff_secs: u64,
    max_backoff_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let component = format!("channel:{}", ch.name());
        let mut backoff = initial_backoff_secs.max(MIN_INITIAL_BACKOFF_SECS);
        let max_backoff = max_backoff_secs.max(backoff);

        loop {
            tracing::debug!(component, "channel listener starting");
            let result = ch.listen(tx.clone()).await;

            if tx.is_closed() {
                tracing::debug!(component, "receiver closed; listener stopping");
                break;
            }

            match result {
                Ok(()) => {
                    tracing::warn!(component, "listener exited unexpectedly; restarting");
                    // Clean exit: the listener ran, so start over from the initial delay.
                    backoff = initial_backoff_secs.max(MIN_INITIAL_BACKOFF_SECS);
                }
                Err(e) => {
                    tracing::error!(component, error = %format!("{e:#}"), backoff_secs = backoff, "listener failed; restarting");
                }
            }

            tokio::time::sleep(Duration::from_secs(backoff)).await;
            // Double AFTER sleeping so the first failure waits the initial delay
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    })
}
