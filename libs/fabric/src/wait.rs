use std::time::Duration;

use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::error::{Error, Result, TimeoutKind};

/// Poll `probe` every `every` until it yields a value or `bound` elapses.
///
/// The first check happens immediately.
pub async fn wait_for<T, F>(mut probe: F, every: Duration, bound: Duration, kind: TimeoutKind) -> Result<T>
where
    F: FnMut() -> Option<T>,
{
    let poll = async {
        let mut ticker = interval(every.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(value) = probe() {
                return value;
            }
        }
    };

    timeout(bound, poll).await.map_err(|_| {
        tracing::warn!(%kind, ?bound, "bounded wait expired");
        Error::Timeout(kind)
    })
}
