use std::future::Future;
use std::time::Duration;

use log::warn;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

// Refresh cadence for reconciling against the upstream thread.
pub const THREAD_POLL_INTERVAL: Duration = Duration::from_millis(2500);

// A restartable periodic task feeding upstream human-message counts back to
// the caller. Fetch failures are logged and skipped; the loop keeps going
// until the poller is stopped or dropped.
pub struct ThreadCountPoller {
    handle: JoinHandle<()>,
}

impl ThreadCountPoller {
    pub fn spawn<F, Fut, C>(period: Duration, fetch: F, mut on_count: C) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<usize>> + Send + 'static,
        C: FnMut(usize) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match fetch().await {
                    Ok(count) => on_count(count),
                    Err(err) => warn!("thread count refresh failed: {}", err),
                }
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for ThreadCountPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::sleep;

    #[actix_web::test]
    async fn delivers_counts_on_each_tick() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let fetch_ticks = ticks.clone();
        let sink = seen.clone();
        let poller = ThreadCountPoller::spawn(
            Duration::from_millis(10),
            move || {
                let n = fetch_ticks.fetch_add(1, Ordering::SeqCst);
                async move { Ok(n) }
            },
            move |count| sink.lock().expect("sink lock").push(count),
        );

        sleep(Duration::from_millis(120)).await;
        poller.stop();

        let delivered = seen.lock().expect("sink lock").clone();
        assert!(delivered.len() >= 2, "expected several ticks, got {delivered:?}");
        assert!(delivered.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[actix_web::test]
    async fn failed_fetches_are_skipped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let fetch_ticks = ticks.clone();
        let sink = seen.clone();
        let poller = ThreadCountPoller::spawn(
            Duration::from_millis(10),
            move || {
                let n = fetch_ticks.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n % 2 == 0 {
                        Err(anyhow::anyhow!("transient refresh failure"))
                    } else {
                        Ok(n)
                    }
                }
            },
            move |count| sink.lock().expect("sink lock").push(count),
        );

        sleep(Duration::from_millis(120)).await;
        poller.stop();

        let delivered = seen.lock().expect("sink lock").clone();
        assert!(!delivered.is_empty());
        assert!(delivered.iter().all(|count| count % 2 == 1));
    }

    #[actix_web::test]
    async fn stop_cancels_future_ticks() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let poller = ThreadCountPoller::spawn(
            Duration::from_millis(10),
            || async { Ok(7) },
            move |count| sink.lock().expect("sink lock").push(count),
        );

        sleep(Duration::from_millis(60)).await;
        poller.stop();
        let frozen = seen.lock().expect("sink lock").len();

        sleep(Duration::from_millis(60)).await;
        assert_eq!(seen.lock().expect("sink lock").len(), frozen);
    }
}
