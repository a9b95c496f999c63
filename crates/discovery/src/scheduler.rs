use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;

/// `interval` plus up to a fifth of it, so that many clients started at the
/// same moment drift apart.
pub fn jittered_delay<R: Rng + ?Sized>(interval: Duration, rng: &mut R) -> Duration {
    let spread_ms = (interval / 5).as_millis() as u64;
    if spread_ms == 0 {
        return interval;
    }
    interval + Duration::from_millis(rng.gen_range(0..spread_ms))
}

/// Re-announce bookkeeping for the DHT: the in-flight flag and the single
/// pending timer.
#[derive(Debug)]
pub struct AnnounceScheduler {
    interval: Duration,
    in_flight: bool,
    timer: Option<JoinHandle<()>>,
}

impl AnnounceScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            in_flight: false,
            timer: None,
        }
    }

    /// Claim the in-flight slot. False if an announce is already running.
    pub fn begin(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    /// Abort the pending timer, if any, and arm a new one that runs `tick`
    /// after a jittered interval. Returns the chosen delay.
    pub fn rearm<F>(&mut self, tick: F) -> Duration
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let delay = jittered_delay(self.interval, &mut rand::thread_rng());
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tick();
        }));
        delay
    }

    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    pub fn has_pending_timer(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for AnnounceScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn jitter_stays_within_a_fifth() {
        let mut rng = StdRng::seed_from_u64(7);
        let interval = Duration::from_secs(15 * 60);
        for _ in 0..10_000 {
            let delay = jittered_delay(interval, &mut rng);
            assert!(delay >= interval);
            assert!(delay < interval + interval / 5);
        }
    }

    #[test]
    fn tiny_intervals_are_not_jittered() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(
            jittered_delay(Duration::from_millis(4), &mut rng),
            Duration::from_millis(4)
        );
        assert_eq!(jittered_delay(Duration::ZERO, &mut rng), Duration::ZERO);
    }

    #[test]
    fn only_one_announce_in_flight() {
        let mut scheduler = AnnounceScheduler::new(Duration::from_secs(1));
        assert!(scheduler.begin());
        assert!(!scheduler.begin());
        scheduler.finish();
        assert!(scheduler.begin());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_replaces_the_pending_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        let interval = Duration::from_secs(10);
        let mut scheduler = AnnounceScheduler::new(interval);

        for _ in 0..3 {
            let fired = fired.clone();
            scheduler.rearm(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(scheduler.has_pending_timer());

        tokio::time::sleep(interval + interval / 5).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.has_pending_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut scheduler = AnnounceScheduler::new(Duration::from_secs(10));
        let counter = fired.clone();
        scheduler.rearm(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.cancel();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!scheduler.has_pending_timer());
    }
}
