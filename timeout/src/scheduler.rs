//! Adaptive timeout scheduling for outstanding consensus requests.
//!
//! Each request the engine sends to a sampled peer registers a one-shot
//! callback here. If no matching cancellation arrives before the deadline,
//! the dispatch loop fires the callback and the engine treats the peer as
//! non-responsive for the round. The deadline applied to new registrations
//! is a single adaptive estimate, re-tuned on every observed outcome:
//! timeouts grow it multiplicatively, completed requests decay it back
//! toward the configured floor.

use {
    crate::{
        config::{ConfigError, TimeoutConfig},
        request_key::RequestKey,
    },
    glacier_monitoring::GlacierMetrics,
    log::{debug, trace, warn},
    parking_lot::{Condvar, Mutex},
    solana_hash::Hash,
    solana_pubkey::Pubkey,
    std::{
        collections::{BTreeMap, HashMap},
        sync::Arc,
        time::{Duration, Instant},
    },
};

/// Exponent applied to `backoff_factor` for the decay on a completed
/// request: a timeout doubles the estimate (factor 2), while a completion
/// shrinks it by 2^¼, so recovery from a congestion spike takes several
/// consecutive successes.
const SUCCESS_DECAY_EXPONENT: f64 = 0.25;

type TimeoutCallback = Box<dyn FnOnce() + Send + 'static>;

/// One pending registration.
struct Registration {
    /// When `register` was called, for latency observation on cancel.
    registered_at: Instant,
    callback: TimeoutCallback,
}

/// State shared between callers and the dispatch loop.
struct SchedulerState {
    /// Pending registrations, ordered by (deadline, key). The key component
    /// makes ordering stable for registrations with equal deadlines.
    queue: BTreeMap<(Instant, RequestKey), Registration>,
    /// Reverse index from key to its current deadline in `queue`.
    /// Invariant: `deadlines` and `queue` always hold the same keys.
    deadlines: HashMap<RequestKey, Instant>,
    /// The adaptive timeout estimate applied to new registrations.
    /// Always within [min_timeout, max_timeout].
    estimate: Duration,
    stopped: bool,
}

/// Registers and fires per-request timeouts with an adaptive deadline.
///
/// Any number of threads may call [`register`](TimeoutScheduler::register)
/// and [`cancel`](TimeoutScheduler::cancel); exactly one dedicated thread
/// runs [`dispatch`](TimeoutScheduler::dispatch) until
/// [`shutdown`](TimeoutScheduler::shutdown). Callbacks are invoked from the
/// dispatch thread with the scheduler lock released, so a callback may
/// re-enter the scheduler.
pub struct TimeoutScheduler {
    state: Mutex<SchedulerState>,
    /// Signalled when a nearer deadline is registered or on shutdown.
    wakeup: Condvar,
    config: TimeoutConfig,
    metrics: Arc<GlacierMetrics>,
}

impl TimeoutScheduler {
    /// Create a scheduler with the given configuration, reporting into the
    /// given metrics sink.
    pub fn new(config: TimeoutConfig, metrics: Arc<GlacierMetrics>) -> Result<Self, ConfigError> {
        config.validate()?;
        let estimate = config.initial_timeout();
        metrics.current_timeout_ms.set(estimate.as_millis() as i64);
        Ok(Self {
            state: Mutex::new(SchedulerState {
                queue: BTreeMap::new(),
                deadlines: HashMap::new(),
                estimate,
                stopped: false,
            }),
            wakeup: Condvar::new(),
            config,
            metrics,
        })
    }

    /// Register `callback` to fire unless [`cancel`](TimeoutScheduler::cancel)
    /// is called with the same request parameters before the returned
    /// deadline passes.
    pub fn register(
        &self,
        validator_id: &Pubkey,
        conversation_id: &Hash,
        request_seq: u32,
        callback: impl FnOnce() + Send + 'static,
    ) -> Instant {
        self.register_key(
            RequestKey::new(validator_id, conversation_id, request_seq),
            callback,
        )
    }

    /// Cancel the timeout registered with the same request parameters.
    /// Feeds the observed round trip into the adaptive estimate. A no-op
    /// if the registration already fired or never existed.
    pub fn cancel(&self, validator_id: &Pubkey, conversation_id: &Hash, request_seq: u32) {
        self.cancel_key(RequestKey::new(validator_id, conversation_id, request_seq));
    }

    /// [`register`](TimeoutScheduler::register) with a precomputed key.
    ///
    /// At most one registration per key is live: registering a key that is
    /// still pending replaces the prior registration, and the superseded
    /// callback never fires. Returns the deadline.
    pub fn register_key(
        &self,
        key: RequestKey,
        callback: impl FnOnce() + Send + 'static,
    ) -> Instant {
        let now = Instant::now();
        let mut state = self.state.lock();
        let deadline = now + state.estimate;

        if let Some(prior) = state.deadlines.insert(key, deadline) {
            // Supersede without feeding the estimator: the replaced
            // instance neither completed nor timed out.
            state.queue.remove(&(prior, key));
            trace!("superseding pending registration for {key}");
        }
        let nearest_changed = state
            .queue
            .first_key_value()
            .map_or(true, |(&(first, _), _)| deadline < first);
        state.queue.insert(
            (deadline, key),
            Registration {
                registered_at: now,
                callback: Box::new(callback),
            },
        );

        self.metrics.timeout_requests.inc();
        self.metrics.pending_requests.set(state.queue.len() as i64);
        drop(state);

        if nearest_changed {
            self.wakeup.notify_one();
        }
        deadline
    }

    /// [`cancel`](TimeoutScheduler::cancel) with a precomputed key.
    /// Idempotent: cancelling twice, or after the registration fired, has
    /// no observable effect the second time.
    pub fn cancel_key(&self, key: RequestKey) {
        let now = Instant::now();
        let mut state = self.state.lock();
        let Some(deadline) = state.deadlines.remove(&key) else {
            return;
        };
        let registration = state
            .queue
            .remove(&(deadline, key))
            .expect("deadline index out of sync with queue");

        let latency = now.saturating_duration_since(registration.registered_at);
        self.observe_success(&mut state, latency);
        self.metrics.requests_cancelled.inc();
        self.metrics.pending_requests.set(state.queue.len() as i64);
    }

    /// Run the dispatch loop until [`shutdown`](TimeoutScheduler::shutdown).
    ///
    /// The loop sleeps until the nearest pending deadline, coalescing
    /// wake-ups to at most one per `granularity`, and fires every
    /// registration whose deadline has passed. Each fired callback is
    /// invoked exactly once, after the scheduler lock is released. With no
    /// pending registrations the loop sleeps until the next `register`.
    pub fn dispatch(&self) {
        let granularity = self.config.granularity();
        let mut state = self.state.lock();
        loop {
            if state.stopped {
                return;
            }

            let now = Instant::now();
            let mut expired: Vec<(RequestKey, TimeoutCallback)> = Vec::new();
            while let Some((&(deadline, key), _)) = state.queue.first_key_value() {
                if deadline > now {
                    break;
                }
                let registration = state
                    .queue
                    .remove(&(deadline, key))
                    .expect("first queue entry vanished");
                state.deadlines.remove(&key);
                self.observe_failure(&mut state);
                expired.push((key, registration.callback));
            }

            if !expired.is_empty() {
                self.metrics.timeouts_fired.add(expired.len() as u64);
                self.metrics.pending_requests.set(state.queue.len() as i64);
                drop(state);
                for (key, callback) in expired {
                    debug!("request {key} timed out");
                    callback();
                }
                state = self.state.lock();
                continue;
            }

            match state.queue.first_key_value().map(|(&(deadline, _), _)| deadline) {
                Some(next) => {
                    // Coalesce near-simultaneous deadlines into one wake.
                    let wait = next.saturating_duration_since(now).max(granularity);
                    let _ = self.wakeup.wait_for(&mut state, wait);
                }
                None => self.wakeup.wait(&mut state),
            }
        }
    }

    /// Stop the dispatch loop and drop all pending registrations without
    /// firing them.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.stopped {
            return;
        }
        state.stopped = true;
        let dropped = state.queue.len();
        state.queue.clear();
        state.deadlines.clear();
        self.metrics.pending_requests.set(0);
        drop(state);

        self.wakeup.notify_all();
        if dropped > 0 {
            warn!("timeout scheduler shutdown dropped {dropped} pending registrations");
        }
    }

    /// The adaptive estimate that the next registration would receive.
    pub fn current_timeout(&self) -> Duration {
        self.state.lock().estimate
    }

    /// Number of registrations currently pending.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// A completed request decays the estimate toward the floor.
    fn observe_success(&self, state: &mut SchedulerState, latency: Duration) {
        let decay = self.config.backoff_factor.powf(SUCCESS_DECAY_EXPONENT);
        state.estimate = state.estimate.div_f64(decay).max(self.config.min_timeout());
        self.metrics
            .current_timeout_ms
            .set(state.estimate.as_millis() as i64);
        self.metrics
            .response_latency_ms
            .observe(latency.as_secs_f64() * 1_000.0);
    }

    /// A fired timeout grows the estimate toward the ceiling.
    fn observe_failure(&self, state: &mut SchedulerState) {
        state.estimate = state
            .estimate
            .mul_f64(self.config.backoff_factor)
            .min(self.config.max_timeout());
        self.metrics
            .current_timeout_ms
            .set(state.estimate.as_millis() as i64);
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crossbeam_channel::{bounded, RecvTimeoutError},
        std::{
            sync::atomic::{AtomicUsize, Ordering},
            thread,
        },
    };

    fn scheduler(config: TimeoutConfig) -> Arc<TimeoutScheduler> {
        Arc::new(TimeoutScheduler::new(config, Arc::new(GlacierMetrics::new())).unwrap())
    }

    /// Spawn a dispatch thread; the returned closure shuts it down and joins.
    fn spawn_dispatch(scheduler: &Arc<TimeoutScheduler>) -> impl FnOnce() {
        let dispatcher = Arc::clone(scheduler);
        let handle = thread::spawn(move || dispatcher.dispatch());
        let scheduler = Arc::clone(scheduler);
        move || {
            scheduler.shutdown();
            handle.join().unwrap();
        }
    }

    fn request() -> (Pubkey, Hash, u32) {
        (Pubkey::new_unique(), Hash::new_unique(), 7)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = TimeoutConfig::dev_default();
        config.backoff_factor = 0.5;
        assert!(TimeoutScheduler::new(config, Arc::new(GlacierMetrics::new())).is_err());
    }

    #[test]
    fn test_register_returns_deadline_from_estimate() {
        let s = scheduler(TimeoutConfig::dev_default());
        let before = Instant::now();
        let (validator, conversation, seq) = request();
        let deadline = s.register(&validator, &conversation, seq, || {});
        let lower = before + Duration::from_millis(40);
        let upper = Instant::now() + Duration::from_millis(60);
        assert!(deadline > lower && deadline < upper);
        assert_eq!(s.pending(), 1);
    }

    #[test]
    fn test_fires_when_not_cancelled() {
        let s = scheduler(TimeoutConfig::dev_default());
        let stop = spawn_dispatch(&s);

        let (tx, rx) = bounded(1);
        let (validator, conversation, seq) = request();
        s.register(&validator, &conversation, seq, move || {
            tx.send(()).unwrap();
        });

        // dev_default initial estimate is 50ms; allow generous slack.
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(s.pending(), 0);
        stop();
    }

    #[test]
    fn test_cancel_before_deadline_suppresses_fire() {
        let s = scheduler(TimeoutConfig::dev_default());
        let stop = spawn_dispatch(&s);

        let fired = Arc::new(AtomicUsize::new(0));
        let (validator, conversation, seq) = request();
        let counter = Arc::clone(&fired);
        s.register(&validator, &conversation, seq, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        s.cancel(&validator, &conversation, seq);

        // Wait well past the deadline: the callback must never run.
        thread::sleep(Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(s.pending(), 0);
        stop();
    }

    #[test]
    fn test_fires_exactly_once() {
        let s = scheduler(TimeoutConfig::dev_default());
        let stop = spawn_dispatch(&s);

        let (tx, rx) = bounded(16);
        let (validator, conversation, seq) = request();
        s.register(&validator, &conversation, seq, move || {
            tx.send(()).unwrap();
        });

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(200)),
            Err(RecvTimeoutError::Timeout)
        );
        stop();
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let s = scheduler(TimeoutConfig::dev_default());
        let (validator, conversation, seq) = request();
        s.register(&validator, &conversation, seq, || {});

        s.cancel(&validator, &conversation, seq);
        let estimate = s.current_timeout();
        // Second cancel of the same key: no estimator update, no panic.
        s.cancel(&validator, &conversation, seq);
        assert_eq!(s.current_timeout(), estimate);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn test_reregister_supersedes_prior_callback() {
        let s = scheduler(TimeoutConfig::dev_default());
        let stop = spawn_dispatch(&s);

        let first = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = bounded(1);
        let (validator, conversation, seq) = request();

        let counter = Arc::clone(&first);
        s.register(&validator, &conversation, seq, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        s.register(&validator, &conversation, seq, move || {
            tx.send(()).unwrap();
        });
        assert_eq!(s.pending(), 1);

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        stop();
    }

    #[test]
    fn test_estimate_grows_on_fires_and_is_capped() {
        let config = TimeoutConfig::dev_default();
        let max = config.max_timeout();
        let s = scheduler(config);
        let stop = spawn_dispatch(&s);

        let (tx, rx) = bounded(16);
        let conversation = Hash::new_unique();
        let mut previous = s.current_timeout();
        for seq in 0..6 {
            let tx = tx.clone();
            s.register(&Pubkey::new_unique(), &conversation, seq, move || {
                tx.send(()).unwrap();
            });
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
            let estimate = s.current_timeout();
            assert!(estimate >= previous, "estimate shrank after a timeout");
            assert!(estimate <= max);
            previous = estimate;
        }
        // dev_default: 50ms doubled 6 times saturates the 500ms ceiling.
        assert_eq!(s.current_timeout(), max);
        stop();
    }

    #[test]
    fn test_estimate_decays_on_cancels_to_floor() {
        let config = TimeoutConfig::dev_default();
        let min = config.min_timeout();
        let s = scheduler(config);

        let conversation = Hash::new_unique();
        let mut previous = s.current_timeout();
        for seq in 0..64 {
            let validator = Pubkey::new_unique();
            s.register(&validator, &conversation, seq, || {});
            s.cancel(&validator, &conversation, seq);
            let estimate = s.current_timeout();
            assert!(estimate <= previous, "estimate grew after a success");
            assert!(estimate >= min);
            previous = estimate;
        }
        // 50ms decayed by 2^¼ per success reaches the 10ms floor well
        // within 64 iterations.
        assert_eq!(s.current_timeout(), min);
    }

    #[test]
    fn test_shutdown_unblocks_dispatch_and_drops_pending() {
        let s = scheduler(TimeoutConfig::default());
        let fired = Arc::new(AtomicUsize::new(0));
        let (validator, conversation, seq) = request();
        let counter = Arc::clone(&fired);
        // Default initial estimate is 1s; shutdown arrives long before.
        s.register(&validator, &conversation, seq, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let dispatcher = Arc::clone(&s);
        let handle = thread::spawn(move || dispatcher.dispatch());
        thread::sleep(Duration::from_millis(50));
        s.shutdown();
        handle.join().unwrap();

        assert_eq!(s.pending(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callback_may_reenter_scheduler() {
        let s = scheduler(TimeoutConfig::dev_default());
        let stop = spawn_dispatch(&s);

        let (tx, rx) = bounded(1);
        let (validator, conversation, seq) = request();
        let reentrant = Arc::clone(&s);
        s.register(&validator, &conversation, seq, move || {
            // Fired callbacks run off-lock; registering from one must not
            // deadlock.
            reentrant.register_key(
                RequestKey::new(&Pubkey::new_unique(), &Hash::new_unique(), 0),
                move || {},
            );
            tx.send(()).unwrap();
        });

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        stop();
    }

    #[test]
    fn test_metrics_reflect_outcomes() {
        let metrics = Arc::new(GlacierMetrics::new());
        let s = Arc::new(
            TimeoutScheduler::new(TimeoutConfig::dev_default(), Arc::clone(&metrics)).unwrap(),
        );
        let stop = spawn_dispatch(&s);

        let conversation = Hash::new_unique();
        let cancelled = Pubkey::new_unique();
        s.register(&cancelled, &conversation, 0, || {});
        s.cancel(&cancelled, &conversation, 0);

        let (tx, rx) = bounded(1);
        s.register(&Pubkey::new_unique(), &conversation, 1, move || {
            tx.send(()).unwrap();
        });
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(metrics.timeout_requests.get(), 2);
        assert_eq!(metrics.requests_cancelled.get(), 1);
        assert_eq!(metrics.timeouts_fired.get(), 1);
        assert_eq!(metrics.pending_requests.get(), 0);
        assert_eq!(metrics.response_latency_ms.get_count(), 1);
        stop();
    }
}
