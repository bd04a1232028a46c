//! Per-service circuit breakers with simple consecutive-failure counting.
//!
//! The registry is constructed explicitly and passed by reference wherever it
//! is needed; state lives behind the `BreakerStore` port so a restart picks up
//! where the process left off. Losing the occasional failure increment to a
//! race is acceptable; job claiming is where strict atomicity lives.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::domain::entities::{BreakerState, BreakerStatus};
use crate::domain::errors::QueueResult;
use crate::domain::ports::{BreakerStore, Clock};

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub threshold: i32,
    /// Seconds the circuit stays open before a probe is allowed.
    pub cooldown_secs: i64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            cooldown_secs: 60,
        }
    }
}

/// Raised instead of invoking the wrapped call while the circuit is open.
/// Distinct from the wrapped call's own errors: the external service was
/// never reached.
#[derive(Debug, Clone, Error)]
#[error("circuit breaker for '{service}' is open; retry in {retry_after_secs}s")]
pub struct CircuitBreakerOpenError {
    pub service: String,
    pub retry_after_secs: i64,
}

#[derive(Debug, Error)]
pub enum BreakerError<E: std::error::Error> {
    #[error(transparent)]
    Open(CircuitBreakerOpenError),
    #[error(transparent)]
    Inner(E),
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn BreakerStore>,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    fn new(
        state: BreakerState,
        config: BreakerConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn BreakerStore>,
    ) -> Self {
        Self {
            config,
            clock,
            store,
            state: Mutex::new(state),
        }
    }

    /// Run `fut` through the breaker: fail fast while open, otherwise execute
    /// and record the outcome.
    pub async fn call<T, E, F>(&self, fut: F) -> Result<T, BreakerError<E>>
    where
        E: std::error::Error,
        F: Future<Output = Result<T, E>>,
    {
        if let Some(open) = self.check_open().await {
            return Err(BreakerError::Open(open));
        }

        match fut.await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(err) => {
                self.record_failure(&err.to_string()).await;
                Err(BreakerError::Inner(err))
            }
        }
    }

    /// Returns the open error if calls must be rejected; transitions
    /// open -> half_open once the cooldown has elapsed.
    async fn check_open(&self) -> Option<CircuitBreakerOpenError> {
        let mut state = self.state.lock().await;
        match state.status {
            BreakerStatus::Closed | BreakerStatus::HalfOpen => None,
            BreakerStatus::Open => {
                let now = self.clock.now();
                let elapsed = state
                    .opened_at
                    .map(|at| (now - at).num_seconds())
                    .unwrap_or(i64::MAX);
                if elapsed >= self.config.cooldown_secs {
                    // Cooldown over: let one probe through.
                    state.status = BreakerStatus::HalfOpen;
                    self.persist(&state).await;
                    None
                } else {
                    Some(CircuitBreakerOpenError {
                        service: state.service.clone(),
                        retry_after_secs: self.config.cooldown_secs - elapsed,
                    })
                }
            }
        }
    }

    async fn record_success(&self) {
        let mut state = self.state.lock().await;
        state.status = BreakerStatus::Closed;
        state.failure_count = 0;
        state.opened_at = None;
        self.persist(&state).await;
    }

    async fn record_failure(&self, message: &str) {
        let mut state = self.state.lock().await;
        state.failure_count += 1;
        state.last_failure = Some(message.to_string());

        // A failed probe reopens immediately; closed circuits open at the
        // threshold.
        if state.status == BreakerStatus::HalfOpen || state.failure_count >= self.config.threshold {
            state.status = BreakerStatus::Open;
            state.opened_at = Some(self.clock.now());
        }
        self.persist(&state).await;
    }

    pub async fn stats(&self) -> BreakerState {
        self.state.lock().await.clone()
    }

    /// Force closed and clear the counters, regardless of current state.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.status = BreakerStatus::Closed;
        state.failure_count = 0;
        state.opened_at = None;
        state.last_failure = None;
        self.persist(&state).await;
    }

    async fn persist(&self, state: &BreakerState) {
        // Breaker state is advisory; a failed save must not fail the call.
        if let Err(e) = self.store.save(state).await {
            warn!("Failed to persist breaker state for {}: {}", state.service, e);
        }
    }
}

/// Lazily-populated map of breakers keyed by external service name.
pub struct CircuitBreakerRegistry {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn BreakerStore>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: BreakerConfig, clock: Arc<dyn Clock>, store: Arc<dyn BreakerStore>) -> Self {
        Self {
            config,
            clock,
            store,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the breaker for a service, restoring persisted state on
    /// first use.
    pub async fn breaker(&self, service: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(service) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write().await;
        // Double-check: another task may have created it while we waited.
        if let Some(breaker) = breakers.get(service) {
            return breaker.clone();
        }

        let state = match self.store.load(service).await {
            Ok(Some(state)) => state,
            Ok(None) => BreakerState::new(service),
            Err(e) => {
                warn!("Failed to load breaker state for {}: {}", service, e);
                BreakerState::new(service)
            }
        };
        let breaker = Arc::new(CircuitBreaker::new(
            state,
            self.config.clone(),
            self.clock.clone(),
            self.store.clone(),
        ));
        breakers.insert(service.to_string(), breaker.clone());
        breaker
    }

    /// Snapshot of every known breaker, including services only present in
    /// the store.
    pub async fn all_stats(&self) -> QueueResult<Vec<BreakerState>> {
        let mut by_service: HashMap<String, BreakerState> = self
            .store
            .list()
            .await?
            .into_iter()
            .map(|s| (s.service.clone(), s))
            .collect();

        for (service, breaker) in self.breakers.read().await.iter() {
            by_service.insert(service.clone(), breaker.stats().await);
        }

        let mut stats: Vec<BreakerState> = by_service.into_values().collect();
        stats.sort_by(|a, b| a.service.cmp(&b.service));
        Ok(stats)
    }

    /// Reset a breaker by service name. Returns false when the service has
    /// never been seen.
    pub async fn reset(&self, service: &str) -> QueueResult<bool> {
        let known_in_store = self.store.load(service).await?.is_some();
        let known_in_memory = self.breakers.read().await.contains_key(service);
        if !known_in_store && !known_in_memory {
            return Ok(false);
        }
        self.breaker(service).await.reset().await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::domain::ports::PublishError;

    struct ManualClock {
        now: std::sync::Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: std::sync::Mutex::new(Utc::now()),
            }
        }

        fn advance_secs(&self, secs: i64) {
            let mut now = self.now.lock().unwrap();
            *now = *now + ChronoDuration::seconds(secs);
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, _duration: Duration) {}
    }

    struct MemoryBreakerStore {
        states: std::sync::Mutex<HashMap<String, BreakerState>>,
    }

    impl MemoryBreakerStore {
        fn new() -> Self {
            Self {
                states: std::sync::Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl BreakerStore for MemoryBreakerStore {
        async fn load(&self, service: &str) -> QueueResult<Option<BreakerState>> {
            Ok(self.states.lock().unwrap().get(service).cloned())
        }

        async fn save(&self, state: &BreakerState) -> QueueResult<()> {
            self.states
                .lock()
                .unwrap()
                .insert(state.service.clone(), state.clone());
            Ok(())
        }

        async fn list(&self) -> QueueResult<Vec<BreakerState>> {
            Ok(self.states.lock().unwrap().values().cloned().collect())
        }
    }

    fn registry(clock: Arc<ManualClock>) -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(
            BreakerConfig {
                threshold: 3,
                cooldown_secs: 60,
            },
            clock,
            Arc::new(MemoryBreakerStore::new()),
        )
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), BreakerError<PublishError>> {
        breaker
            .call(async { Err::<(), _>(PublishError::new("HTTP 503 Service Unavailable")) })
            .await
            .map(|_| ())
    }

    #[tokio::test]
    async fn test_opens_after_threshold() {
        let clock = Arc::new(ManualClock::new());
        let registry = registry(clock.clone());
        let breaker = registry.breaker("tiktok").await;

        for _ in 0..2 {
            let _ = fail(&breaker).await;
            assert_eq!(breaker.stats().await.status, BreakerStatus::Closed);
        }
        let _ = fail(&breaker).await;

        let stats = breaker.stats().await;
        assert_eq!(stats.status, BreakerStatus::Open);
        assert_eq!(stats.failure_count, 3);
        assert!(stats.opened_at.is_some());
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let clock = Arc::new(ManualClock::new());
        let registry = registry(clock.clone());
        let breaker = registry.breaker("tiktok").await;

        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }

        let invoked = AtomicUsize::new(0);
        let result: Result<(), _> = breaker
            .call(async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .map_err(|e: BreakerError<PublishError>| e);

        assert!(matches!(result, Err(BreakerError::Open(_))));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_probe_after_cooldown_closes_on_success() {
        let clock = Arc::new(ManualClock::new());
        let registry = registry(clock.clone());
        let breaker = registry.breaker("youtube").await;

        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        clock.advance_secs(61);

        let result: Result<&str, BreakerError<PublishError>> =
            breaker.call(async { Ok("yt_123") }).await;
        assert!(result.is_ok());

        let stats = breaker.stats().await;
        assert_eq!(stats.status, BreakerStatus::Closed);
        assert_eq!(stats.failure_count, 0);
    }

    #[tokio::test]
    async fn test_probe_failure_reopens() {
        let clock = Arc::new(ManualClock::new());
        let registry = registry(clock.clone());
        let breaker = registry.breaker("youtube").await;

        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        let opened_first = breaker.stats().await.opened_at;

        clock.advance_secs(61);
        let _ = fail(&breaker).await;

        let stats = breaker.stats().await;
        assert_eq!(stats.status, BreakerStatus::Open);
        assert!(stats.opened_at > opened_first, "opened_at was not refreshed");

        // Still rejecting until a new cooldown elapses.
        let result: Result<(), BreakerError<PublishError>> = breaker.call(async { Ok(()) }).await;
        assert!(matches!(result, Err(BreakerError::Open(_))));
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_count() {
        let clock = Arc::new(ManualClock::new());
        let registry = registry(clock.clone());
        let breaker = registry.breaker("meta_facebook").await;

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        let _: Result<(), BreakerError<PublishError>> = breaker.call(async { Ok(()) }).await;
        assert_eq!(breaker.stats().await.failure_count, 0);

        // Two more failures stay under the threshold of three.
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.stats().await.status, BreakerStatus::Closed);
    }

    #[tokio::test]
    async fn test_reset_forces_closed() {
        let clock = Arc::new(ManualClock::new());
        let registry = registry(clock.clone());
        let breaker = registry.breaker("google_business").await;

        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        assert!(registry.reset("google_business").await.unwrap());

        let stats = breaker.stats().await;
        assert_eq!(stats.status, BreakerStatus::Closed);
        assert_eq!(stats.failure_count, 0);
        assert!(stats.last_failure.is_none());

        assert!(!registry.reset("never_seen").await.unwrap());
    }
}
