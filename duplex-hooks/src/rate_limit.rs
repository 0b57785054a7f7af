//! Sliding-window rate limiting hook.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use duplex_core::error::{McpError, McpResult};
use duplex_core::hook::{PreDispatchHook, RequestContext};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

/// Produces the counter key for a request. The default keys by method.
pub type KeyGenerator = Arc<dyn Fn(&str, Option<&Value>) -> String + Send + Sync>;

/// How many empty-key sweeps to skip between compactions.
const COMPACTION_INTERVAL: u64 = 64;

/// Configuration for [`RateLimitHook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Length of the sliding window.
    pub window: Duration,
    /// Maximum requests per key within the window.
    pub max_requests: usize,
}

impl RateLimitConfig {
    /// 10 requests per minute.
    pub const STRICT: Self = Self {
        window: Duration::from_secs(60),
        max_requests: 10,
    };

    /// 100 requests per minute.
    pub const MODERATE: Self = Self {
        window: Duration::from_secs(60),
        max_requests: 100,
    };

    /// 1000 requests per minute.
    pub const LENIENT: Self = Self {
        window: Duration::from_secs(60),
        max_requests: 1000,
    };

    /// 5 requests per second.
    pub const PER_SECOND_5: Self = Self {
        window: Duration::from_secs(1),
        max_requests: 5,
    };

    /// 10 requests per second.
    pub const PER_SECOND_10: Self = Self {
        window: Duration::from_secs(1),
        max_requests: 10,
    };

    /// A custom window and limit.
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

/// Counters exposed for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitStats {
    /// Requests checked.
    pub total_checked: u64,
    /// Requests refused.
    pub total_rejected: u64,
    /// When the most recent refusal happened.
    pub last_rejected: Option<chrono::DateTime<chrono::Utc>>,
}

struct SlidingWindow {
    history: HashMap<String, Vec<Instant>>,
    checks_since_compaction: u64,
    stats: RateLimitStats,
}

impl SlidingWindow {
    fn new() -> Self {
        Self {
            history: HashMap::new(),
            checks_since_compaction: 0,
            stats: RateLimitStats::default(),
        }
    }

    /// Admit or refuse one request under `key`; on refusal returns the
    /// seconds until the oldest in-window sample ages out.
    fn check_and_record(&mut self, key: &str, config: &RateLimitConfig) -> Result<(), u64> {
        let now = Instant::now();
        self.stats.total_checked += 1;

        self.checks_since_compaction += 1;
        if self.checks_since_compaction >= COMPACTION_INTERVAL {
            self.checks_since_compaction = 0;
            self.history
                .retain(|_, samples| samples.iter().any(|t| now.duration_since(*t) < config.window));
        }

        let samples = self.history.entry(key.to_string()).or_default();
        samples.retain(|t| now.duration_since(*t) < config.window);

        if samples.len() >= config.max_requests {
            self.stats.total_rejected += 1;
            self.stats.last_rejected = Some(chrono::Utc::now());
            let oldest = samples
                .iter()
                .min()
                .copied()
                .unwrap_or(now);
            let remaining = (oldest + config.window).saturating_duration_since(now);
            let retry_after_secs = ((remaining.as_millis() + 999) / 1000) as u64;
            return Err(retry_after_secs.max(1));
        }

        samples.push(now);
        Ok(())
    }
}

/// Pre-dispatch hook that enforces a sliding-window request limit.
///
/// Each key (by default the method name) keeps the timestamps of its
/// in-window requests; expired samples drop on every check and keys with no
/// live samples are swept periodically. A refused request carries
/// `retryAfter` seconds and the configured limit in its error data.
pub struct RateLimitHook {
    config: RateLimitConfig,
    key_generator: KeyGenerator,
    window: Mutex<SlidingWindow>,
}

impl RateLimitHook {
    /// Create the hook with the default per-method key.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            key_generator: Arc::new(|method: &str, _params: Option<&Value>| method.to_string()),
            window: Mutex::new(SlidingWindow::new()),
        }
    }

    /// Create the hook with a custom key generator, e.g. keying `tools/call`
    /// by tool name.
    pub fn with_key_generator(config: RateLimitConfig, key_generator: KeyGenerator) -> Self {
        Self {
            config,
            key_generator,
            window: Mutex::new(SlidingWindow::new()),
        }
    }

    /// Counter snapshot.
    pub async fn stats(&self) -> RateLimitStats {
        self.window.lock().await.stats.clone()
    }

    /// Number of keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.window.lock().await.history.len()
    }
}

#[async_trait]
impl PreDispatchHook for RateLimitHook {
    fn name(&self) -> &str {
        "rate-limit"
    }

    async fn before_dispatch(
        &self,
        method: &str,
        params: Option<&Value>,
        _context: &RequestContext,
    ) -> McpResult<()> {
        let key = (self.key_generator)(method, params);
        let mut window = self.window.lock().await;
        match window.check_and_record(&key, &self.config) {
            Ok(()) => Ok(()),
            Err(retry_after_secs) => {
                warn!(
                    %key,
                    limit = self.config.max_requests,
                    retry_after_secs,
                    "rate limit exceeded"
                );
                Err(McpError::RateLimitExceeded {
                    key,
                    limit: self.config.max_requests,
                    retry_after_secs,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RequestContext {
        RequestContext::new()
    }

    #[tokio::test]
    async fn admits_up_to_the_limit() {
        let hook = RateLimitHook::new(RateLimitConfig::new(Duration::from_secs(60), 3));
        for _ in 0..3 {
            assert!(hook.before_dispatch("tools/list", None, &context()).await.is_ok());
        }
        let err = hook
            .before_dispatch("tools/list", None, &context())
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::RateLimitExceeded { .. }));
        assert_eq!(err.code(), -32004);
    }

    #[tokio::test]
    async fn refusal_carries_retry_after_data() {
        let hook = RateLimitHook::new(RateLimitConfig::new(Duration::from_secs(60), 1));
        hook.before_dispatch("m", None, &context()).await.unwrap();
        let err = hook.before_dispatch("m", None, &context()).await.unwrap_err();

        let wire = err.to_wire();
        let data = wire.data.unwrap();
        assert_eq!(data["limit"], 1);
        let retry_after = data["retryAfter"].as_u64().unwrap();
        assert!((1..=60).contains(&retry_after));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let hook = RateLimitHook::new(RateLimitConfig::new(Duration::from_secs(60), 1));
        assert!(hook.before_dispatch("a", None, &context()).await.is_ok());
        assert!(hook.before_dispatch("a", None, &context()).await.is_err());
        assert!(hook.before_dispatch("b", None, &context()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let hook = RateLimitHook::new(RateLimitConfig::new(Duration::from_millis(100), 1));
        assert!(hook.before_dispatch("m", None, &context()).await.is_ok());
        assert!(hook.before_dispatch("m", None, &context()).await.is_err());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(hook.before_dispatch("m", None, &context()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn compaction_sweeps_idle_keys() {
        let hook = RateLimitHook::new(RateLimitConfig::new(Duration::from_millis(10), 100));
        hook.before_dispatch("stale", None, &context()).await.unwrap();
        assert_eq!(hook.tracked_keys().await, 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        for _ in 0..COMPACTION_INTERVAL {
            hook.before_dispatch("live", None, &context()).await.unwrap();
        }
        assert_eq!(hook.tracked_keys().await, 1);
    }

    #[tokio::test]
    async fn custom_key_generator_is_used() {
        let hook = RateLimitHook::with_key_generator(
            RateLimitConfig::new(Duration::from_secs(60), 1),
            Arc::new(|method: &str, params: Option<&Value>| {
                let tool = params
                    .and_then(|p| p.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("-");
                format!("{method}:{tool}")
            }),
        );

        let call_a = serde_json::json!({"name": "a"});
        let call_b = serde_json::json!({"name": "b"});
        assert!(hook
            .before_dispatch("tools/call", Some(&call_a), &context())
            .await
            .is_ok());
        assert!(hook
            .before_dispatch("tools/call", Some(&call_a), &context())
            .await
            .is_err());
        assert!(hook
            .before_dispatch("tools/call", Some(&call_b), &context())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn stats_track_rejections() {
        let hook = RateLimitHook::new(RateLimitConfig::new(Duration::from_secs(60), 1));
        hook.before_dispatch("m", None, &context()).await.unwrap();
        let _ = hook.before_dispatch("m", None, &context()).await;

        let stats = hook.stats().await;
        assert_eq!(stats.total_checked, 2);
        assert_eq!(stats.total_rejected, 1);
        assert!(stats.last_rejected.is_some());
    }

    #[test]
    fn presets() {
        assert_eq!(RateLimitConfig::STRICT.max_requests, 10);
        assert_eq!(RateLimitConfig::MODERATE.max_requests, 100);
        assert_eq!(RateLimitConfig::LENIENT.max_requests, 1000);
        assert_eq!(RateLimitConfig::PER_SECOND_5.window, Duration::from_secs(1));
        assert_eq!(RateLimitConfig::PER_SECOND_10.max_requests, 10);
    }
}
