use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::AppState;

/// A fixed-window limit such as `10/minute`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateRule {
    pub limit: u32,
    pub window: Duration,
    unit: &'static str,
}

impl RateRule {
    pub fn new(limit: u32, window: Duration) -> Self {
        let unit = match window.as_secs() {
            1 => "second",
            60 => "minute",
            3600 => "hour",
            86400 => "day",
            _ => "window",
        };
        RateRule { limit, window, unit }
    }

    /// Parses `N/unit` where unit is `second`, `minute`, `hour` or `day`.
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || AppError::Config(format!("Invalid rate limit '{}'", spec));

        let (count, unit) = spec.trim().split_once('/').ok_or_else(invalid)?;
        let limit = count.trim().parse::<u32>().map_err(|_| invalid())?;
        if limit == 0 {
            return Err(invalid());
        }
        let secs = match unit.trim().to_ascii_lowercase().as_str() {
            "second" | "sec" | "s" => 1,
            "minute" | "min" | "m" => 60,
            "hour" | "h" => 3600,
            "day" | "d" => 86400,
            _ => return Err(invalid()),
        };
        Ok(RateRule::new(limit, Duration::from_secs(secs)))
    }

    /// Comma-separated list of rules; an empty string means no limits.
    pub fn parse_list(specs: &str) -> Result<Vec<Self>> {
        specs
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(RateRule::parse)
            .collect()
    }
}

impl fmt::Display for RateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit == "window" {
            write!(f, "{}/{}ms", self.limit, self.window.as_millis())
        } else {
            write!(f, "{}/{}", self.limit, self.unit)
        }
    }
}

// Rate limit entry - one fixed window per rule
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: Instant,
}

// Expired windows are swept after this many checks
const PRUNE_EVERY: usize = 256;

pub struct RateLimiter {
    rules: Vec<RateRule>,
    entries: DashMap<String, Vec<RateLimitEntry>>,
    checks: AtomicUsize,
}

impl RateLimiter {
    pub fn new(rules: Vec<RateRule>) -> Self {
        Self {
            rules,
            entries: DashMap::new(),
            checks: AtomicUsize::new(0),
        }
    }

    pub fn rules(&self) -> &[RateRule] {
        &self.rules
    }

    /// Admits the request only if every rule still has room, then counts it
    /// against all of them. Check and increment happen under one entry lock.
    pub fn check(&self, client: &str) -> Result<()> {
        if self.rules.is_empty() {
            return Ok(());
        }

        let now = Instant::now();
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune_expired(now);
        }

        let mut windows = self
            .entries
            .entry(client.to_string())
            .or_insert_with(|| {
                self.rules
                    .iter()
                    .map(|_| RateLimitEntry {
                        count: 0,
                        window_start: now,
                    })
                    .collect()
            });

        for (rule, window) in self.rules.iter().zip(windows.iter_mut()) {
            // window expired? reset it
            if now.saturating_duration_since(window.window_start) >= rule.window {
                window.count = 0;
                window.window_start = now;
            }
        }

        if let Some((rule, window)) = self
            .rules
            .iter()
            .zip(windows.iter())
            .find(|(rule, window)| window.count >= rule.limit)
        {
            let remaining = rule
                .window
                .saturating_sub(now.saturating_duration_since(window.window_start));
            let retry_after = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Err(AppError::RateLimited {
                retry_after: retry_after.max(1),
                limit: rule.to_string(),
            });
        }

        for window in windows.iter_mut() {
            window.count += 1;
        }

        Ok(())
    }

    /// Drops clients whose windows have all run out.
    pub fn prune_expired(&self, now: Instant) {
        let rules = &self.rules;
        self.entries.retain(|_, windows| {
            rules
                .iter()
                .zip(windows.iter())
                .any(|(rule, window)| now.saturating_duration_since(window.window_start) < rule.window)
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.entries.len()
    }
}

/// Identifies the caller by peer address. `X-Forwarded-For` is honoured only
/// when the service runs behind a trusted proxy.
pub fn client_key(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(forwarded) = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return forwarded.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn enforce(limiter: &RateLimiter, trust_proxy: bool, request: Request, next: Next) -> Response {
    let client = client_key(&request, trust_proxy);

    if let Err(err) = limiter.check(&client) {
        warn!(client = %client, path = %request.uri().path(), "Rate limit exceeded: {}", err);
        return err.into_response();
    }

    next.run(request).await
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state.rate_limiter, state.config.trust_proxy, request, next).await
}

pub async fn status_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state.status_limiter, state.config.trust_proxy, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;

    #[test]
    fn parses_rule_lists() {
        let rules = RateRule::parse_list("10/minute, 50/hour,200/day").unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0], RateRule::new(10, Duration::from_secs(60)));
        assert_eq!(rules[2].to_string(), "200/day");
        assert!(RateRule::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_rules() {
        assert!(RateRule::parse("10").is_err());
        assert!(RateRule::parse("ten/minute").is_err());
        assert!(RateRule::parse("10/fortnight").is_err());
        assert!(RateRule::parse("0/minute").is_err());
    }

    #[test]
    fn limits_each_client_independently() {
        let limiter = RateLimiter::new(vec![RateRule::new(2, Duration::from_secs(60))]);

        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.1").is_ok());
        match limiter.check("10.0.0.1") {
            Err(AppError::RateLimited { retry_after, limit }) => {
                assert!((1..=60).contains(&retry_after));
                assert_eq!(limit, "2/minute");
            }
            other => panic!("expected rate limit, got {:?}", other),
        }

        assert!(limiter.check("10.0.0.2").is_ok());
    }

    #[test]
    fn rejected_requests_do_not_consume_other_rules() {
        let limiter = RateLimiter::new(vec![
            RateRule::new(1, Duration::from_secs(60)),
            RateRule::new(5, Duration::from_secs(3600)),
        ]);

        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err());
        assert!(limiter.check("a").is_err());

        let windows = limiter.entries.get("a").unwrap();
        assert_eq!(windows[1].count, 1);
    }

    #[test]
    fn window_expiry_resets_the_counter() {
        let limiter = RateLimiter::new(vec![RateRule::new(1, Duration::from_millis(30))]);

        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err());
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check("a").is_ok());
    }

    #[test]
    fn expired_clients_are_pruned() {
        let limiter = RateLimiter::new(vec![RateRule::new(1, Duration::from_millis(30))]);

        for i in 0..10 {
            assert!(limiter.check(&format!("10.0.0.{}", i)).is_ok());
        }
        assert_eq!(limiter.tracked_clients(), 10);

        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check("10.0.1.1").is_ok());
        limiter.prune_expired(Instant::now());
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn concurrent_checks_never_exceed_the_limit() {
        let limiter = RateLimiter::new(vec![RateRule::new(5, Duration::from_secs(60))]);
        let admitted = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    if limiter.check("shared").is_ok() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 5);
    }

    fn request_from(peer: [u8; 4], forwarded: Option<&str>) -> Request {
        let mut builder = http::Request::builder();
        if let Some(value) = forwarded {
            builder = builder.header("x-forwarded-for", value);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
        request
    }

    #[test]
    fn client_key_ignores_forwarded_header_by_default() {
        let request = request_from([192, 0, 2, 10], Some("203.0.113.7"));
        assert_eq!(client_key(&request, false), "192.0.2.10");

        let bare = http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&bare, false), "unknown");
    }

    #[test]
    fn client_key_uses_forwarded_header_behind_trusted_proxy() {
        let request = request_from([192, 0, 2, 10], Some("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_key(&request, true), "203.0.113.7");

        let direct = request_from([192, 0, 2, 10], None);
        assert_eq!(client_key(&direct, true), "192.0.2.10");
    }
}
