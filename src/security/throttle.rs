//! Per-origin request throttle for the selection endpoint.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::ThrottleConfig;
use crate::http::request::client_ip;
use crate::http::response::ApiError;
use crate::observability::{metrics, ActivityEvent, EventSink};

/// A fixed counting window for one origin.
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Result of a throttle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Throttling disabled or origin allow-listed.
    Bypassed,
    Admitted {
        limit: u32,
        remaining: u32,
        reset_after: Duration,
    },
    Rejected {
        limit: u32,
        retry_after: Duration,
    },
}

struct Settings {
    config: ThrottleConfig,
    allow_list: HashSet<IpAddr>,
}

impl Settings {
    fn from_config(config: ThrottleConfig) -> Self {
        let allow_list = config
            .allow_list
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid throttle allow-list entry");
                    None
                }
            })
            .collect();
        Self { config, allow_list }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_secs)
    }
}

/// Counts admissions per origin in fixed windows.
pub struct RequestThrottle {
    windows: Mutex<HashMap<IpAddr, Window>>,
    settings: ArcSwap<Settings>,
}

impl RequestThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            settings: ArcSwap::from_pointee(Settings::from_config(config)),
        }
    }

    /// Swap in new limits. Existing windows keep their counts.
    pub fn reconfigure(&self, config: ThrottleConfig) {
        self.settings.store(Arc::new(Settings::from_config(config)));
    }

    pub fn trusts_forwarded_for(&self) -> bool {
        self.settings.load().config.trust_forwarded_for
    }

    pub fn message(&self) -> String {
        self.settings.load().config.message.clone()
    }

    pub fn check(&self, origin: IpAddr) -> Admission {
        self.check_at(origin, Instant::now())
    }

    /// Count one request from `origin` at `now`.
    ///
    /// The first `max_requests` requests in a window are admitted, later ones
    /// are rejected until the window that started with the first request ends.
    pub fn check_at(&self, origin: IpAddr, now: Instant) -> Admission {
        let settings = self.settings.load();
        if !settings.config.enabled || settings.allow_list.contains(&origin) {
            return Admission::Bypassed;
        }

        let limit = settings.config.max_requests;
        let window = settings.window();

        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let entry = windows.entry(origin).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(entry.started) >= window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        let reset_after = (entry.started + window).saturating_duration_since(now);
        if entry.count < limit {
            entry.count += 1;
            Admission::Admitted {
                limit,
                remaining: limit - entry.count,
                reset_after,
            }
        } else {
            Admission::Rejected {
                limit,
                retry_after: reset_after,
            }
        }
    }

    /// Drop windows that have ended. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let window = self.settings.load().window();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.started) < window);
        before - windows.len()
    }

    pub fn tracked_origins(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }

    /// Delay between sweeps: the current window, capped at a minute.
    pub fn sweep_period(&self) -> Duration {
        self.settings.load().window().min(Duration::from_secs(60))
    }

    /// Periodically purge ended windows until shutdown.
    ///
    /// The period is re-read before every sleep so a reloaded window applies
    /// from the next sweep.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = time::sleep(self.sweep_period()) => {
                    let removed = self.purge_expired(Instant::now());
                    if removed > 0 {
                        tracing::debug!(removed, "Purged expired throttle windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Throttle sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// State for the throttle middleware.
#[derive(Clone)]
pub struct ThrottleState {
    pub throttle: Arc<RequestThrottle>,
    pub events: Arc<dyn EventSink>,
}

fn set_rate_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset: Duration) {
    headers.insert("ratelimit-limit", HeaderValue::from(limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(reset.as_secs()));
}

/// Middleware gating a route by per-origin admissions.
///
/// A rejected request never reaches the handler.
pub async fn throttle_middleware(
    State(state): State<ThrottleState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = client_ip(request.headers(), peer, state.throttle.trusts_forwarded_for());

    match state.throttle.check(origin) {
        Admission::Bypassed => next.run(request).await,
        Admission::Admitted {
            limit,
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            set_rate_limit_headers(response.headers_mut(), limit, remaining, reset_after);
            response
        }
        Admission::Rejected { limit, retry_after } => {
            let path = request.uri().path().to_string();
            state
                .events
                .emit(ActivityEvent::throttle_rejected(&origin.to_string(), &path));
            metrics::record_throttle_rejection();

            let retry_after_secs = retry_after.as_secs().max(1);
            let mut response = ApiError::Throttled {
                message: state.throttle.message(),
                retry_after_secs,
            }
            .into_response();
            set_rate_limit_headers(response.headers_mut(), limit, 0, retry_after);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_requests: u32, window_secs: u64) -> ThrottleConfig {
        ThrottleConfig {
            max_requests,
            window_secs,
            ..Default::default()
        }
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let throttle = RequestThrottle::new(ThrottleConfig::default());
        let origin: IpAddr = "203.0.113.7".parse().unwrap();
        let now = Instant::now();

        for i in 1..=30 {
            match throttle.check_at(origin, now) {
                Admission::Admitted { remaining, .. } => assert_eq!(remaining, 30 - i),
                other => panic!("request {} should be admitted, got {:?}", i, other),
            }
        }
        assert!(matches!(
            throttle.check_at(origin, now),
            Admission::Rejected { limit: 30, .. }
        ));
    }

    #[test]
    fn test_origins_are_independent() {
        let throttle = RequestThrottle::new(config(1, 3600));
        let now = Instant::now();
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(matches!(throttle.check_at(a, now), Admission::Admitted { .. }));
        assert!(matches!(throttle.check_at(a, now), Admission::Rejected { .. }));
        assert!(matches!(throttle.check_at(b, now), Admission::Admitted { .. }));
    }

    #[test]
    fn test_window_resets() {
        let throttle = RequestThrottle::new(config(2, 60));
        let origin: IpAddr = "10.0.0.1".parse().unwrap();
        let start = Instant::now();

        throttle.check_at(origin, start);
        throttle.check_at(origin, start + Duration::from_secs(10));
        match throttle.check_at(origin, start + Duration::from_secs(20)) {
            Admission::Rejected { retry_after, .. } => assert_eq!(retry_after, Duration::from_secs(40)),
            other => panic!("expected rejection, got {:?}", other),
        }

        assert!(matches!(
            throttle.check_at(origin, start + Duration::from_secs(60)),
            Admission::Admitted { remaining: 1, .. }
        ));
    }

    #[test]
    fn test_allow_list_bypasses() {
        let mut cfg = config(1, 3600);
        cfg.allow_list = vec!["10.0.0.9".into()];
        let throttle = RequestThrottle::new(cfg);
        let origin: IpAddr = "10.0.0.9".parse().unwrap();

        for _ in 0..5 {
            assert_eq!(throttle.check(origin), Admission::Bypassed);
        }
        assert_eq!(throttle.tracked_origins(), 0);
    }

    #[test]
    fn test_reconfigure_applies_new_limit() {
        let throttle = RequestThrottle::new(config(1, 3600));
        let origin: IpAddr = "10.0.0.1".parse().unwrap();
        let now = Instant::now();
        throttle.check_at(origin, now);
        assert!(matches!(throttle.check_at(origin, now), Admission::Rejected { .. }));

        throttle.reconfigure(config(3, 3600));
        assert!(matches!(
            throttle.check_at(origin, now),
            Admission::Admitted { remaining: 1, .. }
        ));
    }

    #[test]
    fn test_purge_expired() {
        let throttle = RequestThrottle::new(config(5, 60));
        let start = Instant::now();
        throttle.check_at("10.0.0.1".parse().unwrap(), start);
        throttle.check_at("10.0.0.2".parse().unwrap(), start + Duration::from_secs(30));

        assert_eq!(throttle.purge_expired(start + Duration::from_secs(61)), 1);
        assert_eq!(throttle.tracked_origins(), 1);
    }

    #[test]
    fn test_sweep_period_follows_reloaded_window() {
        let throttle = RequestThrottle::new(config(5, 3600));
        assert_eq!(throttle.sweep_period(), Duration::from_secs(60));

        throttle.reconfigure(config(5, 5));
        assert_eq!(throttle.sweep_period(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let throttle = Arc::new(RequestThrottle::new(config(5, 1)));
        throttle.check("10.0.0.1".parse().unwrap());
        let (tx, rx) = broadcast::channel(1);
        let sweeper = tokio::spawn(throttle.clone().run_sweeper(rx));

        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(throttle.tracked_origins(), 0);

        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(1), sweeper)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
