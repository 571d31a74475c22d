//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, limits, timeout, metrics)
//! - Gate the selection endpoint behind the throttle and writes behind auth
//! - Apply hot-reloaded configuration to live components
//! - Serve plain TCP or TLS until shutdown

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::TlsConfig;
use crate::config::DirectorConfig;
use crate::director::{Director, HOT_NODE_PATH};
use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::net::tls::load_tls_config;
use crate::observability::{metrics, ActivityLog, EventSink};
use crate::registry::NodeRegistry;
use crate::security::auth::require_api_secret;
use crate::security::throttle::throttle_middleware;
use crate::security::{ApiAuth, RequestThrottle, ThrottleState};

/// How long in-flight TLS connections get to finish after shutdown.
const TLS_DRAIN_SECS: u64 = 10;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub director: Arc<Director>,
    pub activity: Arc<ActivityLog>,
    pub throttle: Arc<RequestThrottle>,
    pub auth: Arc<ApiAuth>,
}

impl AppState {
    /// Push reloadable settings into the live components.
    pub fn apply_config(&self, config: &DirectorConfig) {
        self.throttle.reconfigure(config.throttle.clone());
        self.director.health().reconfigure(config.health_check.clone());
        self.auth.reconfigure(config.auth.api_secret.clone());
        tracing::info!(
            throttle_max = config.throttle.max_requests,
            throttle_window_secs = config.throttle.window_secs,
            health_mode = ?config.health_check.mode,
            "Applied reloaded configuration"
        );
    }
}

/// HTTP server for the node director.
pub struct HttpServer {
    router: Router,
    config: DirectorConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server over `registry` with the given configuration.
    pub fn new(config: DirectorConfig, registry: Arc<dyn NodeRegistry>) -> Self {
        let activity = Arc::new(ActivityLog::new(config.observability.activity_history));
        let events: Arc<dyn EventSink> = activity.clone();

        let state = AppState {
            director: Arc::new(Director::new(
                registry,
                config.health_check.clone(),
                events,
            )),
            activity,
            throttle: Arc::new(RequestThrottle::new(config.throttle.clone())),
            auth: Arc::new(ApiAuth::new(config.auth.api_secret.clone())),
        };

        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &DirectorConfig, state: AppState) -> Router {
        let throttle_state = ThrottleState {
            throttle: state.throttle.clone(),
            events: state.activity.clone(),
        };

        let throttled = Router::new()
            .route(HOT_NODE_PATH, get(handlers::hot_node))
            .route_layer(middleware::from_fn_with_state(
                throttle_state,
                throttle_middleware,
            ));

        let public = Router::new()
            .route("/api/node/{owner}", get(handlers::node_by_owner))
            .route("/api/nodes", get(handlers::list_nodes))
            .route("/health", get(handlers::director_health));

        let authenticated = Router::new()
            .route("/api/node", post(handlers::upsert_node))
            .route(
                "/api/node/{owner}",
                put(handlers::update_node).delete(handlers::delete_node),
            )
            .route("/api/check-health", post(handlers::check_health))
            .route("/api/activity", get(handlers::activity))
            .route_layer(middleware::from_fn_with_state(
                state.auth.clone(),
                require_api_secret,
            ));

        throttled
            .merge(public)
            .merge(authenticated)
            .with_state(state)
            .layer(middleware::from_fn(track_metrics))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Spawn the config-reload task and the throttle sweeper.
    fn spawn_background(
        &self,
        mut config_updates: mpsc::UnboundedReceiver<DirectorConfig>,
        shutdown: &broadcast::Receiver<()>,
    ) {
        let state = self.state.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => state.apply_config(&config),
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
            tracing::debug!("Config reload task exiting");
        });

        tokio::spawn(
            self.state
                .throttle
                .clone()
                .run_sweeper(shutdown.resubscribe()),
        );
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<DirectorConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        self.spawn_background(config_updates, &shutdown);

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: &TlsConfig,
        config_updates: mpsc::UnboundedReceiver<DirectorConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
        tracing::info!(address = %addr, "HTTPS server starting");

        self.spawn_background(config_updates, &shutdown);

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTPS server received shutdown signal");
            drain.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(
                self.router
                    .into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    /// The activity log backing `/api/activity`.
    pub fn activity(&self) -> Arc<ActivityLog> {
        self.state.activity.clone()
    }
}

/// Count every response by method and status.
async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let response = next.run(request).await;
    metrics::record_request(method.as_str(), response.status().as_u16());
    response
}
