#![allow(dead_code)]

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use emqx_client::{DiscoveryOptions, EndpointConfig};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Which admin API the mock broker answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Legacy,
    Current,
    Neither,
}

/// Switches flipped by the tests while the mock broker is running
#[derive(Debug)]
pub struct MockState {
    pub reachable: AtomicBool,
    pub fail_broker_metrics: AtomicBool,
    pub saw_basic_auth: AtomicBool,
    pub requests: AtomicUsize,
}

impl MockState {
    fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
            fail_broker_metrics: AtomicBool::new(false),
            saw_basic_auth: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
        }
    }
}

pub struct MockBroker {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    shutdown: CancellationToken,
}

impl MockBroker {
    pub async fn start(flavor: Flavor) -> MockBroker {
        Self::start_with(flavor, true).await
    }

    /// Starts a mock broker on an ephemeral port; `reachable = false` answers 503 to everything.
    pub async fn start_with(flavor: Flavor, reachable: bool) -> MockBroker {
        let state = Arc::new(MockState::new(reachable));
        let routes = match flavor {
            Flavor::Legacy => legacy_routes(),
            Flavor::Current => current_routes(),
            Flavor::Neither => Router::new(),
        };
        let app = routes.layer(middleware::from_fn_with_state(state.clone(), gate));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock broker");
        let addr = listener.local_addr().expect("mock broker address");
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone().cancelled_owned();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).with_graceful_shutdown(stop).await;
        });

        MockBroker {
            addr,
            state,
            shutdown,
        }
    }

    pub fn endpoint(&self) -> EndpointConfig {
        EndpointConfig::new(self.addr.to_string()).with_timeout(Duration::from_secs(2))
    }

    pub fn set(&self, switch: &AtomicBool, on: bool) {
        switch.store(on, Ordering::SeqCst);
    }
}

impl Drop for MockBroker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Short retry interval so real-time tests converge quickly
pub fn fast_discovery() -> DiscoveryOptions {
    DiscoveryOptions {
        retry_interval: Duration::from_millis(200),
        ..Default::default()
    }
}

/// Waits for a condition to be true with timeout
pub async fn wait_for_condition<F, Fut>(mut condition: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn gate(State(state): State<Arc<MockState>>, request: Request, next: Next) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if request.headers().contains_key("authorization") {
        state.saw_basic_auth.store(true, Ordering::SeqCst);
    }
    if !state.reachable.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let broker_metrics = matches!(request.uri().path(), "/api/v4/metrics" | "/api/v5/metrics");
    if broker_metrics && state.fail_broker_metrics.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    next.run(request).await
}

fn envelope(data: Value) -> Json<Value> {
    Json(json!({ "code": 0, "data": data }))
}

fn legacy_routes() -> Router {
    Router::new()
        .route(
            "/api/v4/nodes",
            get(|| async {
                envelope(json!([
                    {
                        "node": "emqx@10.0.0.1",
                        "node_status": "Running",
                        "version": "4.4.19",
                        "uptime": "1 days, 2 hours, 3 minutes, 4 seconds",
                        "max_fds": 1048576,
                        "connections": 3,
                        "load1": "0.50",
                        "load5": "0.40",
                        "load15": "0.30"
                    },
                    {
                        "node": "emqx@10.0.0.2",
                        "node_status": "Running",
                        "version": "4.4.19",
                        "uptime": "5 minutes, 1 seconds",
                        "connections": 4
                    }
                ]))
            }),
        )
        .route(
            "/api/v4/metrics",
            get(|| async {
                envelope(json!([
                    {"node": "emqx@10.0.0.1", "metrics": {"messages.received": 100, "messages.sent": 80, "messages.dropped": 1}},
                    {"node": "emqx@10.0.0.2", "metrics": {"messages.received": 50, "messages.sent": 20, "messages.dropped": 0}}
                ]))
            }),
        )
        .route(
            "/api/v4/stats",
            get(|| async {
                envelope(json!([
                    {"node": "emqx@10.0.0.1", "stats": {"connections.count": 3, "topics.count": 5, "retained.count": 2, "subscriptions.count": 6, "sessions.count": 3}},
                    {"node": "emqx@10.0.0.2", "stats": {"connections.count": 4, "topics.count": 5, "retained.count": 2, "subscriptions.count": 1, "sessions.count": 4}}
                ]))
            }),
        )
        .route(
            "/api/v4/resources",
            get(|| async {
                envelope(json!([
                    {"id": "resource:webhook", "type": "web_hook", "status": [{"node": "emqx@10.0.0.1", "is_alive": true}, {"node": "emqx@10.0.0.2", "is_alive": true}]},
                    {"id": "resource:kafka", "type": "bridge_kafka", "status": [{"node": "emqx@10.0.0.1", "is_alive": false}]}
                ]))
            }),
        )
        .route(
            "/api/v4/rules",
            get(|| async {
                envelope(json!([
                    {
                        "id": "rule:1",
                        "enabled": true,
                        "metrics": [
                            {"node": "emqx@10.0.0.1", "matched": 10, "passed": 9, "failed": 1, "no_result": 0, "speed": 0.5, "speed_max": 2, "speed_last5m": 0.25}
                        ],
                        "actions": [
                            {"metrics": [{"node": "emqx@10.0.0.1", "success": 8, "failed": 1, "taken": 9}]}
                        ]
                    }
                ]))
            }),
        )
}

fn current_routes() -> Router {
    Router::new()
        .route(
            "/api/v5/nodes",
            get(|| async {
                Json(json!([{
                    "node": "emqx@10.0.0.3",
                    "node_status": "running",
                    "version": "5.3.0",
                    "uptime": 120000,
                    "max_fds": 1048576,
                    "connections": 12,
                    "load1": 0.1,
                    "load5": 0.2,
                    "load15": 0.3
                }]))
            }),
        )
        .route(
            "/api/v5/license",
            get(|| async { Json(json!({"max_connections": 1000, "expiry_at": "2099-12-31"})) }),
        )
        .route(
            "/api/v5/metrics",
            get(|| async {
                Json(json!({"messages.received": 500, "messages.sent": 400, "messages.dropped": 3}))
            }),
        )
        .route(
            "/api/v5/stats",
            get(|| async {
                Json(json!({"connections.count": 12, "topics.count": 8, "subscriptions.count": 20, "retained.count": 2, "sessions.count": 12}))
            }),
        )
        .route(
            "/api/v5/monitor_current",
            get(|| async { Json(json!({"received_msg_rate": 5, "sent_msg_rate": 4})) }),
        )
        .route(
            "/api/v5/bridges",
            get(|| async {
                Json(json!([{"name": "to_kafka", "type": "kafka", "status": "connecting"}]))
            }),
        )
        .route(
            "/api/v5/rules",
            get(|| async {
                Json(json!({"data": [{"id": "rule_a", "enable": true}], "meta": {"count": 1}}))
            }),
        )
        .route(
            "/api/v5/rules/{id}/metrics",
            get(|Path(id): Path<String>| async move {
                Json(json!({
                    "id": id,
                    "node_metrics": [{
                        "node": "emqx@10.0.0.3",
                        "metrics": {
                            "matched": 7, "passed": 6, "failed": 1, "failed.no_result": 1,
                            "matched.rate": 1.5, "matched.rate.last5m": 1.0, "matched.rate.max": 3.0,
                            "actions.total": 6, "actions.success": 5, "actions.failed": 1
                        }
                    }]
                }))
            }),
        )
        .route(
            "/api/v5/authentication",
            get(|| async {
                Json(json!([
                    {"id": "password_based:built_in_database", "enable": true},
                    {"id": "jwt", "enable": false}
                ]))
            }),
        )
        .route(
            "/api/v5/authentication/{id}/status",
            get(|| async {
                Json(json!({
                    "status": "connected",
                    "node_metrics": [{"node": "emqx@10.0.0.3", "metrics": {"total": 10, "success": 8, "failed": 1, "nomatch": 1, "rate": 0.5}}]
                }))
            }),
        )
        .route(
            "/api/v5/authorization/sources",
            get(|| async { Json(json!({"sources": [{"type": "file", "enable": true}]})) }),
        )
        .route(
            "/api/v5/authorization/sources/{type}/status",
            get(|| async {
                Json(json!({
                    "status": "connected",
                    "node_metrics": [{"node": "emqx@10.0.0.3", "metrics": {"total": 4, "allow": 3, "deny": 1, "nomatch": 0}}]
                }))
            }),
        )
}
