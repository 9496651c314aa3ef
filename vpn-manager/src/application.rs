// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::constants::{LOG_PREFIX, RATE_LIMITED_MESSAGE, REAL_IP_HEADER, UNKNOWN_SOURCE};
use crate::manager::VpnManager;
use crate::rate_limit::{Decision, RateLimiter};
use crate::routes;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<VpnManager>,
    pub rate_limiter: Arc<RateLimiter>,
}

/// The source address a request is accounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(
        host: &str,
        port: u16,
        manager: Arc<VpnManager>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, std::io::Error> {
        let address = format!("{}:{}", host, port);
        let listener = TcpListener::bind(address).await?;
        let port = listener.local_addr()?.port();
        let router = create_router(manager, rate_limiter);

        tracing::info!("{} listening at http://{}:{}", LOG_PREFIX, host, port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serves until `shutdown` is cancelled, then lets in-flight requests finish.
    pub async fn run_until_stopped(self, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
    }
}

/// Builds the router with every action, the rate limiter and request tracing.
pub fn create_router(manager: Arc<VpnManager>, rate_limiter: Arc<RateLimiter>) -> Router {
    let state = AppState {
        manager,
        rate_limiter,
    };

    let mut router = Router::new().route("/", get(routes::about));
    for action in routes::ACTIONS {
        router = router
            .route(&format!("/{}", action.name), (action.route)())
            .route(&format!("/{}/{{*rest}}", action.name), (action.route)());
    }

    router
        .fallback(routes::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), admission))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolves the caller from the reverse proxy header, then the peer address.
pub fn resolve_caller(headers: &HeaderMap, peer: Option<SocketAddr>) -> Caller {
    let forwarded = headers
        .get(REAL_IP_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => Caller(ip.to_string()),
        (None, Some(peer)) => Caller(peer.ip().to_string()),
        (None, None) => Caller(UNKNOWN_SOURCE.to_string()),
    }
}

/// Counts the request against its caller before any action runs.
async fn admission(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| *address);
    let caller = resolve_caller(request.headers(), peer);

    let decision = state.rate_limiter.record_and_admit(&caller.0);
    if !decision.is_allowed() {
        tracing::info!(
            "{} request #{} from {} has been denied. Was a {} {}",
            LOG_PREFIX,
            state.rate_limiter.count(&caller.0),
            caller.0,
            request.method(),
            request.uri().path()
        );
        return denial(decision);
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(caller.clone());
    let response = next.run(request).await;
    tracing::info!(
        "{} got {} {} from {} - returned {}",
        LOG_PREFIX,
        method,
        path,
        caller.0,
        response.status().as_u16()
    );
    response
}

fn denial(decision: Decision) -> Response {
    match decision {
        Decision::SilentDeny => {
            let mut response = StatusCode::TOO_MANY_REQUESTS.into_response();
            response
                .headers_mut()
                .insert(header::CONNECTION, HeaderValue::from_static("close"));
            response
        }
        _ => (
            StatusCode::TOO_MANY_REQUESTS,
            axum::Json(serde_json::json!({
                "code": StatusCode::TOO_MANY_REQUESTS.as_u16(),
                "message": RATE_LIMITED_MESSAGE,
            })),
        )
            .into_response(),
    }
}
