use super::types::{
    ENDPOINT_CONNECT, HEADER_CONNECTION_KEY, HEADER_PROXY_ID, HandshakeRequest, ProxyId,
    RouteStatus, TargetHealth, TargetStatus,
};
use crate::config::ProxyConfig;
use crate::error::{Error, Result};

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{CONTENT_LENGTH, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use futures::StreamExt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Largest request body the proxy buffers before forwarding.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Connection-scoped headers that must not be relayed in either direction.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

struct Target {
    url: String,
    authority: HeaderValue,
    key: String,
}

struct RouteHealth {
    states: Vec<TargetHealth>,
    cursor: usize,
}

struct RouteState {
    prefix: String,
    targets: Vec<Target>,
    health: Mutex<RouteHealth>,
}

/// The target chosen for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub route: usize,
    pub target: usize,
    pub url: String,
}

pub struct ProxyRouter {
    proxy_id: ProxyId,
    proxy_id_header: HeaderValue,
    routes: Vec<RouteState>,
    client: reqwest::Client,
    timeout: Duration,
}

impl ProxyRouter {
    pub fn new(config: &ProxyConfig) -> anyhow::Result<Arc<Self>> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;
        Self::with_client(config, client)
    }

    /// Same as `new` but with a caller-supplied HTTP client. The client must not
    /// follow redirects, or targets' 3xx answers are no longer relayed as-is.
    pub fn with_client(config: &ProxyConfig, client: reqwest::Client) -> anyhow::Result<Arc<Self>> {
        if config.routes.is_empty() {
            anyhow::bail!("proxy configuration has no routes");
        }

        let mut routes = Vec::with_capacity(config.routes.len());
        for route in &config.routes {
            if route.targets.is_empty() {
                tracing::warn!("Route '{}' has no targets and will always answer 503", route.path);
            }

            let mut targets = Vec::with_capacity(route.targets.len());
            for target in &route.targets {
                let parsed = reqwest::Url::parse(&target.url)
                    .map_err(|e| anyhow::anyhow!("invalid target url '{}': {}", target.url, e))?;
                let host = parsed
                    .host_str()
                    .ok_or_else(|| anyhow::anyhow!("target url '{}' has no host", target.url))?;
                let authority = match parsed.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                };

                targets.push(Target {
                    url: target.url.trim_end_matches('/').to_string(),
                    authority: HeaderValue::from_str(&authority)?,
                    key: target.key.clone(),
                });
            }

            routes.push(RouteState {
                prefix: route.path.clone(),
                health: Mutex::new(RouteHealth {
                    states: vec![TargetHealth::Unknown; targets.len()],
                    cursor: 0,
                }),
                targets,
            });
        }

        let proxy_id = config.proxy_id.clone().map(ProxyId).unwrap_or_default();
        let proxy_id_header = HeaderValue::from_str(&proxy_id.0)?;

        Ok(Arc::new(Self {
            proxy_id,
            proxy_id_header,
            routes,
            client,
            timeout: Duration::from_millis(config.timeout_ms),
        }))
    }

    pub fn proxy_id(&self) -> &ProxyId {
        &self.proxy_id
    }

    fn target(&self, route: usize, target: usize) -> Result<&Target> {
        self.routes
            .get(route)
            .and_then(|state| state.targets.get(target))
            .ok_or_else(|| Error::NotFound(format!("target {} of route {}", target, route)))
    }

    /// Handshakes every configured target and records the outcome.
    ///
    /// Unreachable targets are logged and left `Unhealthy`; the call only
    /// fails when not a single target answered.
    pub async fn connect_all(self: &Arc<Self>) -> anyhow::Result<usize> {
        let mut handshakes = JoinSet::new();
        for (route, state) in self.routes.iter().enumerate() {
            for target in 0..state.targets.len() {
                let router = Arc::clone(self);
                handshakes.spawn(async move {
                    let outcome = router.handshake(route, target).await;
                    (route, target, outcome)
                });
            }
        }

        let mut total = 0;
        let mut healthy = 0;
        while let Some(joined) = handshakes.join_next().await {
            let (route, target, outcome) = joined?;
            total += 1;
            let url = self.target(route, target)?.url.clone();

            match outcome {
                Ok(()) => {
                    self.set_health(route, target, TargetHealth::Healthy).await;
                    tracing::info!("Connected to target server: {}", url);
                    healthy += 1;
                }
                Err(e) => {
                    self.set_health(route, target, TargetHealth::Unhealthy).await;
                    tracing::warn!("Cannot reach target server {}, ignoring it: {}", url, e);
                }
            }
        }

        tracing::info!("Successfully connected to {} out of {} targets", healthy, total);
        if healthy == 0 {
            anyhow::bail!("no target servers available");
        }
        Ok(healthy)
    }

    /// `POST {target}/connect` with the pre-shared key; only a 200 counts.
    pub async fn handshake(&self, route: usize, target: usize) -> anyhow::Result<()> {
        let target = self.target(route, target)?;

        let response = self
            .client
            .post(format!("{}{}", target.url, ENDPOINT_CONNECT))
            .header(HEADER_CONNECTION_KEY, &target.key)
            .json(&HandshakeRequest {
                proxy_id: self.proxy_id.0.clone(),
            })
            .timeout(self.timeout)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("connection refused with {}: {}", status, body);
        }

        Ok(())
    }

    /// Index of the route with the longest prefix of `path`. Ties go to the
    /// route configured first.
    pub fn match_route(&self, path: &str) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (index, route) in self.routes.iter().enumerate() {
            if !path.starts_with(&route.prefix) {
                continue;
            }
            let longer = best.is_none_or(|(_, len)| route.prefix.len() > len);
            if longer {
                best = Some((index, route.prefix.len()));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Picks the next healthy target of `route` and advances the cursor.
    ///
    /// The cursor is reduced modulo the healthy subset as it is right now, under
    /// the same lock that guards health changes.
    pub async fn select(&self, route: usize) -> Result<Selection> {
        let state = self
            .routes
            .get(route)
            .ok_or_else(|| Error::NotFound(format!("route {}", route)))?;
        let mut health = state.health.lock().await;

        let healthy: Vec<usize> = health
            .states
            .iter()
            .enumerate()
            .filter(|(_, h)| **h == TargetHealth::Healthy)
            .map(|(index, _)| index)
            .collect();
        if healthy.is_empty() {
            return Err(Error::NoHealthyTarget(state.prefix.clone()));
        }

        let slot = health.cursor % healthy.len();
        health.cursor = (slot + 1) % healthy.len();
        let target = healthy[slot];

        Ok(Selection {
            route,
            target,
            url: state.targets[target].url.clone(),
        })
    }

    pub async fn set_health(&self, route: usize, target: usize, next: TargetHealth) {
        let Some(state) = self.routes.get(route) else {
            return;
        };
        let mut health = state.health.lock().await;
        if let Some(current) = health.states.get_mut(target) {
            *current = next;
        }
    }

    pub async fn health_of(&self, route: usize, target: usize) -> Option<TargetHealth> {
        let state = self.routes.get(route)?;
        let health = state.health.lock().await;
        health.states.get(target).copied()
    }

    pub async fn health_snapshot(&self) -> Vec<RouteStatus> {
        let mut snapshot = Vec::with_capacity(self.routes.len());
        for state in &self.routes {
            let health = state.health.lock().await;
            snapshot.push(RouteStatus {
                path: state.prefix.clone(),
                targets: state
                    .targets
                    .iter()
                    .zip(health.states.iter())
                    .map(|(target, health)| TargetStatus {
                        url: target.url.clone(),
                        health: *health,
                    })
                    .collect(),
            });
        }
        snapshot
    }

    /// Forwards one client request and relays the target's answer untouched.
    ///
    /// `timeout` bounds the wait for the response head and every gap between body
    /// chunks. Running into it, or any transport error, counts as a target failure.
    pub async fn forward(self: &Arc<Self>, request: Request) -> Result<Response> {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path();

        let route = self
            .match_route(path)
            .ok_or_else(|| Error::NotFound(format!("route for '{}'", path)))?;

        // Read before selecting so a bad body does not consume a rotation slot.
        let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| Error::InvalidPayload(e.to_string()))?;

        let selection = self.select(route).await?;
        let target = self.target(selection.route, selection.target)?;

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", target.url, path_and_query);

        let mut headers = relayable(&parts.headers);
        headers.remove(CONTENT_LENGTH);
        headers.insert(HOST, target.authority.clone());
        headers.insert(
            HeaderName::from_static(HEADER_PROXY_ID),
            self.proxy_id_header.clone(),
        );

        tracing::debug!("{} {} -> {}", parts.method, path_and_query, url);

        let sent = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send();

        let failure = match tokio::time::timeout(self.timeout, sent).await {
            Ok(Ok(upstream)) => return Ok(self.relay(selection, upstream)),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no response within {:?}", self.timeout),
        };

        self.mark_failed(&selection, &failure).await;
        Err(Error::BadGateway(format!("target {} failed", selection.url)))
    }

    async fn mark_failed(self: &Arc<Self>, selection: &Selection, reason: &str) {
        tracing::error!("Error forwarding to {}: {}", selection.url, reason);
        self.set_health(selection.route, selection.target, TargetHealth::Unhealthy)
            .await;
        self.spawn_reconnect(selection.route, selection.target);
    }

    /// Streams the target's answer back. A body that breaks off or stalls past
    /// `timeout` fails the target the same way a refused connection does.
    fn relay(self: &Arc<Self>, selection: Selection, upstream: reqwest::Response) -> Response {
        let status = upstream.status();
        let headers = relayable(upstream.headers());

        let watch = Some((Arc::clone(self), selection));
        let chunks = Box::pin(upstream.bytes_stream());
        let timeout = self.timeout;

        let body = futures::stream::unfold((chunks, watch), move |(mut chunks, watch)| async move {
            let (router, selection) = watch?;
            let failure = match tokio::time::timeout(timeout, chunks.next()).await {
                Ok(Some(Ok(chunk))) => return Some((Ok(chunk), (chunks, Some((router, selection))))),
                Ok(None) => return None,
                Ok(Some(Err(e))) => io::Error::other(e),
                Err(_) => io::Error::new(io::ErrorKind::TimedOut, "target body stalled"),
            };

            router.mark_failed(&selection, &failure.to_string()).await;
            Some((Err(failure), (chunks, None)))
        });

        let mut response = Response::new(Body::from_stream(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }

    /// One reconnect attempt right after a forwarding failure.
    fn spawn_reconnect(self: &Arc<Self>, route: usize, target: usize) {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            let url = match router.target(route, target) {
                Ok(target) => target.url.clone(),
                Err(_) => return,
            };

            match router.handshake(route, target).await {
                Ok(()) => {
                    router.set_health(route, target, TargetHealth::Healthy).await;
                    tracing::info!("Reconnected to {}", url);
                }
                Err(e) => {
                    tracing::warn!("Cannot reconnect to {}, leaving it unhealthy: {}", url, e);
                }
            }
        });
    }
}

fn relayable(headers: &HeaderMap) -> HeaderMap {
    let mut relayed = headers.clone();
    for name in HOP_BY_HOP {
        relayed.remove(name);
    }
    relayed
}
