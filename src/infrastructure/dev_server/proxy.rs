use crate::core::config::{ProxyTarget, SnippetRule};
use crate::infrastructure::dev_server::snippet::inject_snippet;
use crate::utils::{Logger, PipelineError, Result};
use axum::body::{to_bytes, Body};
use axum::extract::ws::{CloseFrame as AxumCloseFrame, Message as AxumMessage, WebSocket};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

/// Connection-scoped headers that must not be forwarded by a proxy.
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

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Point absolute redirects at the upstream back at the proxy.
pub fn rewrite_location(location: &str, upstream_origin: &str, proxy_origin: &str) -> String {
    match location.strip_prefix(upstream_origin) {
        Some(rest) => format!("{}{}", proxy_origin, rest),
        None => location.to_string(),
    }
}

/// Forwards everything the static directories do not answer to the site generator.
#[derive(Clone)]
pub struct ReverseProxy {
    client: reqwest::Client,
    target: ProxyTarget,
    public_origin: String,
    snippet: SnippetRule,
}

impl ReverseProxy {
    pub fn new(target: ProxyTarget, public_origin: String, snippet: SnippetRule) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| PipelineError::Server(format!("Failed to build proxy client: {}", e)))?;

        Ok(Self {
            client,
            target,
            public_origin,
            snippet,
        })
    }

    fn upstream_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.target.origin(), path_and_query)
    }

    pub async fn forward(&self, request: Request<Body>) -> Response<Body> {
        match self.try_forward(request).await {
            Ok(response) => response,
            Err(e) => {
                Logger::warn(&format!("Proxy error: {}", e));
                Response::builder()
                    .status(StatusCode::BAD_GATEWAY)
                    .body(Body::from(format!("sitepipe: upstream {} unavailable\n", self.target.origin())))
                    .unwrap_or_default()
            }
        }
    }

    async fn try_forward(&self, request: Request<Body>) -> Result<Response<Body>> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = self.upstream_url(path_and_query);

        let body = to_bytes(body, usize::MAX)
            .await
            .map_err(|e| PipelineError::Server(format!("Failed to read request body: {}", e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in parts.headers.iter() {
            if is_hop_by_hop(name) || name == header::HOST || name == header::ACCEPT_ENCODING {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
        // Compressed HTML could not be rewritten.
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));

        let upstream = self
            .client
            .request(parts.method.clone(), &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| PipelineError::Server(format!("{} {}: {}", parts.method, url, e)))?;

        let status = upstream.status();
        let upstream_headers = upstream.headers().clone();
        let is_html = upstream_headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/html"));

        let bytes = upstream
            .bytes()
            .await
            .map_err(|e| PipelineError::Server(format!("Failed to read upstream body: {}", e)))?;

        let body = if is_html {
            Body::from(self.rewrite_html(&String::from_utf8_lossy(&bytes)))
        } else {
            Body::from(bytes)
        };

        let mut response = Response::builder().status(status);
        for (name, value) in upstream_headers.iter() {
            if is_hop_by_hop(name) || name == header::CONTENT_LENGTH {
                continue;
            }
            if name == header::LOCATION {
                if let Ok(location) = value.to_str() {
                    let rewritten = rewrite_location(location, &self.target.origin(), &self.public_origin);
                    if let Ok(value) = HeaderValue::from_str(&rewritten) {
                        response = response.header(name, value);
                        continue;
                    }
                }
            }
            response = response.header(name, value);
        }

        response
            .body(body)
            .map_err(|e| PipelineError::Server(format!("Failed to build response: {}", e)))
    }

    /// Absolute upstream links become proxy links, then the snippet goes in.
    pub fn rewrite_html(&self, html: &str) -> String {
        let html = html.replace(&self.target.origin(), &self.public_origin);
        inject_snippet(&html, &self.snippet).into_owned()
    }

    /// Pump frames between a browser socket and the upstream until either side closes.
    pub async fn bridge_websocket(&self, socket: WebSocket, path_and_query: String) {
        let url = format!("ws://{}{}", self.target.authority(), path_and_query);
        let upstream = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                Logger::warn(&format!("WebSocket proxy to {} failed: {}", url, e));
                return;
            }
        };

        let (mut client_tx, mut client_rx) = socket.split();
        let (mut upstream_tx, mut upstream_rx) = upstream.split();

        let to_upstream = async {
            while let Some(Ok(msg)) = client_rx.next().await {
                let Some(msg) = to_upstream_message(msg) else { continue };
                let closing = matches!(msg, UpstreamMessage::Close(_));
                if upstream_tx.send(msg).await.is_err() || closing {
                    break;
                }
            }
        };

        let to_client = async {
            while let Some(Ok(msg)) = upstream_rx.next().await {
                let Some(msg) = to_client_message(msg) else { continue };
                let closing = matches!(msg, AxumMessage::Close(_));
                if client_tx.send(msg).await.is_err() || closing {
                    break;
                }
            }
        };

        tokio::select! {
            _ = to_upstream => {}
            _ = to_client => {}
        }
    }
}

fn to_upstream_message(msg: AxumMessage) -> Option<UpstreamMessage> {
    Some(match msg {
        AxumMessage::Text(text) => UpstreamMessage::Text(text.to_string()),
        AxumMessage::Binary(data) => UpstreamMessage::Binary(data.to_vec()),
        AxumMessage::Ping(data) => UpstreamMessage::Ping(data.to_vec()),
        AxumMessage::Pong(data) => UpstreamMessage::Pong(data.to_vec()),
        AxumMessage::Close(_) => UpstreamMessage::Close(None),
    })
}

fn to_client_message(msg: UpstreamMessage) -> Option<AxumMessage> {
    match msg {
        UpstreamMessage::Text(text) => Some(AxumMessage::Text(text.into())),
        UpstreamMessage::Binary(data) => Some(AxumMessage::Binary(data.into())),
        UpstreamMessage::Ping(data) => Some(AxumMessage::Ping(data.into())),
        UpstreamMessage::Pong(data) => Some(AxumMessage::Pong(data.into())),
        UpstreamMessage::Close(frame) => Some(AxumMessage::Close(frame.map(|f| AxumCloseFrame {
            code: f.code.into(),
            reason: f.reason.to_string().into(),
        }))),
        UpstreamMessage::Frame(_) => None,
    }
}
