use crate::core::config::{
    DevelopmentSettings, PipelineConfig, ServerConfig, CLIENT_SCRIPT_PATH, LIVERELOAD_PATH,
};
use crate::core::interfaces::BuildService;
use crate::infrastructure::dev_server::client::client_script;
use crate::infrastructure::dev_server::livereload::LiveReloadHub;
use crate::infrastructure::dev_server::proxy::ReverseProxy;
use crate::infrastructure::dev_server::watcher::{watch_outputs, watch_sources};
use crate::utils::{Logger, PipelineError, Result};
use axum::body::Body;
use axum::extract::{FromRequestParts, Request, State, WebSocketUpgrade};
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct ServerState {
    static_dirs: Arc<Vec<PathBuf>>,
    proxy: ReverseProxy,
    hub: LiveReloadHub,
    client_script: Arc<String>,
    websockets: bool,
}

impl ServerState {
    pub fn new(root: &Path, server: &ServerConfig, hub: LiveReloadHub) -> Result<Self> {
        Ok(Self {
            static_dirs: Arc::new(server.static_dirs.iter().map(|d| root.join(d)).collect()),
            proxy: ReverseProxy::new(server.proxy.clone(), server.origin(), server.snippet.clone())?,
            hub,
            client_script: Arc::new(client_script(LIVERELOAD_PATH)),
            websockets: server.websockets,
        })
    }
}

/// Live-reload routes first, then each static directory in order, then the proxy.
pub fn router(state: ServerState) -> Router {
    let proxy: Router = Router::new().fallback(proxy_or_bridge).with_state(state.clone());
    let static_then_proxy = state.static_dirs.iter().rev().fold(proxy, |next, dir| {
        Router::new().fallback_service(
            ServeDir::new(dir)
                .append_index_html_on_directories(false)
                .call_fallback_on_method_not_allowed(true)
                .fallback(next),
        )
    });

    Router::new()
        .route(LIVERELOAD_PATH, get(livereload_socket))
        .route(CLIENT_SCRIPT_PATH, get(livereload_client))
        .fallback_service(static_then_proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn livereload_socket(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| state.hub.handle_socket(socket))
}

async fn livereload_client(State(state): State<ServerState>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        state.client_script.as_str().to_owned(),
    )
}

async fn proxy_or_bridge(State(state): State<ServerState>, request: Request) -> Response<Body> {
    if is_websocket_upgrade(&request) {
        return upgrade_and_bridge(state, request).await;
    }

    state.proxy.forward(request).await
}

fn is_websocket_upgrade(request: &Request) -> bool {
    request
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

async fn upgrade_and_bridge(state: ServerState, request: Request) -> Response<Body> {
    if !state.websockets {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let (mut parts, _body) = request.into_parts();

    match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(ws) => {
            let proxy = state.proxy.clone();
            ws.on_upgrade(move |socket| async move { proxy.bridge_websocket(socket, path_and_query).await })
                .into_response()
        }
        Err(rejection) => rejection.into_response(),
    }
}

/// Development server: static outputs, proxy to the site generator, live reload.
pub struct DevServer {
    config: PipelineConfig,
    settings: DevelopmentSettings,
    builder: Arc<dyn BuildService>,
}

impl DevServer {
    pub fn new(config: PipelineConfig, settings: DevelopmentSettings, builder: Arc<dyn BuildService>) -> Self {
        Self {
            config,
            settings,
            builder,
        }
    }

    pub async fn run(self) -> Result<()> {
        let server = &self.settings.server;
        let hub = LiveReloadHub::new();

        // Dropping either watcher stops its events.
        let _outputs = watch_outputs(&self.config, server, hub.clone())?;
        let _sources = watch_sources(&self.config, &self.settings, self.builder.clone())?;

        let app = router(ServerState::new(&self.config.root, server, hub)?);
        let listener = tokio::net::TcpListener::bind(server.bind_address())
            .await
            .map_err(|e| PipelineError::Server(format!("Failed to bind {}: {}", server.bind_address(), e)))?;

        Logger::info("🚀 sitepipe dev server");
        Logger::info("═══════════════════════════════════════");
        Logger::info(&format!("🌐 Local: {}", server.origin()));
        Logger::info(&format!("🔁 Proxying: {}", server.proxy.origin()));
        Logger::info(&format!("📁 Static: {:?}", server.static_dirs));
        Logger::debug(&format!(
            "ghost mode: {}, open browser: {}",
            server.ghost_mode, server.open_browser
        ));

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| PipelineError::Server(e.to_string()))?;

        Logger::info("👋 Dev server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
