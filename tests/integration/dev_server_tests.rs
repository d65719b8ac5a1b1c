use crate::write;
use axum::extract::ws::{Message as WsMessage, WebSocketUpgrade};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use sitepipe::core::{BuildProfile, PipelineConfig, ProfileBranch, ServerConfig};
use sitepipe::infrastructure::dev_server::{router, LiveReloadHub, ReloadEvent, ServerState};
use sitepipe::utils::EnvSource;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

fn serve(listener: TcpListener, app: Router) {
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
}

/// Answers every text frame with `echo: <text>`, like a generator's own reload socket.
async fn echo_socket(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|mut socket| async move {
        while let Some(Ok(msg)) = socket.recv().await {
            if let WsMessage::Text(text) = msg {
                let reply = format!("echo: {}", text.as_str());
                if socket.send(WsMessage::Text(reply.into())).await.is_err() {
                    break;
                }
            }
        }
    })
}

fn upstream(origin: String) -> Router {
    let page = format!(
        r#"<html><HEAD><title>Blog</title></HEAD><body><a href="{}/posts/">Posts</a></body></html>"#,
        origin
    );
    let redirect_to = format!("{}/new/", origin);

    Router::new()
        .route("/", get(move || async move { Html(page) }))
        .route(
            "/old/",
            get(move || async move { (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, redirect_to)]).into_response() }),
        )
        .route("/feed.xml", get(|| async { ([(header::CONTENT_TYPE, "application/xml")], "<rss></rss>") }))
        .route("/livereload", get(echo_socket))
}

/// Starts a fake site generator and the dev server in front of it.
async fn start(root: &std::path::Path) -> (SocketAddr, reqwest::Client) {
    start_with_hub(root, LiveReloadHub::new()).await
}

async fn start_with_hub(root: &std::path::Path, hub: LiveReloadHub) -> (SocketAddr, reqwest::Client) {
    let hugo_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let hugo_addr = hugo_listener.local_addr().unwrap();
    serve(hugo_listener, upstream(format!("http://{}", hugo_addr)));

    let config = PipelineConfig::new(root, BuildProfile::Development, &EnvSource::new()).unwrap();
    let ProfileBranch::Development(settings) = config.branch else {
        panic!("development profile expected");
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut server = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: addr.port(),
        ..settings.server
    };
    server.proxy.host = "127.0.0.1".to_string();
    server.proxy.port = hugo_addr.port();

    serve(listener, router(ServerState::new(root, &server, hub).unwrap()));

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    (addr, client)
}

#[tokio::test]
async fn test_proxied_html_gets_snippet_and_origin_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, client) = start(dir.path()).await;

    let body = client
        .get(format!("http://{}/", addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains(r#"<script async src="/__sitepipe/client.js"></script></HEAD>"#));
    assert!(body.contains(&format!(r#"href="http://{}/posts/""#, addr)));
}

#[tokio::test]
async fn test_redirects_point_back_at_proxy() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, client) = start(dir.path()).await;

    let response = client.get(format!("http://{}/old/", addr)).send().await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers()[reqwest::header::LOCATION].to_str().unwrap(),
        format!("http://{}/new/", addr)
    );
}

#[tokio::test]
async fn test_non_html_passes_through_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, client) = start(dir.path()).await;

    let body = client
        .get(format!("http://{}/feed.xml", addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "<rss></rss>");
}

#[tokio::test]
async fn test_static_outputs_win_over_proxy() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "dev/app.css", ".navbar{color:red}");
    let (addr, client) = start(dir.path()).await;

    let response = client.get(format!("http://{}/app.css", addr)).send().await.unwrap();
    assert!(response.headers()[reqwest::header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/css"));
    assert_eq!(response.text().await.unwrap(), ".navbar{color:red}");

    let client_js = client
        .get(format!("http://{}/__sitepipe/client.js", addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(client_js.contains("/__sitepipe/livereload"));
}

#[tokio::test]
async fn test_websocket_frames_round_trip_through_proxy() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, _) = start(dir.path()).await;

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/livereload", addr))
        .await
        .unwrap();
    socket.send(Message::Text("hello upstream".to_string())).await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reply, Message::Text("echo: hello upstream".to_string()));
}

#[tokio::test]
async fn test_livereload_socket_receives_events() {
    let dir = tempfile::tempdir().unwrap();
    let hub = LiveReloadHub::new();
    let (addr, _) = start_with_hub(dir.path(), hub.clone()).await;

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/__sitepipe/livereload", addr))
        .await
        .unwrap();
    let hello = socket.next().await.unwrap().unwrap();
    assert_eq!(hello, Message::Text(r#"{"type":"connected"}"#.to_string()));

    hub.notify(ReloadEvent::CssUpdate {
        path: "dev/app.css".to_string(),
    });
    let event = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(event, Message::Text(r#"{"type":"css-update","path":"dev/app.css"}"#.to_string()));
}
