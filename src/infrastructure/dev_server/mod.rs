// Development server: static outputs, reverse proxy, live reload
pub mod client;
pub mod livereload;
pub mod proxy;
pub mod server;
pub mod snippet;
pub mod watcher;

pub use livereload::{LiveReloadHub, ReloadEvent};
pub use proxy::{rewrite_location, ReverseProxy};
pub use server::{router, DevServer, ServerState};
pub use snippet::inject_snippet;
pub use watcher::{watch_outputs, watch_sources, OutputFilter};
