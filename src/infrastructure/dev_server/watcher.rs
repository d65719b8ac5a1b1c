use crate::core::config::{DevelopmentSettings, PipelineConfig, ServerConfig};
use crate::core::interfaces::BuildService;
use crate::infrastructure::dev_server::livereload::{LiveReloadHub, ReloadEvent};
use crate::utils::{Logger, PipelineError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const REBUILD_DEBOUNCE: Duration = Duration::from_millis(150);

/// Decides which changed output files the browser should hear about.
#[derive(Debug, Clone)]
pub struct OutputFilter {
    root: PathBuf,
    watch: GlobSet,
    ignore: BTreeSet<String>,
}

impl OutputFilter {
    pub fn new(root: &Path, server: &ServerConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &server.watch_files {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            root: root.to_path_buf(),
            watch: builder.build()?,
            ignore: server.ignore.iter().cloned().collect(),
        })
    }

    /// Root-relative path when the file is watched and not ignored.
    pub fn accept(&self, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let ignored = relative
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| self.ignore.contains(name));

        (!ignored && self.watch.is_match(relative)).then(|| relative.to_path_buf())
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_))
}

fn channel_watcher(tx: mpsc::Sender<Event>) -> Result<RecommendedWatcher> {
    let watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if is_content_change(&event.kind) {
                    let _ = tx.try_send(event);
                }
            }
        },
        Config::default(),
    )?;
    Ok(watcher)
}

/// Watch the public directory and push reload events for matching outputs.
///
/// The returned watcher must be kept alive for events to flow.
pub fn watch_outputs(
    config: &PipelineConfig,
    server: &ServerConfig,
    hub: LiveReloadHub,
) -> Result<RecommendedWatcher> {
    let filter = OutputFilter::new(&config.root, server)?;
    let (tx, mut rx) = mpsc::channel(256);
    let mut watcher = channel_watcher(tx)?;

    let public_dir = config.public_dir();
    std::fs::create_dir_all(&public_dir).map_err(PipelineError::Io)?;
    watcher.watch(&public_dir, RecursiveMode::NonRecursive)?;
    Logger::info(&format!("👁️  Watching outputs in {}", public_dir.display()));

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            for path in event.paths {
                if let Some(relative) = filter.accept(&path) {
                    hub.notify(ReloadEvent::for_path(&relative));
                }
            }
        }
    });

    Ok(watcher)
}

/// Rebuild in development whenever a source directory changes.
///
/// Bursts of events are coalesced into one rebuild. A failing rebuild is
/// logged and the server keeps running.
pub fn watch_sources(
    config: &PipelineConfig,
    settings: &DevelopmentSettings,
    builder: Arc<dyn BuildService>,
) -> Result<RecommendedWatcher> {
    let (tx, mut rx) = mpsc::channel(1024);
    let mut watcher = channel_watcher(tx)?;

    for dir in &settings.rebuild_on {
        let path = config.resolve(dir);
        if path.is_dir() {
            watcher.watch(&path, RecursiveMode::Recursive)?;
            Logger::debug(&format!("Watching sources in {}", path.display()));
        }
    }

    let config = config.clone();
    tokio::spawn(async move {
        while let Some(first) = rx.recv().await {
            tokio::time::sleep(REBUILD_DEBOUNCE).await;
            let mut changed = first.paths;
            while let Ok(event) = rx.try_recv() {
                changed.extend(event.paths);
            }

            if let Some(path) = changed.first() {
                Logger::info(&format!("📝 Changed: {}", path.display()));
            }
            if let Err(e) = builder.build(&config).await {
                Logger::error(&format!("Rebuild failed: {}", e));
            }
        }
    });

    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ProfileBranch;
    use crate::core::models::BuildProfile;
    use crate::utils::EnvSource;

    fn dev_server(root: &Path) -> ServerConfig {
        let config = PipelineConfig::new(root, BuildProfile::Development, &EnvSource::new()).unwrap();
        match config.branch {
            ProfileBranch::Development(settings) => settings.server,
            ProfileBranch::Production(_) => unreachable!(),
        }
    }

    #[test]
    fn test_output_filter_matches_watch_set() {
        let root = Path::new("/site");
        let filter = OutputFilter::new(root, &dev_server(root)).unwrap();

        assert_eq!(filter.accept(Path::new("/site/dev/app.css")), Some(PathBuf::from("dev/app.css")));
        assert!(filter.accept(Path::new("/site/dev/vendor-dark.css")).is_some());
        assert!(filter.accept(Path::new("/site/dev/app.js")).is_some());
        assert!(filter.accept(Path::new("/site/dev/other.js")).is_none());
    }

    #[test]
    fn test_output_filter_respects_ignore_list() {
        let root = Path::new("/site");
        let mut server = dev_server(root);
        server.watch_files.push("dev/*.json".to_string());
        let filter = OutputFilter::new(root, &server).unwrap();

        assert!(filter.accept(Path::new("/site/dev/mix-manifest.json")).is_none());
    }
}
