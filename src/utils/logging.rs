use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

pub struct Logger;

impl Logger {
    /// Install the global subscriber. `RUST_LOG` wins over the default filter.
    pub fn init(verbose: bool) {
        let default = if verbose { "sitepipe=debug" } else { "sitepipe=info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }

    pub fn build_start(profile: &str, root: &Path, public_path: &Path) {
        info!("🔨 sitepipe - {} build", profile);
        info!("═══════════════════════════════════════");
        info!("📁 Root: {}", root.display());
        info!("📦 Public path: {}", public_path.display());
    }

    pub fn scanning_content(files: usize) {
        info!("🔍 Scanned {} content files for selector usage", files);
    }

    pub fn compiling(kind: &str, source: &Path) {
        debug!("⚡ Compiling {}: {}", kind, source.display());
    }

    pub fn purged(output: &str, kept: usize, removed: usize) {
        info!("🧹 {}: kept {} selectors, removed {}", output, kept, removed);
    }

    pub fn emitted(path: &Path, size: usize) {
        info!("  • {} ({} bytes)", path.display(), size);
    }

    pub fn build_complete(outputs: usize, build_time: std::time::Duration) {
        info!("");
        info!("✅ Build finished: {} files in {:.2?}", outputs, build_time);
    }

    pub fn info(msg: &str) {
        info!("{}", msg);
    }

    pub fn debug(msg: &str) {
        debug!("{}", msg);
    }

    pub fn error(msg: &str) {
        error!("❌ {}", msg);
    }

    pub fn warn(msg: &str) {
        warn!("⚠️  {}", msg);
    }
}

pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        debug!("⏱️  Starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!("⏱️  Completed: {} in {:.2?}", self.name, self.elapsed());
    }
}
