use crate::core::config::{DevelopmentSettings, PipelineConfig, ProductionSettings};
use crate::core::models::*;
use crate::utils::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// File system operations interface
#[async_trait]
pub trait FileSystemService: Send + Sync {
    async fn read_file(&self, path: &Path) -> Result<String>;
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;
    async fn copy_file(&self, from: &Path, to: &Path) -> Result<u64>;
    async fn create_directory(&self, path: &Path) -> Result<()>;
}

/// Turns raw file content into the selector tokens it proves are used.
///
/// Implementations must be pure: identical content yields identical tokens,
/// and content without any match yields an empty set rather than an error.
pub trait UsageExtractor: Send + Sync {
    fn name(&self) -> &str;
    fn extract(&self, content: &str) -> UsedTokens;
}

/// Extractors keyed by file extension, with an optional catch-all.
#[derive(Clone, Default)]
pub struct ExtractorSet {
    by_extension: BTreeMap<String, Arc<dyn UsageExtractor>>,
    fallback: Option<Arc<dyn UsageExtractor>>,
}

impl ExtractorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, extensions: &[&str], extractor: Arc<dyn UsageExtractor>) -> Self {
        for ext in extensions {
            self.by_extension
                .insert(ext.to_ascii_lowercase(), Arc::clone(&extractor));
        }
        self
    }

    pub fn with_fallback(mut self, extractor: Arc<dyn UsageExtractor>) -> Self {
        self.fallback = Some(extractor);
        self
    }

    pub fn for_path(&self, path: &Path) -> Option<&dyn UsageExtractor> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        self.by_extension
            .get(&ext)
            .or(self.fallback.as_ref())
            .map(|e| e.as_ref())
    }

    /// `(extension, extractor name)` pairs, catch-all last as `*`.
    pub fn describe(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .by_extension
            .iter()
            .map(|(ext, e)| (ext.clone(), e.name().to_string()))
            .collect();
        if let Some(fallback) = &self.fallback {
            out.push(("*".to_string(), fallback.name().to_string()));
        }
        out
    }
}

impl std::fmt::Debug for ExtractorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.describe()).finish()
    }
}

/// Compiles one style unit, eliminating rules not covered by `used`.
#[async_trait]
pub trait StyleProcessor: Send + Sync {
    async fn compile(
        &self,
        entry: &EntryDescriptor,
        config: &PipelineConfig,
        used: &UsedTokens,
    ) -> Result<(CompiledAsset, PurgeStats)>;
}

/// Bundles one script entry. May emit several chunks (runtime, vendor, app).
#[async_trait]
pub trait ScriptBundler: Send + Sync {
    async fn bundle(
        &self,
        entry: &EntryDescriptor,
        config: &PipelineConfig,
    ) -> Result<Vec<CompiledAsset>>;
}

/// One full pass: scan content, compile every unit, write outputs and manifest.
#[async_trait]
pub trait BuildService: Send + Sync {
    async fn build(&self, config: &PipelineConfig) -> Result<BuildResult>;
}

/// The two mutually exclusive things a build can lead into.
#[async_trait]
pub trait ProfileHandlers: Send + Sync {
    async fn finalize(
        &self,
        config: &PipelineConfig,
        settings: &ProductionSettings,
        result: &BuildResult,
    ) -> Result<()>;

    async fn serve(&self, config: &PipelineConfig, settings: &DevelopmentSettings) -> Result<()>;
}
