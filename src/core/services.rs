use crate::core::config::PipelineConfig;
use crate::core::interfaces::*;
use crate::core::models::*;
use crate::infrastructure::manifest::AssetManifest;
use crate::infrastructure::purge::ContentScanner;
use crate::utils::{BundleAnalysis, Logger, PipelineError, Result, Timer};
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Instant;

/// Main build service implementation
pub struct PipelineBuildService {
    fs_service: Arc<dyn FileSystemService>,
    style_processor: Arc<dyn StyleProcessor>,
    script_bundler: Arc<dyn ScriptBundler>,
}

impl PipelineBuildService {
    pub fn new(
        fs_service: Arc<dyn FileSystemService>,
        style_processor: Arc<dyn StyleProcessor>,
        script_bundler: Arc<dyn ScriptBundler>,
    ) -> Self {
        Self {
            fs_service,
            style_processor,
            script_bundler,
        }
    }

    /// Union of used tokens across every content file.
    async fn scan_usage(&self, config: &PipelineConfig) -> Result<UsedTokens> {
        let _timer = Timer::start("Content scanning");
        let root = config.root.clone();
        let purge = config.purge.clone();

        let (used, files) = tokio::task::spawn_blocking(move || {
            ContentScanner::new(&root, &purge.content).map(|scanner| scanner.collect(&purge))
        })
        .await
        .map_err(|e| PipelineError::config(format!("content scan task failed: {}", e)))??;

        Logger::scanning_content(files);
        Ok(used)
    }

    async fn compile_entry(
        &self,
        entry: &EntryDescriptor,
        config: &PipelineConfig,
        used: &UsedTokens,
    ) -> Result<(Vec<CompiledAsset>, Option<PurgeStats>)> {
        match entry.kind {
            AssetKind::Script => Ok((self.script_bundler.bundle(entry, config).await?, None)),
            AssetKind::Style => {
                let (asset, stats) = self.style_processor.compile(entry, config, used).await?;
                Ok((vec![asset], Some(stats)))
            }
        }
    }

    async fn write_output_files(
        &self,
        assets: &[CompiledAsset],
        config: &PipelineConfig,
    ) -> Result<Vec<OutputFile>> {
        let public_dir = config.public_dir();
        let mut manifest = AssetManifest::new();
        let mut output_files = Vec::with_capacity(assets.len() + 1);

        for asset in assets {
            let path = public_dir.join(&asset.output);
            self.fs_service.write_file(&path, &asset.code).await?;
            manifest.insert(&asset.output, asset.code.as_bytes());

            Logger::emitted(&config.output.public_path.join(&asset.output), asset.code.len());
            output_files.push(OutputFile::new(&path, asset.code.len()));
        }

        let manifest_path = config.manifest_file();
        let manifest_json = manifest.to_json();
        self.fs_service.write_file(&manifest_path, &manifest_json).await?;
        Logger::emitted(&config.output.manifest_path, manifest_json.len());
        output_files.push(OutputFile::new(&manifest_path, manifest_json.len()));

        Ok(output_files)
    }
}

#[async_trait::async_trait]
impl BuildService for PipelineBuildService {
    async fn build(&self, config: &PipelineConfig) -> Result<BuildResult> {
        let start_time = Instant::now();
        Logger::build_start(config.profile.as_str(), &config.root, &config.output.public_path);

        let used = self.scan_usage(config).await?;

        let compiled = try_join_all(
            config
                .entries
                .iter()
                .map(|entry| self.compile_entry(entry, config, &used)),
        )
        .await?;

        let mut assets = Vec::new();
        let mut purge_stats = Vec::new();
        for (entry_assets, stats) in compiled {
            assets.extend(entry_assets);
            purge_stats.extend(stats);
        }

        let mut output_files = self.write_output_files(&assets, config).await?;

        let mut result = BuildResult {
            modules: assets.iter().flat_map(|a| a.modules.iter().cloned()).collect(),
            purge_stats,
            ..BuildResult::default()
        };

        if config.analyze {
            let reports = BundleAnalysis::analyze(&result).write_reports(&config.public_dir())?;
            for path in reports {
                let size = std::fs::metadata(&path).map(|m| m.len() as usize).unwrap_or(0);
                output_files.push(OutputFile::new(&path, size));
            }
        }

        result.output_files = output_files;
        result.build_time = start_time.elapsed();
        Logger::build_complete(result.output_files.len(), result.build_time);

        Ok(result)
    }
}
