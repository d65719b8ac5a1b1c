use crate::core::config::{DevelopmentSettings, PipelineConfig, ProductionSettings};
use crate::core::interfaces::{BuildService, FileSystemService, ProfileHandlers};
use crate::core::models::{BuildResult, CopyDescriptor};
use crate::infrastructure::dev_server::DevServer;
use crate::infrastructure::processors::ScriptCompiler;
use crate::utils::{Logger, Result, Timer};
use async_trait::async_trait;
use std::sync::Arc;

/// Post-build steps of a production build. Runs only after every unit was written.
pub struct ProductionFinalizer {
    fs_service: Arc<dyn FileSystemService>,
}

impl ProductionFinalizer {
    pub fn new(fs_service: Arc<dyn FileSystemService>) -> Self {
        Self { fs_service }
    }

    pub async fn run(&self, config: &PipelineConfig, settings: &ProductionSettings) -> Result<()> {
        let _timer = Timer::start("Production finalizer");

        let legacy = &settings.legacy_script;
        let source_path = config.resolve(&legacy.source);
        let source = self.fs_service.read_file(&source_path).await?;

        Logger::compiling("legacy script", &legacy.source);
        let code = ScriptCompiler::new(config.define.clone()).compile_legacy(&source, &source_path, &legacy.target)?;
        self.fs_service.write_file(&config.resolve(&legacy.output), &code).await?;
        Logger::emitted(&legacy.output, code.len());

        copy_sprite(self.fs_service.as_ref(), config, &settings.sprite).await
    }
}

/// The icon sprite is copied byte for byte in both profiles.
pub async fn copy_sprite(fs: &dyn FileSystemService, config: &PipelineConfig, sprite: &CopyDescriptor) -> Result<()> {
    let size = fs.copy_file(&config.resolve(&sprite.from), &config.resolve(&sprite.to)).await?;
    Logger::emitted(&sprite.to, size as usize);
    Ok(())
}

/// Production finalizes on disk, development hands over to the dev server.
pub struct SiteProfileHandlers {
    fs_service: Arc<dyn FileSystemService>,
    builder: Arc<dyn BuildService>,
}

impl SiteProfileHandlers {
    pub fn new(fs_service: Arc<dyn FileSystemService>, builder: Arc<dyn BuildService>) -> Self {
        Self { fs_service, builder }
    }
}

#[async_trait]
impl ProfileHandlers for SiteProfileHandlers {
    async fn finalize(
        &self,
        config: &PipelineConfig,
        settings: &ProductionSettings,
        _result: &BuildResult,
    ) -> Result<()> {
        ProductionFinalizer::new(self.fs_service.clone()).run(config, settings).await
    }

    async fn serve(&self, config: &PipelineConfig, settings: &DevelopmentSettings) -> Result<()> {
        copy_sprite(self.fs_service.as_ref(), config, &settings.sprite).await?;
        DevServer::new(config.clone(), settings.clone(), self.builder.clone()).run().await
    }
}
