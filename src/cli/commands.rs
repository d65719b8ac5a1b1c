use crate::core::{dispatch, BuildProfile, BuildService, FileSystemService, PipelineBuildService, PipelineConfig};
use crate::infrastructure::{ModuleGraphBundler, SassStyleProcessor, SiteProfileHandlers, TokioFileSystemService};
use crate::utils::{EnvSource, Logger};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sitepipe")]
#[command(about = "Asset pipeline for Hugo sites", version)]
pub struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    /// Production profile (also selected by NODE_ENV=production)
    #[arg(long)]
    pub production: bool,
    /// Project root
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build, then finalize (production) or serve (development)
    Build(ProfileArgs),
    /// Print the resolved configuration as JSON
    Config(ProfileArgs),
}

pub struct CliHandler;

impl Default for CliHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let cli = Cli::parse();
        Logger::init(cli.verbose);

        match cli.command {
            Commands::Build(args) => self.handle_build_command(&args).await,
            Commands::Config(args) => self.handle_config_command(&args),
        }
    }

    async fn handle_build_command(&self, args: &ProfileArgs) -> anyhow::Result<()> {
        let config = load_config(args)?;

        let fs_service: Arc<dyn FileSystemService> = Arc::new(TokioFileSystemService);
        let builder: Arc<dyn BuildService> = Arc::new(PipelineBuildService::new(
            fs_service.clone(),
            Arc::new(SassStyleProcessor::new()),
            Arc::new(ModuleGraphBundler::new()),
        ));

        let result = builder.build(&config).await.context("Build failed")?;

        let handlers = SiteProfileHandlers::new(fs_service, builder);
        dispatch(&config, &result, &handlers)
            .await
            .with_context(|| format!("{} step failed", config.profile.as_str()))?;

        Ok(())
    }

    fn handle_config_command(&self, args: &ProfileArgs) -> anyhow::Result<()> {
        let config = load_config(args)?;
        let json = serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?;
        println!("{}", json);
        Ok(())
    }
}

/// Environment first (`.env` under process variables), then the profile, then the config.
pub fn load_config(args: &ProfileArgs) -> anyhow::Result<PipelineConfig> {
    let root = absolute_root(&args.root)?;
    let env = EnvSource::load(&root).with_context(|| format!("Failed to read environment for {}", root.display()))?;
    let profile = BuildProfile::detect(args.production, env.get("NODE_ENV"));

    PipelineConfig::new(root, profile, &env).context("Invalid configuration")
}

fn absolute_root(root: &Path) -> anyhow::Result<PathBuf> {
    root.canonicalize()
        .with_context(|| format!("Project root {} does not exist", root.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cli_parses_build_flags() {
        let cli = Cli::try_parse_from(["sitepipe", "-v", "build", "--production", "--root", "site"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Build(args) => {
                assert!(args.production);
                assert_eq!(args.root, PathBuf::from("site"));
            }
            Commands::Config(_) => panic!("expected build"),
        }
    }

    #[test]
    fn test_load_config_reads_dotenv() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "NODE_ENV=production\n").unwrap();

        let config = load_config(&ProfileArgs {
            production: false,
            root: dir.path().to_path_buf(),
        })
        .unwrap();

        if std::env::var("NODE_ENV").is_err() {
            assert!(config.profile.is_production());
        }
    }

    #[test]
    fn test_missing_root_is_reported() {
        let err = load_config(&ProfileArgs {
            production: true,
            root: PathBuf::from("/definitely/not/here"),
        })
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
