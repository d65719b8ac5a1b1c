use crate::site_fixture;
use async_trait::async_trait;
use sitepipe::core::{
    dispatch, BuildProfile, BuildResult, BuildService, DevelopmentSettings, PipelineBuildService, PipelineConfig,
    ProductionSettings, ProfileHandlers,
};
use sitepipe::infrastructure::{ModuleGraphBundler, SassStyleProcessor, SiteProfileHandlers, TokioFileSystemService};
use sitepipe::utils::{EnvSource, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn build_service() -> PipelineBuildService {
    PipelineBuildService::new(
        Arc::new(TokioFileSystemService),
        Arc::new(SassStyleProcessor::new()),
        Arc::new(ModuleGraphBundler::new()),
    )
}

fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap_or_else(|e| panic!("{}: {}", rel, e))
}

#[tokio::test]
async fn test_production_build_and_finalize() {
    let site = site_fixture();
    let root = site.path();
    let config = PipelineConfig::new(root, BuildProfile::Production, &EnvSource::new()).unwrap();

    let builder: Arc<dyn BuildService> = Arc::new(build_service());
    let result = builder.build(&config).await.unwrap();
    let handlers = SiteProfileHandlers::new(Arc::new(TokioFileSystemService), builder.clone());
    dispatch(&config, &result, &handlers).await.unwrap();

    for output in [
        "app.js",
        "manifest.js",
        "vendor.js",
        "app.css",
        "app-dark.css",
        "vendor.css",
        "vendor-dark.css",
        "inline.js",
        "images/icons-sprite.svg",
    ] {
        assert!(root.join("static/build").join(output).is_file(), "missing {}", output);
    }

    let app_css = read(root, "static/build/app.css");
    assert!(app_css.contains(".navbar{color:red}"));
    assert!(app_css.contains(".navbar-item"));
    assert!(app_css.contains(".sidebar-visible"), "classList usage keeps the rule");
    assert!(app_css.contains(".is-online"), "safelisted rule survives without usage");
    assert!(app_css.contains("#home"));
    assert!(!app_css.contains(".unused-widget"));
    assert!(!read(root, "static/build/vendor.css").contains(".modal"));

    let vendor_js = read(root, "static/build/vendor.js");
    assert!(vendor_js.contains("node_modules/tiny-dom/index.js"));
    assert!(!read(root, "static/build/app.js").contains("document.body"));

    let inline = read(root, "static/build/inline.js");
    assert!(!inline.contains("?."));
    assert!(!inline.contains("??"));

    let manifest: BTreeMap<String, String> = serde_json::from_str(&read(root, "data/manifest.json")).unwrap();
    assert_eq!(
        manifest.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![
            "/app-dark.css",
            "/app.css",
            "/app.js",
            "/manifest.js",
            "/vendor-dark.css",
            "/vendor.css",
            "/vendor.js"
        ]
    );
    for (key, value) in &manifest {
        assert!(value.starts_with(&format!("{}?id=", key)));
    }

    assert!(!root.join("static/build/bundle-report.json").exists());
    assert_eq!(result.purge_stats.len(), 4);
}

#[tokio::test]
async fn test_builds_are_deterministic() {
    let site = site_fixture();
    let root = site.path();
    let config = PipelineConfig::new(root, BuildProfile::Production, &EnvSource::new()).unwrap();

    build_service().build(&config).await.unwrap();
    let first = read(root, "data/manifest.json");
    let first_css = read(root, "static/build/app.css");

    build_service().build(&config).await.unwrap();
    assert_eq!(first, read(root, "data/manifest.json"));
    assert_eq!(first_css, read(root, "static/build/app.css"));
}

#[tokio::test]
async fn test_development_build_layout() {
    let site = site_fixture();
    let root = site.path();
    let config = PipelineConfig::new(root, BuildProfile::Development, &EnvSource::new()).unwrap();

    build_service().build(&config).await.unwrap();

    let app_js = read(root, "dev/app.js");
    assert!(app_js.contains("//# sourceMappingURL=data:application/json"));
    assert!(!root.join("dev/vendor.js").exists());
    assert!(read(root, "dev/app.css").contains("/*# sourceMappingURL=data:application/json"));

    let manifest: BTreeMap<String, String> = serde_json::from_str(&read(root, "dev/mix-manifest.json")).unwrap();
    assert!(manifest.contains_key("/app.js"));
    assert!(!manifest.contains_key("/vendor.js"));
}

#[tokio::test]
async fn test_analyze_writes_reports() {
    let site = site_fixture();
    let root = site.path();
    let env = EnvSource::new().with("ANALYZE", "true");
    let config = PipelineConfig::new(root, BuildProfile::Production, &env).unwrap();

    let result = build_service().build(&config).await.unwrap();

    let report: serde_json::Value = serde_json::from_str(&read(root, "static/build/bundle-report.json")).unwrap();
    assert_eq!(report["modules"].as_array().unwrap().len(), result.modules.len());
    assert!(read(root, "static/build/bundle-report.html").contains("<table>"));
}

#[tokio::test]
async fn test_style_error_fails_the_build() {
    let site = site_fixture();
    crate::write(site.path(), "src/scss/vendor.scss", ".x { color: $missing; }\n");
    let config = PipelineConfig::new(site.path(), BuildProfile::Production, &EnvSource::new()).unwrap();

    assert!(build_service().build(&config).await.is_err());
    assert!(!site.path().join("data/manifest.json").exists());
}

#[derive(Default)]
struct Recording {
    finalized: AtomicUsize,
    served: AtomicUsize,
}

#[async_trait]
impl ProfileHandlers for Recording {
    async fn finalize(&self, _: &PipelineConfig, _: &ProductionSettings, result: &BuildResult) -> Result<()> {
        assert!(!result.modules.is_empty());
        self.finalized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn serve(&self, _: &PipelineConfig, _: &DevelopmentSettings) -> Result<()> {
        self.served.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_exactly_one_branch_runs_after_build() {
    let site = site_fixture();

    for profile in [BuildProfile::Production, BuildProfile::Development] {
        let config = PipelineConfig::new(site.path(), profile, &EnvSource::new()).unwrap();
        let result = build_service().build(&config).await.unwrap();
        let handlers = Recording::default();

        dispatch(&config, &result, &handlers).await.unwrap();

        let expected = if profile.is_production() { (1, 0) } else { (0, 1) };
        assert_eq!(
            (handlers.finalized.load(Ordering::SeqCst), handlers.served.load(Ordering::SeqCst)),
            expected
        );
    }
}
