use crate::{site_fixture, write};
use sitepipe::core::{BuildProfile, PipelineConfig, UsageExtractor};
use sitepipe::infrastructure::purge::{ClassListExtractor, ContentScanner, DefaultExtractor, RuleEliminator};
use sitepipe::utils::EnvSource;

fn scan(root: &std::path::Path) -> (PipelineConfig, sitepipe::core::UsedTokens, usize) {
    let config = PipelineConfig::new(root, BuildProfile::Production, &EnvSource::new()).unwrap();
    let (used, files) = ContentScanner::new(root, &config.purge.content)
        .unwrap()
        .collect(&config.purge);
    (config, used, files)
}

#[test]
fn test_scan_covers_layouts_and_scripts() {
    let site = site_fixture();
    let (_, used, files) = scan(site.path());

    // layouts/index.html, src/js/app.js, src/js/toggle.js, src/js/inline.js
    assert_eq!(files, 4);
    assert!(used.has_class("navbar"));
    assert!(used.has_class("sidebar-visible"));
    assert!(used.has_id("home"));
    assert!(!used.has_class("unused-widget"));
}

#[test]
fn test_safelist_and_usage_decide_survival() {
    let site = site_fixture();
    let (config, used, _) = scan(site.path());
    let eliminator = RuleEliminator::new(&used, &config.purge);

    assert!(eliminator.keep_selector_text(".is-online"));
    assert!(eliminator.keep_selector_text(".is-online .avatar"));
    assert!(eliminator.keep_selector_text("pre code.language-rust"));
    assert!(eliminator.keep_selector_text("nav.navbar > a.navbar-item:hover"));
    assert!(!eliminator.keep_selector_text(".unused-widget"));
    assert!(!eliminator.keep_selector_text("nav .dropdown"));
}

#[test]
fn test_script_without_class_list_yields_nothing() {
    let used = ClassListExtractor.extract("const x = document.querySelector('.navbar');\nx.style.color = 'red';\n");
    assert!(used.is_empty());
}

#[test]
fn test_typescript_sources_use_default_tokenizer() {
    let site = site_fixture();
    write(
        site.path(),
        "src/js/widgets/rating.ts",
        "const css: string = isActive ? 'rating-active' : 'rating-idle';\n",
    );
    let (_, used, files) = scan(site.path());

    assert_eq!(files, 5);
    assert!(used.has_class("rating-active"));
    assert!(used.has_id("rating-idle"));
    assert_eq!(
        DefaultExtractor.extract("a-b c_d").undetermined.into_iter().collect::<Vec<_>>(),
        vec!["a-b".to_string(), "c_d".to_string()]
    );
}

#[test]
fn test_extraction_is_deterministic() {
    let site = site_fixture();
    let (_, first, _) = scan(site.path());
    let (_, second, _) = scan(site.path());

    assert_eq!(first, second);
}
