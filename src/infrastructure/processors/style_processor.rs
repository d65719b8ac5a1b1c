use crate::core::config::PipelineConfig;
use crate::core::interfaces::StyleProcessor;
use crate::core::models::{AssetKind, CompiledAsset, EntryDescriptor, PurgeStats, UsedTokens};
use crate::infrastructure::processors::common::inline_source_map_comment;
use crate::infrastructure::purge::RuleEliminator;
use crate::utils::{Logger, PipelineError, Result, Timer};
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use once_cell::sync::Lazy;
use parcel_sourcemap::SourceMap;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::path::Path;

/// Root-relative `url(/...)` references. Protocol-relative `//host` urls excluded.
static ROOT_RELATIVE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*(['"]?)(/[^/'")][^'")]*)(['"]?)\s*\)"#).expect("url pattern compiles")
});

/// Sass via grass, then parse, purge, minify and print via lightningcss.
pub struct SassStyleProcessor;

impl SassStyleProcessor {
    pub fn new() -> Self {
        Self
    }

    fn compile_sass(&self, source: &Path, config: &PipelineConfig) -> Result<String> {
        let node_modules = config.root.join("node_modules");
        let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
        if let Some(dir) = source.parent() {
            options = options.load_path(dir);
        }
        options = options.load_path(&node_modules);

        grass::from_path(source, &options).map_err(|e| PipelineError::style(source, e))
    }
}

impl Default for SassStyleProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StyleProcessor for SassStyleProcessor {
    async fn compile(
        &self,
        entry: &EntryDescriptor,
        config: &PipelineConfig,
        used: &UsedTokens,
    ) -> Result<(CompiledAsset, PurgeStats)> {
        let _timer = Timer::start(&format!("Compiling style {}", entry.display_name()));
        let source = config.resolve(&entry.source);
        Logger::compiling(AssetKind::Style.as_str(), &entry.source);

        let css = self.compile_sass(&source, config)?;
        let css = prefix_resource_root(&css, &config.output.resource_root);
        let filename = entry.source.display().to_string();

        let mut stylesheet = StyleSheet::parse(
            &css,
            ParserOptions {
                filename: filename.clone(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| PipelineError::style(&source, e))?;

        let counts = RuleEliminator::new(used, &config.purge).eliminate(&mut stylesheet.rules);

        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| PipelineError::style(&source, e))?;

        let code = if config.inline_source_maps() {
            let mut source_map = SourceMap::new("/");
            source_map.add_source(&filename);
            source_map
                .set_source_content(0, &css)
                .map_err(|e| PipelineError::style(&source, e))?;

            let printed = stylesheet
                .to_css(PrinterOptions {
                    minify: true,
                    source_map: Some(&mut source_map),
                    ..PrinterOptions::default()
                })
                .map_err(|e| PipelineError::style(&source, e))?;

            let map = source_map
                .to_json(None)
                .map_err(|e| PipelineError::style(&source, e))?;
            format!("{}\n{}", printed.code, inline_source_map_comment(&map, true))
        } else {
            stylesheet
                .to_css(PrinterOptions {
                    minify: true,
                    ..PrinterOptions::default()
                })
                .map_err(|e| PipelineError::style(&source, e))?
                .code
        };

        let stats = PurgeStats {
            output: entry.display_name(),
            kept: counts.kept,
            removed: counts.removed,
        };
        Logger::purged(&stats.output, stats.kept, stats.removed);

        Ok((CompiledAsset::new(&entry.output, AssetKind::Style, code), stats))
    }
}

/// Prefix root-relative urls with the resource root (`/img/a.png` → `/build/img/a.png`).
pub fn prefix_resource_root<'a>(css: &'a str, resource_root: &str) -> Cow<'a, str> {
    let root = resource_root.trim_end_matches('/');
    if root.is_empty() {
        return Cow::Borrowed(css);
    }

    ROOT_RELATIVE_URL.replace_all(css, |caps: &Captures| {
        let path = &caps[2];
        if path == root || path.starts_with(&format!("{}/", root)) {
            caps[0].to_string()
        } else {
            format!("url({}{}{}{})", &caps[1], root, path, &caps[3])
        }
    })
}
