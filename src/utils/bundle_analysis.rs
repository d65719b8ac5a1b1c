// Bundle analysis: per-module size breakdown written next to the build output

use crate::core::models::{BuildResult, ModuleStat};
use crate::utils::{Logger, PipelineError, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const REPORT_JSON: &str = "bundle-report.json";
pub const REPORT_HTML: &str = "bundle-report.html";

/// Gzip-compressed size of `bytes` at the default level.
pub fn gzip_size(bytes: &[u8]) -> usize {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(bytes).is_err() {
        return bytes.len();
    }
    encoder.finish().map(|out| out.len()).unwrap_or(bytes.len())
}

/// Statistics for a single module in the bundle
#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    pub id: String,
    pub chunk: String,
    pub size: usize,
    pub gzip_size: usize,
    /// Percentage of all bundled module bytes
    pub share: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkReport {
    pub chunk: String,
    pub modules: usize,
    pub size: usize,
    pub gzip_size: usize,
}

/// Complete bundle analysis results
#[derive(Debug, Clone, Serialize)]
pub struct BundleAnalysis {
    pub generated_at: String,
    pub total_size: usize,
    pub total_gzip_size: usize,
    pub chunks: Vec<ChunkReport>,
    /// Sorted by size, descending
    pub modules: Vec<ModuleReport>,
}

impl BundleAnalysis {
    pub fn analyze(result: &BuildResult) -> Self {
        Self::from_modules(&result.modules)
    }

    pub fn from_modules(stats: &[ModuleStat]) -> Self {
        let total_size: usize = stats.iter().map(|m| m.size).sum();
        let total_gzip_size: usize = stats.iter().map(|m| m.gzip_size).sum();

        let mut modules: Vec<ModuleReport> = stats
            .iter()
            .map(|m| ModuleReport {
                id: m.id.clone(),
                chunk: m.chunk.clone(),
                size: m.size,
                gzip_size: m.gzip_size,
                share: if total_size > 0 {
                    (m.size as f64 / total_size as f64) * 100.0
                } else {
                    0.0
                },
            })
            .collect();
        modules.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.id.cmp(&b.id)));

        let mut by_chunk: BTreeMap<String, ChunkReport> = BTreeMap::new();
        for module in &modules {
            let chunk = by_chunk
                .entry(module.chunk.clone())
                .or_insert_with(|| ChunkReport {
                    chunk: module.chunk.clone(),
                    modules: 0,
                    size: 0,
                    gzip_size: 0,
                });
            chunk.modules += 1;
            chunk.size += module.size;
            chunk.gzip_size += module.gzip_size;
        }

        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            total_size,
            total_gzip_size,
            chunks: by_chunk.into_values().collect(),
            modules,
        }
    }

    /// Write the JSON and HTML reports into `dir`, returning both paths.
    pub fn write_reports(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).map_err(PipelineError::Io)?;

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::config(format!("Failed to serialize analysis: {}", e)))?;
        let json_path = dir.join(REPORT_JSON);
        std::fs::write(&json_path, json).map_err(PipelineError::Io)?;

        let html_path = dir.join(REPORT_HTML);
        std::fs::write(&html_path, self.render_html()).map_err(PipelineError::Io)?;

        Logger::info(&format!(
            "📊 Bundle analysis: {} modules, {} ({} gzip)",
            self.modules.len(),
            format_size(self.total_size),
            format_size(self.total_gzip_size)
        ));

        Ok(vec![json_path, html_path])
    }

    pub fn render_html(&self) -> String {
        let mut rows = String::new();
        for module in &self.modules {
            rows.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><div class=\"bar\" style=\"width:{:.1}%\"></div>{:.1}%</td></tr>\n",
                escape_html(&module.id),
                escape_html(&module.chunk),
                format_size(module.size),
                format_size(module.gzip_size),
                module.share,
                module.share
            ));
        }

        let mut chunks = String::new();
        for chunk in &self.chunks {
            chunks.push_str(&format!(
                "<li><strong>{}</strong>: {} modules, {} ({} gzip)</li>\n",
                escape_html(&chunk.chunk),
                chunk.modules,
                format_size(chunk.size),
                format_size(chunk.gzip_size)
            ));
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Bundle report</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; width: 100%; }}
td, th {{ border-bottom: 1px solid #ddd; padding: .3rem .6rem; text-align: left; }}
.bar {{ display: inline-block; height: .7rem; background: #4a90d9; margin-right: .4rem; }}
</style>
</head>
<body>
<h1>Bundle report</h1>
<p>Generated {generated}. Total {total} ({gzip} gzip).</p>
<ul>
{chunks}</ul>
<table>
<thead><tr><th>Module</th><th>Chunk</th><th>Size</th><th>Gzip</th><th>Share</th></tr></thead>
<tbody>
{rows}</tbody>
</table>
</body>
</html>
"#,
            generated = escape_html(&self.generated_at),
            total = format_size(self.total_size),
            gzip = format_size(self.total_gzip_size),
            chunks = chunks,
            rows = rows
        )
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    if bytes < KB as usize {
        format!("{} B", bytes)
    } else if bytes < MB as usize {
        format!("{:.2} KB", bytes as f64 / KB)
    } else {
        format!("{:.2} MB", bytes as f64 / MB)
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
