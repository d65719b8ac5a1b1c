use crate::core::config::PurgeConfig;
use crate::core::models::UsedTokens;
use crate::utils::{Logger, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Top-level directories never walked. Deeper directories are left to the globs.
const SKIPPED_ROOT_DIRS: [&str; 3] = ["node_modules", ".git", "public"];

/// Finds the content files a purge pass must read.
pub struct ContentScanner {
    root: PathBuf,
    globs: GlobSet,
}

impl ContentScanner {
    pub fn new(root: &Path, patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            root: root.to_path_buf(),
            globs: builder.build()?,
        })
    }

    /// Matching files, sorted, as absolute paths.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_skipped(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .strip_prefix(&self.root)
                    .map(|rel| self.globs.is_match(rel))
                    .unwrap_or(false)
            })
            .map(DirEntry::into_path)
            .collect();

        files.sort();
        files
    }

    /// Union of tokens over every matching file. Unreadable files and files
    /// without an extractor contribute nothing.
    pub fn collect(&self, config: &PurgeConfig) -> (UsedTokens, usize) {
        let files = self.files();

        let used = files
            .par_iter()
            .filter_map(|path| {
                let extractor = config.extractors.for_path(path)?;
                match std::fs::read_to_string(path) {
                    Ok(content) => Some(extractor.extract(&content)),
                    Err(e) => {
                        Logger::warn(&format!("Skipping {}: {}", path.display(), e));
                        None
                    }
                }
            })
            .reduce(UsedTokens::new, |mut acc, tokens| {
                acc.merge(tokens);
                acc
            });

        (used, files.len())
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() == 1
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIPPED_ROOT_DIRS.contains(&name))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PipelineConfig;
    use crate::core::models::BuildProfile;
    use crate::utils::EnvSource;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scanner_matches_configured_globs() {
        let dir = tempdir().unwrap();
        write(dir.path(), "layouts/_default/baseof.html", "<main></main>");
        write(dir.path(), "layouts/partials/nav.html", "<nav></nav>");
        write(dir.path(), "src/js/app.js", "");
        write(dir.path(), "src/js/components/Card.jsx", "");
        write(dir.path(), "src/scss/app.scss", "");
        write(dir.path(), "node_modules/pkg/index.js", "");
        write(dir.path(), "content/post.md", "");

        let scanner = ContentScanner::new(
            dir.path(),
            &["layouts/**/*.html".to_string(), "src/**/*.{js,ts,jsx,tsx}".to_string()],
        )
        .unwrap();
        let files: Vec<PathBuf> = scanner
            .files()
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            files,
            vec![
                PathBuf::from("layouts/_default/baseof.html"),
                PathBuf::from("layouts/partials/nav.html"),
                PathBuf::from("src/js/app.js"),
                PathBuf::from("src/js/components/Card.jsx"),
            ]
        );
    }

    #[test]
    fn test_nested_directories_named_like_skipped_ones_are_scanned() {
        let dir = tempdir().unwrap();
        write(dir.path(), "layouts/partials/public/card.html", r#"<div class="card"></div>"#);
        write(dir.path(), "public/index.html", r#"<div class="generated"></div>"#);
        write(dir.path(), "public/layouts/stale.html", "");

        let scanner = ContentScanner::new(
            dir.path(),
            &["layouts/**/*.html".to_string(), "**/layouts/*.html".to_string()],
        )
        .unwrap();

        assert_eq!(scanner.files(), vec![dir.path().join("layouts/partials/public/card.html")]);
    }

    #[test]
    fn test_collect_unions_extractor_output() {
        let dir = tempdir().unwrap();
        write(dir.path(), "layouts/index.html", r#"<div class="hero"></div>"#);
        write(dir.path(), "src/js/app.js", "menu.classList.add('sidebar-open');");
        write(dir.path(), "src/js/empty.js", "export default 1;");

        let config = PipelineConfig::new(dir.path(), BuildProfile::Production, &EnvSource::new()).unwrap();
        let scanner = ContentScanner::new(dir.path(), &config.purge.content).unwrap();
        let (used, scanned) = scanner.collect(&config.purge);

        assert_eq!(scanned, 3);
        assert!(used.has_class("hero"));
        assert!(used.has_class("sidebar-open"));
        assert!(!used.has_class("default"));
    }
}
