use crate::utils::{ModuleAliasResolver, PipelineError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The fields of a package.json that take part in resolution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageJson {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub browser: Option<BrowserField>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BrowserField {
    String(String),
    Object(HashMap<String, serde_json::Value>),
}

const EXTENSIONS: [&str; 6] = ["js", "mjs", "cjs", "jsx", "ts", "json"];

/// Node-style resolution: relative paths, then aliases, then `node_modules`
/// walked upward from the importer.
pub struct NodeModuleResolver {
    root: PathBuf,
    aliases: ModuleAliasResolver,
    package_cache: HashMap<PathBuf, PackageJson>,
}

impl NodeModuleResolver {
    pub fn new(root: impl Into<PathBuf>, aliases: ModuleAliasResolver) -> Self {
        Self {
            root: root.into(),
            aliases,
            package_cache: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, specifier: &str, importer: &Path) -> Result<PathBuf> {
        self.try_resolve(specifier, importer)
            .map(|p| path_clean::clean(&p))
            .ok_or_else(|| PipelineError::resolve(specifier, importer))
    }

    fn try_resolve(&mut self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = importer.parent()?;
            return self.resolve_file_or_directory(&base.join(specifier));
        }

        if let Some(rest) = specifier.strip_prefix('/') {
            return self.resolve_file_or_directory(&self.root.join(rest));
        }

        let specifier = self.aliases.rewrite(specifier).into_owned();
        self.resolve_node_module(&specifier, importer)
    }

    fn resolve_node_module(&mut self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        let (package, subpath) = parse_package_specifier(specifier);
        let mut current = importer.parent();

        while let Some(dir) = current {
            let package_dir = dir.join("node_modules").join(&package);
            if package_dir.is_dir() {
                if let Some(entry) = self.resolve_package_entry(&package_dir, subpath.as_deref()) {
                    return Some(entry);
                }
            }

            if dir == self.root {
                break;
            }
            current = dir.parent();
        }

        None
    }

    fn resolve_package_entry(&mut self, package_dir: &Path, subpath: Option<&str>) -> Option<PathBuf> {
        if let Some(subpath) = subpath {
            return self.resolve_file_or_directory(&package_dir.join(subpath));
        }

        self.resolve_directory(package_dir)
    }

    fn resolve_file_or_directory(&mut self, path: &Path) -> Option<PathBuf> {
        resolve_as_file(path).or_else(|| self.resolve_directory(path))
    }

    /// `module`, then a string `browser`, then `main`, then `index.*`.
    fn resolve_directory(&mut self, dir: &Path) -> Option<PathBuf> {
        if !dir.is_dir() {
            return None;
        }

        if let Some(pkg) = self.read_package_json(&dir.join("package.json")) {
            let browser = match &pkg.browser {
                Some(BrowserField::String(path)) => Some(path.clone()),
                _ => None,
            };

            for field in [pkg.module.clone(), browser, pkg.main.clone()].into_iter().flatten() {
                let entry = dir.join(&field);
                if let Some(resolved) = resolve_as_file(&entry).or_else(|| resolve_index(&entry)) {
                    return Some(resolved);
                }
            }
        }

        resolve_index(dir)
    }

    fn read_package_json(&mut self, path: &Path) -> Option<PackageJson> {
        if let Some(cached) = self.package_cache.get(path) {
            return Some(cached.clone());
        }

        let content = std::fs::read_to_string(path).ok()?;
        let package: PackageJson = serde_json::from_str(&content).ok()?;
        self.package_cache.insert(path.to_path_buf(), package.clone());

        Some(package)
    }

    /// Bare specifiers and anything that lands under `node_modules`.
    pub fn is_vendor(path: &Path) -> bool {
        path.components().any(|c| c.as_os_str() == "node_modules")
    }
}

fn resolve_as_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }

    let file_name = path.file_name()?.to_str()?;
    EXTENSIONS
        .iter()
        .map(|ext| path.with_file_name(format!("{}.{}", file_name, ext)))
        .find(|candidate| candidate.is_file())
}

fn resolve_index(dir: &Path) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("index.{}", ext)))
        .find(|candidate| candidate.is_file())
}

/// `@scope/pkg/sub/path` → (`@scope/pkg`, `sub/path`).
fn parse_package_specifier(specifier: &str) -> (String, Option<String>) {
    let name_segments = if specifier.starts_with('@') { 2 } else { 1 };
    let mut parts = specifier.splitn(name_segments + 1, '/');

    let name: Vec<&str> = parts.by_ref().take(name_segments).collect();
    let subpath = parts.next().filter(|s| !s.is_empty()).map(str::to_string);

    (name.join("/"), subpath)
}
