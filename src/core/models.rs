use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Script,
    Style,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Script => "script",
            AssetKind::Style => "style",
        }
    }
}

/// One compilation unit: a source entry and the artifact it produces.
///
/// `output` is relative to the public path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryDescriptor {
    pub source: PathBuf,
    pub output: PathBuf,
    pub kind: AssetKind,
}

impl EntryDescriptor {
    pub fn script(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            kind: AssetKind::Script,
        }
    }

    pub fn style(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            kind: AssetKind::Style,
        }
    }

    pub fn display_name(&self) -> String {
        self.output.display().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildProfile {
    Development,
    Production,
}

impl BuildProfile {
    /// Production when asked for explicitly or when `NODE_ENV=production`.
    pub fn detect(production_flag: bool, node_env: Option<&str>) -> Self {
        if production_flag || node_env == Some("production") {
            BuildProfile::Production
        } else {
            BuildProfile::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, BuildProfile::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildProfile::Development => "development",
            BuildProfile::Production => "production",
        }
    }
}

/// Verbatim file copy, both paths relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyDescriptor {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl CopyDescriptor {
    pub fn new(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Tokens that scanned content proves to be in use.
///
/// `undetermined` tokens come from extractors that cannot tell a class from an
/// id or a tag; they satisfy any selector kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsedTokens {
    pub classes: BTreeSet<String>,
    pub ids: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub attr_names: BTreeSet<String>,
    pub attr_values: BTreeSet<String>,
    pub undetermined: BTreeSet<String>,
}

impl UsedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classes<I: IntoIterator<Item = S>, S: Into<String>>(classes: I) -> Self {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn merge(&mut self, other: UsedTokens) {
        self.classes.extend(other.classes);
        self.ids.extend(other.ids);
        self.tags.extend(other.tags);
        self.attr_names.extend(other.attr_names);
        self.attr_values.extend(other.attr_values);
        self.undetermined.extend(other.undetermined);
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
            && self.ids.is_empty()
            && self.tags.is_empty()
            && self.attr_names.is_empty()
            && self.attr_values.is_empty()
            && self.undetermined.is_empty()
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains(name) || self.undetermined.contains(name)
    }

    pub fn has_id(&self, name: &str) -> bool {
        self.ids.contains(name) || self.undetermined.contains(name)
    }

    pub fn has_tag(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.tags.contains(&lower) || self.undetermined.contains(name)
    }

    pub fn has_attribute(&self, name: &str, value: Option<&str>) -> bool {
        let name_known = self.attr_names.contains(name) || self.undetermined.contains(name);
        match value {
            None => name_known,
            Some(value) => {
                name_known
                    && (self.attr_values.contains(value) || self.undetermined.contains(value))
            }
        }
    }
}

/// A compiled artifact before it is written, path relative to the public path.
#[derive(Debug, Clone)]
pub struct CompiledAsset {
    pub output: PathBuf,
    pub kind: AssetKind,
    pub code: String,
    pub modules: Vec<ModuleStat>,
}

impl CompiledAsset {
    pub fn new(output: impl Into<PathBuf>, kind: AssetKind, code: String) -> Self {
        Self {
            output: output.into(),
            kind,
            code,
            modules: Vec::new(),
        }
    }
}

/// Size contribution of one bundled module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStat {
    pub id: String,
    pub chunk: String,
    pub size: usize,
    pub gzip_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeStats {
    pub output: String,
    pub kept: usize,
    pub removed: usize,
}

#[derive(Debug, Clone)]
pub struct OutputFile {
    pub path: PathBuf,
    pub size: usize,
}

impl OutputFile {
    pub fn new(path: &Path, size: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            size,
        }
    }
}

#[derive(Debug, Default)]
pub struct BuildResult {
    pub output_files: Vec<OutputFile>,
    pub modules: Vec<ModuleStat>,
    pub purge_stats: Vec<PurgeStats>,
    pub build_time: std::time::Duration,
}
