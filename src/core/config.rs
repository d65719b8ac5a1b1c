use crate::core::interfaces::ExtractorSet;
use crate::core::models::{BuildProfile, CopyDescriptor, EntryDescriptor};
use crate::infrastructure::purge::{ClassListExtractor, DefaultExtractor, HtmlExtractor};
use crate::utils::{EnvSource, ModuleAliasResolver, Result};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const SCRIPT_ENTRY: &str = "src/js/app.js";
pub const STYLE_GROUPS: [&str; 2] = ["app", "vendor"];
pub const STYLE_DIR: &str = "src/scss";
pub const DARK_SUFFIX: &str = "-dark";

pub const LEGACY_SCRIPT: &str = "src/js/inline.js";
pub const LEGACY_SCRIPT_OUTPUT: &str = "static/build/inline.js";
pub const LEGACY_TARGET: &str = "es2015";

pub const ICON_SPRITE: &str = "src/images/icons-sprite.svg";

pub const PRODUCTION_PUBLIC_PATH: &str = "static/build";
pub const PRODUCTION_RESOURCE_ROOT: &str = "/build";
pub const PRODUCTION_MANIFEST_NAME: &str = "../../data/manifest.json";

pub const DEVELOPMENT_PUBLIC_PATH: &str = "dev";
pub const DEVELOPMENT_RESOURCE_ROOT: &str = "";
pub const DEFAULT_MANIFEST_NAME: &str = "mix-manifest.json";

pub const CONTENT_GLOBS: [&str; 2] = ["layouts/**/*.html", "src/**/*.{js,ts,jsx,tsx}"];

/// Selectors toggled at runtime by scripts; static scanning can never prove them.
pub const SAFELIST: [&str; 11] = [
    "is-online",
    "has-audio",
    "post-podcast-content",
    "fa-step-forward",
    "sidebar-open",
    "comments-counter-avatars-item",
    "loaded",
    "highlight",
    "language-",
    "code",
    "pre",
];

pub const DEFAULT_DEV_HOST: &str = "localhost";
pub const DEFAULT_DEV_PORT: u16 = 3000;
pub const DEFAULT_HUGO_PORT: u16 = 1313;

pub const LIVERELOAD_PATH: &str = "/__sitepipe/livereload";
pub const CLIENT_SCRIPT_PATH: &str = "/__sitepipe/client.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    None,
    Inline,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurgeConfig {
    pub content: Vec<String>,
    #[serde(serialize_with = "serialize_patterns")]
    pub safelist: Vec<Regex>,
    #[serde(serialize_with = "serialize_extractors")]
    pub extractors: ExtractorSet,
}

impl PurgeConfig {
    pub fn is_safelisted(&self, selector: &str) -> bool {
        self.safelist.iter().any(|re| re.is_match(selector))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputLayout {
    pub public_path: PathBuf,
    pub resource_root: String,
    pub manifest_path: PathBuf,
}

/// Script compiled outside the bundle graph with a syntax-lowering transform.
#[derive(Debug, Clone, Serialize)]
pub struct LegacyScript {
    pub source: PathBuf,
    pub output: PathBuf,
    pub target: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionSettings {
    pub legacy_script: LegacyScript,
    pub sprite: CopyDescriptor,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyTarget {
    pub host: String,
    pub port: u16,
}

impl ProxyTarget {
    pub fn origin(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where the live-reload snippet goes in proxied HTML.
#[derive(Debug, Clone, Serialize)]
pub struct SnippetRule {
    #[serde(serialize_with = "serialize_pattern")]
    pub pattern: Regex,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dirs: Vec<PathBuf>,
    pub proxy: ProxyTarget,
    pub websockets: bool,
    pub watch_files: Vec<String>,
    pub ignore: Vec<String>,
    pub ghost_mode: bool,
    pub open_browser: bool,
    pub snippet: SnippetRule,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn origin(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DevelopmentSettings {
    pub sprite: CopyDescriptor,
    pub server: ServerConfig,
    /// Source directories whose changes trigger a rebuild.
    pub rebuild_on: Vec<PathBuf>,
}

/// Exactly one branch exists per configuration, so exactly one can run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "profile", rename_all = "lowercase")]
pub enum ProfileBranch {
    Production(ProductionSettings),
    Development(DevelopmentSettings),
}

/// Everything the pipeline needs, built once at start-up and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub root: PathBuf,
    pub profile: BuildProfile,
    pub entries: Vec<EntryDescriptor>,
    pub aliases: ModuleAliasResolver,
    pub purge: PurgeConfig,
    pub output: OutputLayout,
    pub extract_vendor: bool,
    pub source_maps: SourceMapMode,
    pub minify: bool,
    pub define: BTreeMap<String, String>,
    pub analyze: bool,
    pub branch: ProfileBranch,
}

impl PipelineConfig {
    pub fn new(root: impl Into<PathBuf>, profile: BuildProfile, env: &EnvSource) -> Result<Self> {
        let root = root.into();
        let production = profile.is_production();

        let public_path = PathBuf::from(if production {
            PRODUCTION_PUBLIC_PATH
        } else {
            DEVELOPMENT_PUBLIC_PATH
        });

        let manifest_name = if production {
            PRODUCTION_MANIFEST_NAME
        } else {
            DEFAULT_MANIFEST_NAME
        };
        let manifest_path = path_clean::clean(public_path.join(manifest_name));

        let output = OutputLayout {
            public_path: public_path.clone(),
            resource_root: if production {
                PRODUCTION_RESOURCE_ROOT
            } else {
                DEVELOPMENT_RESOURCE_ROOT
            }
            .to_string(),
            manifest_path,
        };

        let branch = if production {
            ProfileBranch::Production(ProductionSettings {
                legacy_script: LegacyScript {
                    source: PathBuf::from(LEGACY_SCRIPT),
                    output: PathBuf::from(LEGACY_SCRIPT_OUTPUT),
                    target: LEGACY_TARGET.to_string(),
                },
                sprite: CopyDescriptor::new(
                    ICON_SPRITE,
                    public_path.join("images/icons-sprite.svg"),
                ),
            })
        } else {
            ProfileBranch::Development(DevelopmentSettings {
                sprite: CopyDescriptor::new(
                    ICON_SPRITE,
                    public_path.join("build/images/icons-sprite.svg"),
                ),
                server: server_config(env, &public_path)?,
                rebuild_on: vec![PathBuf::from("src"), PathBuf::from("layouts")],
            })
        };

        let mut define = BTreeMap::new();
        define.insert(
            "process.env.NODE_ENV".to_string(),
            format!("\"{}\"", profile.as_str()),
        );

        Ok(Self {
            root,
            profile,
            entries: declare_entries(),
            aliases: ModuleAliasResolver::new([
                ("react", "preact/compat"),
                ("react-dom", "preact/compat"),
            ]),
            purge: purge_config()?,
            output,
            extract_vendor: production,
            source_maps: if production {
                SourceMapMode::None
            } else {
                SourceMapMode::Inline
            },
            minify: production,
            define,
            analyze: env.is_set("ANALYZE"),
            branch,
        })
    }

    /// Absolute (root-joined) form of a project-relative path.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn public_dir(&self) -> PathBuf {
        self.resolve(&self.output.public_path)
    }

    pub fn manifest_file(&self) -> PathBuf {
        self.resolve(&self.output.manifest_path)
    }

    pub fn inline_source_maps(&self) -> bool {
        self.source_maps == SourceMapMode::Inline
    }
}

/// One script unit, then a base and a dark variant for each style group.
pub fn declare_entries() -> Vec<EntryDescriptor> {
    let mut entries = vec![EntryDescriptor::script(SCRIPT_ENTRY, "app.js")];

    for group in STYLE_GROUPS {
        for variant in [group.to_string(), format!("{}{}", group, DARK_SUFFIX)] {
            entries.push(EntryDescriptor::style(
                format!("{}/{}.scss", STYLE_DIR, variant),
                format!("{}.css", variant),
            ));
        }
    }

    entries
}

fn purge_config() -> Result<PurgeConfig> {
    let safelist = SAFELIST
        .iter()
        .map(|p| Regex::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let extractors = ExtractorSet::new()
        .register(&["html"], Arc::new(HtmlExtractor))
        .register(&["js"], Arc::new(ClassListExtractor))
        .with_fallback(Arc::new(DefaultExtractor));

    Ok(PurgeConfig {
        content: CONTENT_GLOBS.iter().map(|g| g.to_string()).collect(),
        safelist,
        extractors,
    })
}

fn server_config(env: &EnvSource, public_path: &Path) -> Result<ServerConfig> {
    let snippet = format!(r#"<script async src="{}"></script>"#, CLIENT_SCRIPT_PATH);

    Ok(ServerConfig {
        host: env.get_or("DEV_HOST", DEFAULT_DEV_HOST).to_string(),
        port: env.port_or("DEV_PORT", DEFAULT_DEV_PORT)?,
        static_dirs: vec![public_path.to_path_buf()],
        proxy: ProxyTarget {
            host: "localhost".to_string(),
            port: env.port_or("HUGO_PORT", DEFAULT_HUGO_PORT)?,
        },
        websockets: true,
        watch_files: vec![
            format!("{}/*.css", public_path.display()),
            format!("{}/app.js", public_path.display()),
        ],
        ignore: vec![DEFAULT_MANIFEST_NAME.to_string()],
        ghost_mode: false,
        open_browser: false,
        snippet: SnippetRule {
            pattern: Regex::new(r"(?i)</head>")?,
            snippet,
        },
    })
}

fn serialize_pattern<S: Serializer>(re: &Regex, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(re.as_str())
}

fn serialize_patterns<S: Serializer>(
    patterns: &[Regex],
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.collect_seq(patterns.iter().map(|re| re.as_str()))
}

fn serialize_extractors<S: Serializer>(
    extractors: &ExtractorSet,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.collect_map(extractors.describe())
}
