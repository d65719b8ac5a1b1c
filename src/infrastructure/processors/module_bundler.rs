use crate::core::config::PipelineConfig;
use crate::core::interfaces::ScriptBundler;
use crate::core::models::{AssetKind, CompiledAsset, EntryDescriptor, ModuleStat};
use crate::infrastructure::node_resolver::NodeModuleResolver;
use crate::infrastructure::processors::common::{inline_source_map_comment, slash_path};
use crate::infrastructure::processors::script_processor::ScriptCompiler;
use crate::utils::{gzip_size, Logger, PipelineError, Result, Timer};
use once_cell::sync::Lazy;
use oxc_allocator::Allocator;
use oxc_ast::ast::{ExportDefaultDeclarationKind, ImportDeclarationSpecifier, Statement};
use oxc_ast::syntax_directed_operations::BoundNames;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use regex::{Captures, Regex};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// Module registry shared by every chunk. Loaded once, first.
pub const RUNTIME: &str = r#"(function (global) {
  if (global.__sitepipe) return;
  var definitions = {};
  var cache = {};
  var helpers = {
    esm: function (exports) {
      Object.defineProperty(exports, "__esModule", { value: true });
    },
    export: function (exports, getters) {
      for (var name in getters) {
        Object.defineProperty(exports, name, { enumerable: true, get: getters[name] });
      }
    },
    reexport: function (exports, source) {
      Object.keys(source).forEach(function (name) {
        if (name === "default" || name === "__esModule" || Object.prototype.hasOwnProperty.call(exports, name)) return;
        Object.defineProperty(exports, name, { enumerable: true, get: function () { return source[name]; } });
      });
    },
    interop: function (m) {
      return m && m.__esModule ? m : { default: m };
    },
    namespace: function (m) {
      if (m && m.__esModule) return m;
      var ns = { default: m };
      if (m && typeof m === "object") {
        Object.keys(m).forEach(function (name) { if (name !== "default") ns[name] = m[name]; });
      }
      return ns;
    }
  };
  function load(id) {
    if (cache[id]) return cache[id].exports;
    var definition = definitions[id];
    if (!definition) throw new Error("sitepipe: module " + id + " is not defined");
    var module = (cache[id] = { id: id, exports: {} });
    definition.factory.call(module.exports, module, module.exports, function (request) {
      var target = definition.deps[request];
      if (target === undefined) throw new Error("sitepipe: cannot find '" + request + "' from " + id);
      return load(target);
    }, helpers);
    return module.exports;
  }
  global.__sitepipe = {
    define: function (id, deps, factory) {
      definitions[id] = { deps: deps, factory: factory };
    },
    run: load
  };
})(typeof self !== "undefined" ? self : this);
"#;

static REQUIRE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\brequire\(\s*(?:"([^"]+)"|'([^']+)')\s*\)"#).expect("require pattern compiles")
});
static DYNAMIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\(\s*(?:"([^"]+)"|'([^']+)')\s*\)"#).expect("import pattern compiles")
});

/// A module body with ESM syntax rewritten to registry calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleBody {
    /// Export getters, emitted on the wrapper line so body lines keep their numbers.
    pub prologue: String,
    pub code: String,
}

/// Rewrite top-level `import`/`export` statements into `require` calls and
/// export getters. Every replacement keeps the line count of the text it
/// replaces. Imported bindings are read once, when the import runs.
pub fn rewrite_module_syntax(code: &str) -> ModuleBody {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, code, SourceType::default()).parse();
    if !parsed.errors.is_empty() {
        // Not a module (sloppy CommonJS); nothing to rewrite.
        return ModuleBody {
            prologue: String::new(),
            code: code.to_string(),
        };
    }

    let mut edits: Vec<(Span, String)> = Vec::new();
    let mut exports: Vec<(String, String)> = Vec::new();
    let mut is_esm = false;
    let mut counter = 0usize;
    let mut next_var = || {
        counter += 1;
        format!("__sp_m{}", counter)
    };

    for statement in &parsed.program.body {
        match statement {
            Statement::ImportDeclaration(decl) => {
                is_esm = true;
                let request = js_string(decl.source.value.as_str());

                let replacement = match &decl.specifiers {
                    Some(specifiers) if !specifiers.is_empty() => {
                        let module_var = next_var();
                        let mut out = format!("var {} = require({});", module_var, request);
                        for specifier in specifiers {
                            let binding = match specifier {
                                ImportDeclarationSpecifier::ImportSpecifier(s) => format!(
                                    "{}[{}]",
                                    module_var,
                                    js_string(s.imported.name().as_str())
                                ),
                                ImportDeclarationSpecifier::ImportDefaultSpecifier(_) => {
                                    format!("__sp.interop({}).default", module_var)
                                }
                                ImportDeclarationSpecifier::ImportNamespaceSpecifier(_) => {
                                    format!("__sp.namespace({})", module_var)
                                }
                            };
                            out.push_str(&format!(" var {} = {};", specifier.local().name, binding));
                        }
                        out
                    }
                    _ => format!("require({});", request),
                };
                edits.push((decl.span, replacement));
            }
            Statement::ExportNamedDeclaration(decl) => {
                is_esm = true;
                if let Some(declaration) = &decl.declaration {
                    edits.push((Span::new(decl.span.start, declaration.span().start), String::new()));
                    declaration.bound_names(&mut |ident| {
                        exports.push((ident.name.to_string(), ident.name.to_string()));
                    });
                } else if let Some(source) = &decl.source {
                    let module_var = next_var();
                    edits.push((
                        decl.span,
                        format!("var {} = require({});", module_var, js_string(source.value.as_str())),
                    ));
                    for specifier in &decl.specifiers {
                        exports.push((
                            specifier.exported.name().to_string(),
                            format!("{}[{}]", module_var, js_string(specifier.local.name().as_str())),
                        ));
                    }
                } else {
                    edits.push((decl.span, String::new()));
                    for specifier in &decl.specifiers {
                        exports.push((
                            specifier.exported.name().to_string(),
                            specifier.local.name().to_string(),
                        ));
                    }
                }
            }
            Statement::ExportDefaultDeclaration(decl) => {
                is_esm = true;
                let named = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(f) => {
                        f.id.as_ref().map(|id| id.name.to_string())
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(c) => {
                        c.id.as_ref().map(|id| id.name.to_string())
                    }
                    _ => None,
                };
                let inner_start = decl.declaration.span().start;

                match named {
                    Some(name) => {
                        edits.push((Span::new(decl.span.start, inner_start), String::new()));
                        exports.push(("default".to_string(), name));
                    }
                    None => {
                        edits.push((
                            Span::new(decl.span.start, inner_start),
                            "var __sp_default = ".to_string(),
                        ));
                        edits.push((Span::new(decl.span.end, decl.span.end), ";".to_string()));
                        exports.push(("default".to_string(), "__sp_default".to_string()));
                    }
                }
            }
            Statement::ExportAllDeclaration(decl) => {
                is_esm = true;
                let request = js_string(decl.source.value.as_str());
                match &decl.exported {
                    Some(name) => {
                        let module_var = next_var();
                        edits.push((decl.span, format!("var {} = require({});", module_var, request)));
                        exports.push((name.name().to_string(), format!("__sp.namespace({})", module_var)));
                    }
                    None => {
                        edits.push((decl.span, format!("__sp.reexport(exports, require({}));", request)));
                    }
                }
            }
            _ => {}
        }
    }

    let mut prologue = String::new();
    if is_esm {
        prologue.push_str(" __sp.esm(exports);");
    }
    if !exports.is_empty() {
        let getters = exports
            .iter()
            .map(|(name, expr)| format!("{}: function () {{ return {}; }}", js_string(name), expr))
            .collect::<Vec<_>>()
            .join(", ");
        prologue.push_str(&format!(" __sp.export(exports, {{ {} }});", getters));
    }

    ModuleBody {
        prologue,
        code: apply_edits(code, edits),
    }
}

fn apply_edits(code: &str, mut edits: Vec<(Span, String)>) -> String {
    edits.sort_by_key(|(span, _)| (span.start, span.end));

    let mut out = String::with_capacity(code.len());
    let mut cursor = 0usize;
    for (span, replacement) in edits {
        let (start, end) = (span.start as usize, span.end as usize);
        if start < cursor {
            continue;
        }
        out.push_str(&code[cursor..start]);
        out.push_str(&replacement);
        let replaced_lines = code[start..end].matches('\n').count();
        out.push_str(&"\n".repeat(replaced_lines.saturating_sub(replacement.matches('\n').count())));
        cursor = end;
    }
    out.push_str(&code[cursor..]);
    out
}

fn js_string(value: &str) -> String {
    Value::from(value).to_string()
}

/// Static `require('x')` requests in order of appearance, deduplicated.
pub fn find_requires(code: &str) -> Vec<String> {
    let mut requests: Vec<String> = Vec::new();
    for caps in REQUIRE_CALL.captures_iter(code) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            let request = m.as_str().to_string();
            if !requests.contains(&request) {
                requests.push(request);
            }
        }
    }
    requests
}

/// `import('x')` becomes a promise of the bundled module's namespace.
fn rewrite_dynamic_imports(code: &str) -> String {
    DYNAMIC_IMPORT
        .replace_all(code, |caps: &Captures| {
            let request = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or_default();
            format!(
                "Promise.resolve().then(function () {{ return __sp.namespace(require({})); }})",
                js_string(request)
            )
        })
        .into_owned()
}

#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub id: String,
    pub path: PathBuf,
    pub vendor: bool,
    pub body: ModuleBody,
    pub map: Option<String>,
    pub deps: BTreeMap<String, String>,
}

/// Walks the import graph from one entry and wraps every module into the
/// registry format. Production splits the runtime, `node_modules` code and
/// first-party code into separate chunks.
pub struct ModuleGraphBundler;

impl ModuleGraphBundler {
    pub fn new() -> Self {
        Self
    }

    pub fn build_graph(&self, entry: &Path, config: &PipelineConfig) -> Result<Vec<ModuleRecord>> {
        let compiler = ScriptCompiler::new(config.define.clone());
        let mut resolver = NodeModuleResolver::new(&config.root, config.aliases.clone());

        let mut ids: HashMap<PathBuf, String> = HashMap::new();
        let mut queue = VecDeque::new();
        let mut records = Vec::new();

        let entry = path_clean::clean(entry);
        ids.insert(entry.clone(), module_id(&config.root, &entry));
        queue.push_back(entry);

        while let Some(path) = queue.pop_front() {
            let vendor = NodeModuleResolver::is_vendor(&path);
            let (body, map) = self.load_module(&compiler, &path, config)?;

            let mut deps = BTreeMap::new();
            for request in find_requires(&body.code) {
                match resolver.resolve(&request, &path) {
                    Ok(resolved) => {
                        let id = ids
                            .entry(resolved.clone())
                            .or_insert_with(|| {
                                queue.push_back(resolved.clone());
                                module_id(&config.root, &resolved)
                            })
                            .clone();
                        deps.insert(request, id);
                    }
                    // Optional requires inside packages are common; they throw at runtime if reached.
                    Err(e) if vendor => Logger::debug(&format!("Skipping unresolved vendor require: {}", e)),
                    Err(e) => return Err(e),
                }
            }

            records.push(ModuleRecord {
                id: ids.get(&path).cloned().unwrap_or_else(|| module_id(&config.root, &path)),
                path,
                vendor,
                body,
                map,
                deps,
            });
        }

        Ok(records)
    }

    fn load_module(
        &self,
        compiler: &ScriptCompiler,
        path: &Path,
        config: &PipelineConfig,
    ) -> Result<(ModuleBody, Option<String>)> {
        Logger::compiling(AssetKind::Script.as_str(), path);
        let source = std::fs::read_to_string(path).map_err(PipelineError::Io)?;

        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            let body = ModuleBody {
                prologue: String::new(),
                code: format!("module.exports = {};", source.trim()),
            };
            return Ok((body, None));
        }

        let transformed = compiler.transform_module(&source, path, config.inline_source_maps())?;
        let code = rewrite_dynamic_imports(&transformed.code);

        Ok((rewrite_module_syntax(&code), transformed.map))
    }

    fn emit(
        &self,
        entry: &EntryDescriptor,
        config: &PipelineConfig,
        records: &[ModuleRecord],
    ) -> Result<Vec<CompiledAsset>> {
        let entry_id = records
            .first()
            .map(|r| r.id.clone())
            .ok_or_else(|| PipelineError::script(&entry.source, "empty module graph"))?;
        let run = format!("__sitepipe.run({});\n", js_string(&entry_id));
        let app_name = entry.output.clone();

        let mut chunks: Vec<(PathBuf, ChunkWriter)> = Vec::new();

        if config.extract_vendor {
            let mut manifest = ChunkWriter::new();
            manifest.push_raw(RUNTIME);

            let mut vendor = ChunkWriter::new();
            let mut app = ChunkWriter::new();
            for record in records {
                if record.vendor {
                    vendor.push_module(record)?;
                } else {
                    app.push_module(record)?;
                }
            }
            app.push_raw(&run);

            chunks.push((app_name.with_file_name("manifest.js"), manifest));
            chunks.push((app_name.with_file_name("vendor.js"), vendor));
            chunks.push((app_name, app));
        } else {
            let mut app = ChunkWriter::new();
            app.push_raw(RUNTIME);
            for record in records {
                app.push_module(record)?;
            }
            app.push_raw(&run);
            chunks.push((app_name, app));
        }

        let compiler = ScriptCompiler::new(config.define.clone());
        let mut assets = Vec::new();
        for (output, chunk) in chunks {
            let chunk_name = slash_path(&output);
            let mut code = if config.minify {
                compiler.minify_chunk(&chunk.code, &chunk_name)?
            } else {
                chunk.code.clone()
            };

            if config.inline_source_maps() && !chunk.sections.is_empty() {
                let index = json!({
                    "version": 3,
                    "file": chunk_name,
                    "sections": chunk.sections,
                });
                code.push_str(&inline_source_map_comment(&index.to_string(), false));
                code.push('\n');
            }

            let mut asset = CompiledAsset::new(&output, AssetKind::Script, code);
            asset.modules = chunk
                .modules
                .iter()
                .map(|(id, size, gzip_size)| ModuleStat {
                    id: id.clone(),
                    chunk: chunk_name.clone(),
                    size: *size,
                    gzip_size: *gzip_size,
                })
                .collect();
            assets.push(asset);
        }

        Ok(assets)
    }
}

impl Default for ModuleGraphBundler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ScriptBundler for ModuleGraphBundler {
    async fn bundle(&self, entry: &EntryDescriptor, config: &PipelineConfig) -> Result<Vec<CompiledAsset>> {
        let _timer = Timer::start(&format!("Bundling {}", entry.display_name()));
        let entry = entry.clone();
        let config = config.clone();

        // oxc allocators are not Send; keep the whole pass on one blocking thread.
        tokio::task::spawn_blocking(move || {
            let bundler = ModuleGraphBundler::new();
            let records = bundler.build_graph(&config.resolve(&entry.source), &config)?;
            Logger::debug(&format!("📦 {} modules in graph of {}", records.len(), entry.display_name()));
            bundler.emit(&entry, &config, &records)
        })
        .await
        .map_err(|e| PipelineError::script(PathBuf::from("bundle"), format!("bundling task failed: {}", e)))?
    }
}

/// Accumulates chunk text and the source-map sections of its modules.
struct ChunkWriter {
    code: String,
    line: usize,
    sections: Vec<Value>,
    modules: Vec<(String, usize, usize)>,
}

impl ChunkWriter {
    fn new() -> Self {
        Self {
            code: String::new(),
            line: 0,
            sections: Vec::new(),
            modules: Vec::new(),
        }
    }

    fn push_raw(&mut self, text: &str) {
        self.line += text.matches('\n').count();
        self.code.push_str(text);
    }

    fn push_module(&mut self, record: &ModuleRecord) -> Result<()> {
        let deps = serde_json::to_string(&record.deps)
            .map_err(|e| PipelineError::script(&record.path, e))?;

        self.push_raw(&format!(
            "__sitepipe.define({}, {}, function (module, exports, require, __sp) {{{}\n",
            js_string(&record.id),
            deps,
            record.body.prologue
        ));

        if let Some(map) = &record.map {
            let map: Value = serde_json::from_str(map).map_err(|e| PipelineError::script(&record.path, e))?;
            self.sections.push(json!({
                "offset": { "line": self.line, "column": 0 },
                "map": map,
            }));
        }

        self.push_raw(&record.body.code);
        if !record.body.code.ends_with('\n') {
            self.push_raw("\n");
        }
        self.push_raw("});\n");

        self.modules.push((
            record.id.clone(),
            record.body.code.len(),
            gzip_size(record.body.code.as_bytes()),
        ));
        Ok(())
    }
}

fn module_id(root: &Path, path: &Path) -> String {
    slash_path(path.strip_prefix(root).unwrap_or(path))
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn test_rewrite_imports() {
        let body = rewrite_module_syntax(
            "import a, { b as c } from \"./a.js\";\nimport * as ns from \"ns\";\nimport \"./side.js\";\nc(a, ns);\n",
        );

        assert!(body.code.contains("var __sp_m1 = require(\"./a.js\"); var a = __sp.interop(__sp_m1).default; var c = __sp_m1[\"b\"];"));
        assert!(body.code.contains("var ns = __sp.namespace(__sp_m2);"));
        assert!(body.code.contains("require(\"./side.js\");"));
        assert_eq!(body.code.lines().count(), 4);
        assert_eq!(body.prologue, " __sp.esm(exports);");
    }

    #[test]
    fn test_rewrite_exports() {
        let body = rewrite_module_syntax(
            "export const x = 1, y = 2;\nexport function f() {}\nconst z = 3;\nexport { z as zed };\nexport default class Widget {}\nexport * from \"./more.js\";\n",
        );

        assert!(body.code.contains("const x = 1, y = 2;"));
        assert!(body.code.contains("\nfunction f() {}"));
        assert!(!body.code.contains("export "));
        assert!(body.code.contains("class Widget {}"));
        assert!(body.code.contains("__sp.reexport(exports, require(\"./more.js\"));"));
        assert!(body.prologue.contains("\"x\": function () { return x; }"));
        assert!(body.prologue.contains("\"zed\": function () { return z; }"));
        assert!(body.prologue.contains("\"default\": function () { return Widget; }"));
    }

    #[test]
    fn test_anonymous_default_export() {
        let body = rewrite_module_syntax("export default function () { return 1; }\n");

        assert!(body.code.starts_with("var __sp_default = function () { return 1; }"));
        assert!(body.prologue.contains("\"default\": function () { return __sp_default; }"));
    }

    #[test]
    fn test_commonjs_is_left_alone() {
        let source = "var dep = require('./dep');\nmodule.exports = function () { return dep; };\n";
        let body = rewrite_module_syntax(source);

        assert_eq!(body.code, source);
        assert!(body.prologue.is_empty());
        assert_eq!(find_requires(source), vec!["./dep".to_string()]);
    }

    #[test]
    fn test_dynamic_import_becomes_require() {
        let code = rewrite_dynamic_imports("const m = import('./lazy.js');");
        assert!(code.contains("__sp.namespace(require(\"./lazy.js\"))"));
        assert_eq!(find_requires(&code), vec!["./lazy.js".to_string()]);
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "src/js/app.js",
            "import { h, render } from 'react';\nimport { greet } from './greet';\nrender(h('p', null, greet('site')), document.body);\n",
        );
        write(
            dir.path(),
            "src/js/greet.ts",
            "export function greet(name: string): string { return `hi ${name}`; }\n",
        );
        write(
            dir.path(),
            "node_modules/preact/package.json",
            r#"{"name":"preact","module":"dist/preact.mjs"}"#,
        );
        write(dir.path(), "node_modules/preact/dist/preact.mjs", "export function h() {}\nexport function render() {}\n");
        write(dir.path(), "node_modules/preact/compat/package.json", r#"{"main":"index.js"}"#);
        write(dir.path(), "node_modules/preact/compat/index.js", "export * from 'preact';\n");
        dir
    }

    #[tokio::test]
    async fn test_production_bundle_splits_chunks() {
        let dir = fixture();
        let config = PipelineConfig::new(dir.path(), BuildProfile::Production, &EnvSource::new()).unwrap();
        let entry = EntryDescriptor::script("src/js/app.js", "app.js");

        let assets = ModuleGraphBundler::new().bundle(&entry, &config).await.unwrap();
        let names: Vec<String> = assets.iter().map(|a| a.output.display().to_string()).collect();
        assert_eq!(names, vec!["manifest.js", "vendor.js", "app.js"]);

        let vendor = &assets[1];
        let app = &assets[2];
        assert!(assets[0].code.contains("__sitepipe"));
        assert!(vendor.modules.iter().all(|m| m.id.starts_with("node_modules/")));
        assert_eq!(vendor.modules.len(), 2);
        assert_eq!(
            app.modules.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            vec!["src/js/app.js", "src/js/greet.ts"]
        );
        assert!(app.code.contains("src/js/app.js"));
        assert!(!app.code.contains("sourceMappingURL"));
    }

    #[tokio::test]
    async fn test_development_bundle_is_single_chunk_with_map() {
        let dir = fixture();
        let config = PipelineConfig::new(dir.path(), BuildProfile::Development, &EnvSource::new()).unwrap();
        let entry = EntryDescriptor::script("src/js/app.js", "app.js");

        let assets = ModuleGraphBundler::new().bundle(&entry, &config).await.unwrap();
        assert_eq!(assets.len(), 1);

        let app = &assets[0];
        assert!(app.code.starts_with("(function (global) {"));
        assert!(app.code.contains("__sitepipe.run(\"src/js/app.js\");"));
        assert!(app.code.contains("//# sourceMappingURL=data:application/json"));
        assert_eq!(app.modules.len(), 4);
    }

    #[tokio::test]
    async fn test_unresolved_first_party_import_fails() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/js/app.js", "import './missing';\n");
        let config = PipelineConfig::new(dir.path(), BuildProfile::Production, &EnvSource::new()).unwrap();
        let entry = EntryDescriptor::script("src/js/app.js", "app.js");

        let err = ModuleGraphBundler::new().bundle(&entry, &config).await.unwrap_err();
        assert!(matches!(err, PipelineError::Resolve { .. }));
    }
}
