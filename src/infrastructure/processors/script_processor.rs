use crate::utils::{PipelineError, Result};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{MangleOptions, Minifier, MinifierOptions};
use oxc_parser::{Parser, ParserReturn};
use oxc_ast::ast::Program;
use oxc_semantic::{Scoping, SemanticBuilder};
use oxc_span::SourceType;
use oxc_transformer::{ArrowFunctionsOptions, HelperLoaderMode, TransformOptions, Transformer};
use oxc_transformer_plugins::{ReplaceGlobalDefines, ReplaceGlobalDefinesConfig};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A module after TypeScript/JSX stripping, before module wrapping.
#[derive(Debug, Clone)]
pub struct TransformedScript {
    pub code: String,
    pub map: Option<String>,
}

/// Thin layer over the oxc parser, transformer, minifier and code generator.
#[derive(Debug, Clone, Default)]
pub struct ScriptCompiler {
    define: BTreeMap<String, String>,
}

impl ScriptCompiler {
    pub fn new(define: BTreeMap<String, String>) -> Self {
        Self { define }
    }

    /// Strip types and JSX, keep modern syntax, replace defines.
    pub fn transform_module(&self, source: &str, path: &Path, source_map: bool) -> Result<TransformedScript> {
        let allocator = Allocator::default();
        let source_type = SourceType::from_path(path).unwrap_or_default();
        let parsed = parse_with_fallback(&allocator, source, source_type, path)?;
        let mut program = parsed.program;

        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let options = TransformOptions::default();
        let transformed = Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            return Err(PipelineError::script_diagnostics(path, &transformed.errors));
        }
        self.replace_defines(&allocator, transformed.scoping, &mut program, path)?;

        let output = Codegen::new()
            .with_options(CodegenOptions {
                source_map_path: source_map.then(|| path.to_path_buf()),
                ..CodegenOptions::default()
            })
            .build(&program);

        Ok(TransformedScript {
            code: output.code,
            map: output.map.map(|map| map.to_json_string()),
        })
    }

    /// Standalone script lowered to `target` and minified. No module wrapping.
    ///
    /// Arrow functions are lowered on top of what the target enables. Classes,
    /// block scoping and template literals have no oxc lowering and pass through.
    pub fn compile_legacy(&self, source: &str, path: &Path, target: &str) -> Result<String> {
        let allocator = Allocator::default();
        let source_type = SourceType::from_path(path).unwrap_or_default();
        let parsed = parse_with_fallback(&allocator, source, source_type, path)?;
        let mut program = parsed.program;

        let mut options = TransformOptions::from_target(target).map_err(|e| PipelineError::script(path, e))?;
        options.helper_loader.mode = HelperLoaderMode::External;
        options.env.es2015.arrow_function.get_or_insert_with(ArrowFunctionsOptions::default);

        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let transformed = Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            return Err(PipelineError::script_diagnostics(path, &transformed.errors));
        }
        self.replace_defines(&allocator, transformed.scoping, &mut program, path)?;

        // Mangle only: the compressor targets current syntax and would undo the lowering.
        let minified = Minifier::new(MinifierOptions {
            mangle: Some(MangleOptions::default()),
            compress: None,
        })
        .minify(&allocator, &mut program);
        let code = Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                ..CodegenOptions::default()
            })
            .with_scoping(minified.scoping)
            .build(&program)
            .code;

        Ok(code)
    }

    /// Minify an already bundled chunk. Chunks are classic scripts.
    pub fn minify_chunk(&self, code: &str, name: &str) -> Result<String> {
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(false);
        let parsed = Parser::new(&allocator, code, source_type).parse();
        if !parsed.errors.is_empty() {
            return Err(PipelineError::script_diagnostics(name, &parsed.errors));
        }

        let mut program = parsed.program;
        let minified = Minifier::new(MinifierOptions::default()).minify(&allocator, &mut program);

        Ok(Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                ..CodegenOptions::default()
            })
            .with_scoping(minified.scoping)
            .build(&program)
            .code)
    }

    /// Rewrites global member chains such as `process.env.NODE_ENV` in the AST.
    /// Shadowed bindings, longer names and string contents are left alone.
    fn replace_defines<'a>(
        &self,
        allocator: &'a Allocator,
        scoping: Scoping,
        program: &mut Program<'a>,
        path: &Path,
    ) -> Result<()> {
        if self.define.is_empty() {
            return Ok(());
        }

        let pairs: Vec<(&str, &str)> = self.define.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let config = ReplaceGlobalDefinesConfig::new(&pairs).map_err(|e| PipelineError::script_diagnostics(path, &e))?;
        ReplaceGlobalDefines::new(allocator, config).build(scoping, program);
        Ok(())
    }
}

/// Parse as an ES module, retrying as a classic script (old CommonJS
/// packages use sloppy-mode syntax a module parse rejects).
fn parse_with_fallback<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    source_type: SourceType,
    path: &Path,
) -> Result<ParserReturn<'a>> {
    let parsed = Parser::new(allocator, source, source_type).parse();
    if parsed.errors.is_empty() {
        return Ok(parsed);
    }

    let script = Parser::new(allocator, source, source_type.with_module(false)).parse();
    if script.errors.is_empty() {
        return Ok(script);
    }

    Err(PipelineError::script_diagnostics(PathBuf::from(path), &parsed.errors))
}
