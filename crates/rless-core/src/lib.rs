//! LESS-subset compiler for theme override stylesheets.
//!
//! The pipeline: [`loader`] inlines `@import`s, [`parser`] builds the AST,
//! [`resolver`] substitutes variables and flattens nesting, [`emitter`]
//! prints plain CSS. [`compile`] runs the last three stages on a string;
//! [`compile_file`] runs all four on a file.

pub mod ast;
pub mod color;
pub mod emitter;
pub mod error;
pub mod loader;
pub mod parser;
pub mod resolver;
pub mod theme;

pub use emitter::OutputStyle;
pub use error::{CompileError, CompileResult};
pub use theme::Theme;

use std::path::Path;

/// Settings for one compile invocation.
#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    pub output: OutputStyle,
    pub theme: Theme,
}

/// Compile stylesheet text to CSS. Pure: the same input and options always
/// produce the same output.
pub fn compile(source: &str, options: &CompileOptions) -> CompileResult<String> {
    let stylesheet = parser::parse(source)?;
    let nodes = resolver::resolve(&stylesheet, &options.theme)?;
    Ok(emitter::emit_css(&nodes, options.output))
}

/// Compile a stylesheet file, inlining its imports first.
pub fn compile_file(path: &Path, options: &CompileOptions) -> CompileResult<String> {
    let source = loader::load_with_imports(path)?;
    compile(&source, options)
}
