mod cli;

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use cli::{Cli, Commands};
use rless_core::{compile_file, CompileError, CompileOptions, CompileResult, OutputStyle, Theme};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            input,
            output,
            theme,
            compress,
            verbose,
        } => {
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .init();
            }
            match build(&input, output.as_deref(), theme.as_deref(), compress) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("{}: {}", input.display(), err);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn build(
    input: &Path,
    output: Option<&Path>,
    theme: Option<&Path>,
    compress: bool,
) -> CompileResult<()> {
    let mut options = CompileOptions::default();
    if compress {
        options.output = OutputStyle::Compressed;
    }
    if let Some(path) = theme {
        options.theme = Theme::load(path)?;
    }

    let css = compile_file(input, &options)?;

    match output {
        Some(path) => fs::write(path, css).map_err(|e| CompileError::Io {
            message: format!("failed to write {}: {}", path.display(), e),
        })?,
        None => print!("{}", css),
    }
    Ok(())
}
