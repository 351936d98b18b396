use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rless")]
#[command(about = "LESS-subset stylesheet compiler")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a stylesheet to CSS.
    Build {
        input: PathBuf,
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// JSON file of external variable bindings.
        #[arg(long)]
        theme: Option<PathBuf>,
        /// Emit compressed CSS instead of expanded.
        #[arg(long)]
        compress: bool,
        /// Log pipeline stages to stderr.
        #[arg(short, long)]
        verbose: bool,
    },
}
