pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use self::commands::{build, format, sema, syntax};

#[derive(Parser)]
#[command(name = "swgc")]
#[command(about = "swg language compiler frontend", version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
pub struct CommonArgs {
    /// Input files or directories (directories are walked for *.swg /
    /// *.swgs).
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Worker threads (defaults to the available parallelism)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Disable in-source expected-error / swc-option directives
    #[arg(long, default_value_t = false)]
    pub no_verify: bool,

    /// Emit diagnostics as JSON to stdout
    #[arg(long, default_value_t = false)]
    pub errors_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse only, then check verify directives
    Syntax {
        #[command(flatten)]
        args: CommonArgs,
    },

    /// Parse only
    Format {
        #[command(flatten)]
        args: CommonArgs,
    },

    /// Parse and run full semantic analysis
    Sema {
        #[command(flatten)]
        args: CommonArgs,
    },

    /// Full pipeline through code generation scheduling
    Build {
        #[command(flatten)]
        args: CommonArgs,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let exit = match cli.command {
        Commands::Syntax { args } => syntax::execute(args)?,
        Commands::Format { args } => format::execute(args)?,
        Commands::Sema { args } => sema::execute(args)?,
        Commands::Build { args } => build::execute(args)?,
    };

    if exit != 0 {
        std::process::exit(exit);
    }
    Ok(())
}
