pub mod build;
pub mod format;
pub mod sema;
pub mod syntax;

use anyhow::Result;

use crate::cli::CommonArgs;
use crate::compiler::{compile, Command, CompileOptions};

/// Shared execution path: build options, run the pipeline, print JSON
/// diagnostics when requested, return the exit code.
pub(crate) fn execute_command(command: Command, args: CommonArgs) -> Result<i32> {
    let mut options = CompileOptions {
        command,
        ..CompileOptions::default()
    };
    if let Some(threads) = args.threads {
        options.threads = threads;
    }
    options.verify = !args.no_verify;

    let (compiler, exit) = compile(options, &args.inputs)?;

    if args.errors_json {
        let diags = compiler.reporter().diagnostics();
        println!("{}", serde_json::to_string_pretty(&diags)?);
    }

    log::info!(
        "{} error(s), {} warning(s)",
        compiler.reporter().error_count(),
        compiler.reporter().warning_count()
    );
    Ok(exit)
}
