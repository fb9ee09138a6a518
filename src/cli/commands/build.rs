use anyhow::Result;

use crate::cli::commands::execute_command;
use crate::cli::CommonArgs;
use crate::compiler::Command;

/// Full pipeline: sema plus code-generation scheduling.
pub fn execute(args: CommonArgs) -> Result<i32> {
    execute_command(Command::Build, args)
}
