use anyhow::Result;

use crate::cli::commands::execute_command;
use crate::cli::CommonArgs;
use crate::compiler::Command;

/// Parse the inputs and verify the in-source directives.
pub fn execute(args: CommonArgs) -> Result<i32> {
    execute_command(Command::Syntax, args)
}
