use anyhow::Result;

use crate::cli::commands::execute_command;
use crate::cli::CommonArgs;
use crate::compiler::Command;

/// Parse only.
pub fn execute(args: CommonArgs) -> Result<i32> {
    execute_command(Command::Format, args)
}
