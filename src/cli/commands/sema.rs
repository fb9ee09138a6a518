use anyhow::Result;

use crate::cli::commands::execute_command;
use crate::cli::CommonArgs;
use crate::compiler::Command;

/// Parse, declaration pass, use pass.
pub fn execute(args: CommonArgs) -> Result<i32> {
    execute_command(Command::Sema, args)
}
