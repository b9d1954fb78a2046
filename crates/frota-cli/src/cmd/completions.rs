use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};

/// Arguments for `frota completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script generation.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `shell` to stdout.
///
/// # Errors
///
/// Never fails today; the `Result` keeps the command dispatch uniform.
pub fn run_completions(shell: Shell, command: &mut clap::Command) -> Result<()> {
    generate(shell, command, "frota", &mut std::io::stdout());
    Ok(())
}
