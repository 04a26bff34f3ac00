pub mod bigfile;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle M4B big files
    Bigfile {
        #[command(subcommand)]
        command: bigfile::BigFileCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Bigfile { command } => command.handle(),
        }
    }
}
