use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, io::BufReader, path::Path};

pub mod extract;
pub mod find;
pub mod layers;
pub mod list;
pub mod pack;

#[derive(clap::Subcommand)]
pub enum BigFileCommands {
    /// List the files of a big file
    List(list::ListArgs),
    /// Locate a file through nested big files
    Find(find::FindArgs),
    /// Show the layers resolved from the resources of a big file
    Layers(layers::LayersArgs),
    /// Extract a big file and the big files nested in it into a directory
    Extract(extract::ExtractArgs),
    /// Pack a directory into a big file
    Pack(pack::PackArgs),
}

impl BigFileCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            BigFileCommands::List(list) => list.handle(),
            BigFileCommands::Find(find) => find.handle(),
            BigFileCommands::Layers(layers) => layers.handle(),
            BigFileCommands::Extract(extract) => extract.handle(),
            BigFileCommands::Pack(pack) => pack.handle(),
        }
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .into_diagnostic()
        .context(format!("path: {}", path.display()))?;
    Ok(BufReader::new(file))
}
