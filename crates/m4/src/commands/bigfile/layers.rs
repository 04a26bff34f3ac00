use clap::Args;
use itertools::Itertools;
use miette::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use ubi_bigfile::{read::BigFile, resolve::Resolution, FormatProfile};

#[derive(Args)]
pub struct LayersArgs {
    /// An input M4B file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl LayersArgs {
    pub fn handle(&self) -> Result<()> {
        let profile = FormatProfile::default();
        let mut reader = super::open(&self.file)?;

        let big_file = BigFile::read(&mut reader, &profile)
            .context(format!("reading {}", self.file.display()))?;
        let resolution = Resolution::build(&mut reader, &profile, &big_file)
            .context(format!("resolving {}", self.file.display()))?;

        if resolution.layers.is_empty() {
            println!("no layers");
            return Ok(());
        }

        for (key, layer) in resolution.layers.iter() {
            println!(
                "{} {}",
                key.bold(),
                layer.atlas.as_deref().unwrap_or("-").blue()
            );
            if layer.mask {
                println!("  {}", "mask".yellow());
            }
            println!("  sets: {}", layer.sets.iter().join(", "));

            for (face, slices) in layer.masks.iter() {
                let slices = slices
                    .iter()
                    .flat_map(|(row, cols)| cols.iter().map(move |col| format!("{row:02}_{col:02}")))
                    .join(" ");
                println!("  {face}: {slices}");
            }
        }

        Ok(())
    }
}
