use clap::Args;
use itertools::Itertools;
use miette::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use ubi_bigfile::{
    layout::{output_name, Layout, Naming},
    read::BigFile,
    resolve::Resolution,
    FormatProfile,
};

#[derive(Args)]
pub struct ListArgs {
    /// An input M4B file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Show the names files get once converted
    #[arg(long, default_value_t = false)]
    converted: bool,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let profile = FormatProfile::default();
        let mut reader = super::open(&self.file)?;

        let mut big_file = BigFile::read(&mut reader, &profile)
            .context(format!("reading {}", self.file.display()))?;
        Resolution::resolve(&mut reader, &profile, &mut big_file)
            .context(format!("resolving {}", self.file.display()))?;

        let naming = match self.converted {
            true => Naming::Converted,
            false => Naming::Stored,
        };

        let mut files = Vec::new();
        big_file.root.walk("", &mut |path, file| files.push((path, file)));

        for (path, file) in files.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
            let path = match naming {
                Naming::Converted => match (path.rsplit_once('/'), output_name(file, &profile)) {
                    (Some((directory, _)), Some(name)) => format!("{directory}/{name}"),
                    (None, Some(name)) => name,
                    (_, None) => path,
                },
                Naming::Stored => path,
            };

            match &file.layer {
                Some(layer) => println!(
                    "{:>10} {:<9} {} {}",
                    file.size,
                    file.kind.dimmed(),
                    path,
                    format!("[layer {layer}]").blue()
                ),
                None => println!("{:>10} {:<9} {}", file.size, file.kind.dimmed(), path),
            }
        }

        let layout = Layout::compute(&big_file, &profile, naming);
        println!(
            "{} files, {} bytes of metadata",
            layout.files.green(),
            layout.file_system_size.green()
        );
        for (position, paths) in layout.shared() {
            println!("{} {:#X}: {}", "shared".yellow(), position, paths.iter().join(", "));
        }

        Ok(())
    }
}
