use clap::Args;
use itertools::Itertools;
use miette::miette;
use miette::{Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};
use tracing::info;
use ubi_bigfile::{write::pack, FormatProfile};
use walkdir::WalkDir;

/// First directory of every packed path, taken by the unnamed root
const ROOT: &str = "data";

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target M4B file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        info!("creating {}", &self.file.display());

        let files = WalkDir::new(&self.directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
            .collect_vec();

        if files.is_empty() {
            return Err(miette!("directory is empty"));
        }

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let name = file
                .path()
                .strip_prefix(&self.directory)
                .into_diagnostic()?;
            info!("packing {}", name.display());

            let path = name
                .components()
                .map(|component| component.as_os_str().to_str())
                .collect::<Option<Vec<_>>>()
                .ok_or(miette!("unable to convert {} to a string", name.display()))?
                .join("/");

            let data = std::fs::read(file.path())
                .into_diagnostic()
                .context(format!("reading {}", file.path().display()))?;
            entries.push((format!("{ROOT}/{path}"), data));
        }

        let out = if !self.overwrite {
            File::create_new(&self.file)
                .into_diagnostic()
                .context(format!("creating {}", &self.file.display()))?
        } else {
            File::create(&self.file)
                .into_diagnostic()
                .context(format!("creating {}", &self.file.display()))?
        };

        let mut out = pack(BufWriter::new(out), &FormatProfile::default(), entries)
            .context("finalizing big file")?;
        out.flush().into_diagnostic()?;

        Ok(())
    }
}
