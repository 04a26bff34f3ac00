use clap::Args;
use itertools::Itertools;
use miette::{Context, Result};
use std::path::PathBuf;
use ubi_bigfile::{
    error::{Error, FileNotFoundError, Lookup},
    read::BigFile,
    FormatProfile, Path,
};

#[derive(Args)]
pub struct FindArgs {
    /// An input M4B file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Path of the file, preceded by the paths of the big files it is nested in
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<String>,
}

impl FindArgs {
    pub fn handle(&self) -> Result<()> {
        let profile = FormatProfile::default();
        let mut reader = super::open(&self.file)?;

        let paths = self
            .paths
            .iter()
            .map(|path| Path::from(path.as_str()))
            .collect_vec();

        let found = BigFile::find_file(&mut reader, &profile, &paths)
            .context(format!("searching {}", self.file.display()))?;

        match found {
            Lookup::Found(located) => {
                println!("{located}");
                Ok(())
            }
            Lookup::NotFound => {
                Err(Error::from(FileNotFoundError::Path(self.paths.iter().join(" > "))).into())
            }
        }
    }
}
