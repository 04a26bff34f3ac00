use clap::Args;
use miette::{miette, Context, Result};
use std::path::PathBuf;
use tracing::info;
use ubi_bigfile::FormatProfile;
use ubi_work::{
    consume::{DirectoryOutput, Extract},
    Pipeline,
};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input M4B file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow writing into a directory that is not empty
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Number of worker threads, one per core by default
    #[arg(long)]
    threads: Option<usize>,

    /// File tasks that may wait for a worker at once
    #[arg(long, default_value_t = 64)]
    max_file_tasks: usize,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let occupied = self
            .directory
            .read_dir()
            .is_ok_and(|mut entries| entries.next().is_some());
        if occupied && !self.overwrite {
            return Err(miette!("{} is not empty", self.directory.display()));
        }

        let mut reader = super::open(&self.file)?;
        let consumer = Extract {
            output: DirectoryOutput::new(&self.directory),
        };

        let summary = Pipeline::builder()
            .maybe_threads(self.threads)
            .max_file_tasks(self.max_file_tasks)
            .build()
            .run(&mut reader, &FormatProfile::default(), &consumer)
            .context(format!("extracting {}", self.file.display()))?;

        info!(
            "extracted {} files from {} big files into {}",
            summary.files,
            summary.archives,
            self.directory.display()
        );
        Ok(())
    }
}
