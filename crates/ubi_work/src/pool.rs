//! Worker pool streaming the files of a big file to a [`FileConsumer`].
//!
//! The calling thread is the only one touching the reader. It scans every archive,
//! keeps nested archives as [`ArchiveTask`]s to scan after the current one and streams
//! the bytes of every other file into a [`FileTask`]. Workers take file tasks in turn
//! and hand them to the consumer. Bytes of one file always arrive in order, distinct
//! files are consumed in any order. Once the consumer returns, the rest of its file
//! is skipped.
//!
//! The first consumer error cancels the run: the reading thread stops at its next chunk,
//! waiting tasks are dropped and the error is returned once every worker has stopped.

use bon::Builder;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, instrument, trace, warn};
use ubi_bigfile::profile::FormatProfile;
use ubi_bigfile::read::BigFile;
use ubi_bigfile::resolve::Resolution;
use ubi_bigfile::types::FileKind;

use crate::error::{Error, Result};
use crate::task::{read_chunks, ArchiveTask, FileTask, Tasks, CHUNK_SIZE};

/// Receives file tasks on the worker threads
pub trait FileConsumer: Sync {
    /// Consume every chunk of `task`
    fn consume(&self, task: &FileTask) -> Result<()>;
}

impl<F> FileConsumer for F
where
    F: Fn(&FileTask) -> Result<()> + Sync,
{
    fn consume(&self, task: &FileTask) -> Result<()> {
        self(task)
    }
}

/// What a run went through
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub archives: usize,
    pub files: usize,
    pub bytes: u64,
}

fn default_threads() -> usize {
    thread::available_parallelism().map_or(1, |threads| threads.get())
}

/// Streaming pipeline settings
///
/// ```
/// use ubi_work::Pipeline;
///
/// let pipeline = Pipeline::builder().threads(2).max_file_tasks(8).build();
/// assert_eq!(pipeline.threads, 2);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct Pipeline {
    /// Number of worker threads
    #[builder(default = default_threads())]
    pub threads: usize,
    /// File tasks that may wait for a worker at once
    #[builder(default = 64)]
    pub max_file_tasks: usize,
    /// Size of the chunks files are read in
    #[builder(default = CHUNK_SIZE)]
    pub chunk_size: usize,
    /// Chunks one file task may buffer before the reader waits
    #[builder(default = 16)]
    pub max_chunks: usize,
    /// Resolve the layers of every scanned archive
    #[builder(default = true)]
    pub resolve: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Pipeline {
    /// Stream every file of the big file starting at the current position of `reader`
    #[instrument(skip_all, fields(threads = self.threads), err)]
    pub fn run<R, C>(&self, reader: &mut R, profile: &FormatProfile, consumer: &C) -> Result<Summary>
    where
        R: Read + Seek,
        C: FileConsumer,
    {
        let tasks = Tasks::new(self.max_file_tasks);
        let failure = Mutex::new(None);
        let base = reader.stream_position()?;

        let (produced, panicked) = thread::scope(|scope| {
            let mut workers = Vec::new();
            for index in 0..self.threads.max(1) {
                let spawned = thread::Builder::new()
                    .name(format!("ubi-work-{index}"))
                    .spawn_scoped(scope, || work(&tasks, consumer, &failure));

                match spawned {
                    Ok(worker) => workers.push(worker),
                    Err(error) => {
                        tasks.cancel();
                        return (Err(error.into()), false);
                    }
                }
            }

            let produced = self.produce(reader, profile, base, &tasks);
            match &produced {
                Ok(_) => tasks.close_files(),
                Err(_) => tasks.cancel(),
            }

            let panicked = workers
                .into_iter()
                .fold(false, |panicked, worker| worker.join().is_err() || panicked);
            (produced, panicked)
        });

        if let Some(error) = failure.into_inner() {
            return Err(error);
        }
        let summary = produced?;
        if panicked {
            return Err(Error::Panicked);
        }

        info!(
            archives = summary.archives,
            files = summary.files,
            bytes = summary.bytes,
            "pipeline finished"
        );
        Ok(summary)
    }

    fn produce<R: Read + Seek>(
        &self,
        reader: &mut R,
        profile: &FormatProfile,
        base: u64,
        tasks: &Tasks,
    ) -> Result<Summary> {
        let mut summary = Summary::default();
        let mut archives = VecDeque::from([ArchiveTask {
            prefix: String::new(),
            base,
            layer: None,
        }]);

        while let Some(archive) = archives.pop_front() {
            if tasks.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let name = archive.prefix.trim_end_matches('/');
            reader.seek(SeekFrom::Start(archive.base))?;

            let mut big_file = match &archive.layer {
                Some((key, layer)) => BigFile::read_with_layer(reader, profile, key, layer),
                None => BigFile::read(reader, profile),
            }
            .map_err(|error| Error::from(error).in_file(name))?;

            let resolution = if self.resolve {
                Resolution::resolve(reader, profile, &mut big_file)
                    .map_err(|error| Error::from(error).in_file(name))?
            } else {
                Resolution::default()
            };

            debug!(archive = name, files = big_file.root.file_count(), "scanning");
            summary.archives += 1;

            let mut files = Vec::new();
            big_file.root.walk("", &mut |path, file| files.push((path, file)));

            for (path, file) in files {
                let path = format!("{}{path}", archive.prefix);

                if file.kind == FileKind::BigFile {
                    let layer = resolution
                        .layer_of(file)
                        .map(|(key, layer)| (key.to_owned(), Arc::clone(layer)));

                    archives.push_back(ArchiveTask {
                        prefix: format!("{path}/"),
                        base: big_file.position_of(file),
                        layer,
                    });
                    continue;
                }

                let task = Arc::new(FileTask::new(path, file.clone(), self.max_chunks));
                tasks.push_file(Arc::clone(&task))?;

                reader.seek(SeekFrom::Start(big_file.position_of(file)))?;
                let streamed = read_chunks(reader, file.size as u64, self.chunk_size, |chunk| {
                    if tasks.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    task.push(chunk)
                });

                match streamed {
                    Ok(()) => task.complete(),
                    Err(Error::Cancelled) if !tasks.is_cancelled() => {
                        trace!(path = task.path(), "consumer left file early");
                    }
                    Err(error) => {
                        task.cancel();
                        return Err(error.in_file(task.path()));
                    }
                }

                summary.files += 1;
                summary.bytes += file.size as u64;
            }
        }

        Ok(summary)
    }
}

fn work<C: FileConsumer>(tasks: &Tasks, consumer: &C, failure: &Mutex<Option<Error>>) {
    while let Some(task) = tasks.next_file() {
        let consumed = consumer.consume(&task);
        // Releases the reading thread if chunks were left unread
        task.cancel();

        let Err(error) = consumed else {
            continue;
        };
        if error.is_cancelled() {
            continue;
        }

        let error = error.in_file(task.path());
        warn!(%error, "file task failed");
        failure.lock().get_or_insert(error);
        tasks.cancel();
    }
}
