//! Tasks handed between the reading thread and the workers.
//!
//! A [`FileTask`] carries the bytes of one file in chunks. The reading thread pushes
//! chunks and completes the task, one worker pops them in the order they were pushed.
//! [`Tasks`] holds the bounded queue of file tasks waiting for a worker.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::Read;
use std::sync::Arc;
use tracing::trace;
use ubi_bigfile::read::File;
use ubi_bigfile::resolve::Layer;

use crate::error::{Error, Result};
use crate::event::{Event, Lock};

/// Size of the chunks a file is read in
pub const CHUNK_SIZE: usize = 0x10000;

/// Chunks of a file task
#[derive(Debug, Default)]
pub struct Chunks {
    queue: VecDeque<Bytes>,
    completed: bool,
    cancelled: bool,
}

impl Chunks {
    pub fn push(&mut self, chunk: Bytes) {
        self.queue.push_back(chunk);
    }

    /// No chunks follow the ones queued
    pub fn complete(&mut self) {
        self.completed = true;
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

/// The bytes of one file, streamed in order
#[derive(Debug)]
pub struct FileTask {
    path: String,
    file: File,
    chunks: Mutex<Chunks>,
    ready: Event,
    space: Event,
    max_chunks: usize,
}

/// Read up to `count` bytes of `reader` in chunks of `chunk_size`
pub fn read_chunks<R: Read>(
    reader: &mut R,
    mut count: u64,
    chunk_size: usize,
    mut sink: impl FnMut(Bytes) -> Result<()>,
) -> Result<()> {
    let chunk_size = chunk_size.max(1) as u64;

    while count > 0 {
        let wanted = count.min(chunk_size);
        let mut chunk = Vec::with_capacity(wanted as usize);
        let read = reader.by_ref().take(wanted).read_to_end(&mut chunk)? as u64;
        if read == 0 {
            break;
        }

        count -= read;
        sink(Bytes::from(chunk))?;

        if read < wanted {
            break;
        }
    }

    if count > 0 {
        return Err(Error::ShortRead { remaining: count });
    }
    Ok(())
}

impl FileTask {
    /// Create an empty task holding at most `max_chunks` chunks at a time
    pub fn new(path: impl Into<String>, file: File, max_chunks: usize) -> FileTask {
        FileTask {
            path: path.into(),
            file,
            chunks: Mutex::new(Chunks::default()),
            ready: Event::new(),
            space: Event::new(),
            max_chunks: max_chunks.max(1),
        }
    }

    /// Create a completed task holding `count` bytes of `reader`
    pub fn from_reader<R: Read>(
        path: impl Into<String>,
        file: File,
        reader: &mut R,
        count: u64,
        chunk_size: usize,
    ) -> Result<FileTask> {
        let task = FileTask::new(path, file, usize::MAX);
        {
            let mut chunks = task.lock();
            read_chunks(reader, count, chunk_size, |chunk| {
                chunks.push(chunk);
                Ok(())
            })?;
            chunks.complete();
        }
        Ok(task)
    }

    /// Path of the file, including the paths of the archives holding it
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Lock the chunks, waking the consumer once released
    pub fn lock(&self) -> Lock<'_, Chunks> {
        Lock::new(&self.chunks, &self.ready)
    }

    /// Queue a chunk, waiting while the task is full
    pub fn push(&self, chunk: Bytes) -> Result<()> {
        loop {
            {
                let chunks = self.chunks.lock();
                if chunks.cancelled {
                    return Err(Error::Cancelled);
                }
                if chunks.len() < self.max_chunks {
                    break;
                }
            }
            self.space.wait();
        }

        self.lock().push(chunk);
        Ok(())
    }

    /// Mark the task as complete
    pub fn complete(&self) {
        self.lock().complete();
    }

    /// Abandon the task, waking both sides.
    ///
    /// Chunks still queued are dropped: [`FileTask::pop`] returns `None` from now on
    /// and [`FileTask::push`] fails with [`Error::Cancelled`].
    pub fn cancel(&self) {
        {
            let mut chunks = self.chunks.lock();
            chunks.cancelled = true;
            chunks.queue.clear();
        }
        self.ready.close();
        self.space.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.chunks.lock().cancelled
    }

    /// Take the next chunk, waiting for it if needed.
    ///
    /// Returns `None` once the task is complete and drained, or cancelled.
    pub fn pop(&self) -> Option<Bytes> {
        loop {
            {
                let mut chunks = self.chunks.lock();
                if chunks.cancelled {
                    return None;
                }
                if let Some(chunk) = chunks.queue.pop_front() {
                    drop(chunks);
                    self.space.set();
                    return Some(chunk);
                }
                if chunks.completed {
                    return None;
                }
            }
            self.ready.wait();
        }
    }

    /// Take every chunk until the task is complete
    pub fn read_to_end(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        while let Some(chunk) = self.pop() {
            data.extend_from_slice(&chunk);
        }

        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(data)
    }
}

/// A nested archive waiting to be scanned
#[derive(Debug, Clone)]
pub struct ArchiveTask {
    /// Path of the archive, prefixed to the paths of its files
    pub prefix: String,
    /// Stream position the archive starts at
    pub base: u64,
    /// Layer the archive holds, with its key
    pub layer: Option<(String, Arc<Layer>)>,
}

#[derive(Debug, Default)]
struct FileQueue {
    tasks: VecDeque<Arc<FileTask>>,
    closed: bool,
    cancelled: bool,
}

/// Queue of file tasks waiting for a worker
#[derive(Debug)]
pub struct Tasks {
    files: Mutex<FileQueue>,
    file_event: Event,
    file_space: Event,
    max_file_tasks: usize,
}

impl Tasks {
    /// Create queues holding at most `max_file_tasks` waiting file tasks
    pub fn new(max_file_tasks: usize) -> Tasks {
        Tasks {
            files: Mutex::new(FileQueue::default()),
            file_event: Event::new(),
            file_space: Event::new(),
            max_file_tasks: max_file_tasks.max(1),
        }
    }

    /// Queue a file task, waiting while the queue is full
    pub fn push_file(&self, task: Arc<FileTask>) -> Result<()> {
        loop {
            {
                let mut files = self.files.lock();
                if files.closed {
                    return Err(Error::Cancelled);
                }
                if files.tasks.len() < self.max_file_tasks {
                    trace!(path = task.path(), "queued file task");
                    files.tasks.push_back(task);
                    break;
                }
            }
            self.file_space.wait();
        }

        self.file_event.set();
        Ok(())
    }

    /// Take the next file task, waiting for one.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub fn next_file(&self) -> Option<Arc<FileTask>> {
        loop {
            {
                let mut files = self.files.lock();
                if let Some(task) = files.tasks.pop_front() {
                    drop(files);
                    self.file_space.set();
                    return Some(task);
                }
                if files.closed {
                    return None;
                }
            }
            self.file_event.wait();
        }
    }

    /// No more file tasks follow, workers stop once the queue is drained
    pub fn close_files(&self) {
        self.files.lock().closed = true;
        self.file_event.close();
        self.file_space.close();
    }

    /// Whether the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.files.lock().cancelled
    }

    /// Drop every waiting task and release everyone
    pub fn cancel(&self) {
        let abandoned: Vec<_> = {
            let mut files = self.files.lock();
            files.closed = true;
            files.cancelled = true;
            files.tasks.drain(..).collect()
        };
        for task in abandoned {
            task.cancel();
        }

        self.file_event.close();
        self.file_space.close();
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::thread;
    use ubi_bigfile::read::File;

    use crate::error::{Error, Result};
    use crate::task::{FileTask, Tasks, CHUNK_SIZE};

    #[test]
    fn chunks_arrive_in_order() -> Result<()> {
        let data: Vec<u8> = (0..150_000u32).map(|i| i as u8).collect();
        let task = FileTask::from_reader(
            "a.jpg",
            File::default(),
            &mut Cursor::new(data.clone()),
            data.len() as u64,
            CHUNK_SIZE,
        )?;

        let mut sizes = Vec::new();
        let mut joined = Vec::new();
        while let Some(chunk) = task.pop() {
            sizes.push(chunk.len());
            joined.extend_from_slice(&chunk);
        }

        assert_eq!(sizes, vec![65_536, 65_536, 18_928]);
        assert_eq!(joined, data);
        assert!(task.lock().is_completed());

        Ok(())
    }

    #[test]
    fn empty_file_is_complete() -> Result<()> {
        let task = FileTask::from_reader("a", File::default(), &mut Cursor::new(Vec::new()), 0, CHUNK_SIZE)?;

        assert_eq!(task.pop(), None);
        assert_eq!(task.read_to_end()?, Vec::<u8>::new());

        Ok(())
    }

    #[test]
    fn short_source_fails() {
        let result = FileTask::from_reader(
            "a",
            File::default(),
            &mut Cursor::new(vec![0u8; 10]),
            12,
            4,
        );

        assert!(matches!(result, Err(Error::ShortRead { remaining: 2 })));
    }

    #[test]
    fn push_waits_for_consumer() -> Result<()> {
        let task = Arc::new(FileTask::new("a", File::default(), 1));

        let producer = {
            let task = Arc::clone(&task);
            thread::spawn(move || -> Result<()> {
                for byte in 0..8u8 {
                    task.push(Bytes::from(vec![byte; 3]))?;
                }
                task.complete();
                Ok(())
            })
        };

        let data = task.read_to_end()?;
        producer.join().unwrap()?;

        let expected: Vec<u8> = (0..8u8).flat_map(|byte| [byte; 3]).collect();
        assert_eq!(data, expected);

        Ok(())
    }

    #[test]
    fn cancel_releases_producer() {
        let task = Arc::new(FileTask::new("a", File::default(), 1));
        task.push(Bytes::from_static(b"first")).unwrap();

        let producer = {
            let task = Arc::clone(&task);
            thread::spawn(move || task.push(Bytes::from_static(b"second")))
        };

        task.cancel();
        assert!(matches!(producer.join().unwrap(), Err(Error::Cancelled)));
        assert!(matches!(task.read_to_end(), Err(Error::Cancelled)));
    }

    #[test]
    fn cancel_drops_queued_chunks() {
        let task = FileTask::new("a", File::default(), 4);
        task.push(Bytes::from_static(b"first")).unwrap();
        task.push(Bytes::from_static(b"second")).unwrap();
        assert_eq!(task.lock().len(), 2);

        task.cancel();

        assert!(task.lock().is_empty());
        assert_eq!(task.pop(), None);
        assert!(matches!(task.push(Bytes::from_static(b"third")), Err(Error::Cancelled)));
    }

    #[test]
    fn workers_drain_file_queue() {
        let tasks = Arc::new(Tasks::new(2));

        let workers: Vec<_> = (0..3)
            .map(|_| {
                let tasks = Arc::clone(&tasks);
                thread::spawn(move || {
                    let mut paths = Vec::new();
                    while let Some(task) = tasks.next_file() {
                        paths.push(task.path().to_owned());
                    }
                    paths
                })
            })
            .collect();

        for index in 0..20 {
            let task = FileTask::new(format!("{index}"), File::default(), 1);
            tasks.push_file(Arc::new(task)).unwrap();
        }
        tasks.close_files();

        let mut paths: Vec<usize> = workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .map(|path| path.parse().unwrap())
            .collect();
        paths.sort();

        assert_eq!(paths, (0..20).collect::<Vec<_>>());
    }
}
