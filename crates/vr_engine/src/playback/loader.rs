//! Performance loading
//!
//! Rooms load their recordings on a small pool of worker threads. Results
//! come back over a channel and are applied to the playlist between ticks, so
//! the per-frame path never blocks on storage.
//!
//! Every load observes a [`CancellationToken`]. Once the playlist is
//! destroyed, workers stop calling storage and report the job as skipped.
//! Cancellation is never surfaced as an error.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::playback::{LoadError, LoadResult, Performance, Playlist, RawPerformances, RoomLayout};

/// Source of raw recordings, shared with loader threads
pub trait PerformanceStorage: Send + Sync {
    /// Load the recording stored under `id`
    fn load(&self, id: &str) -> LoadResult<RawPerformances>;
}

/// In-memory recordings, mostly for tests and demos
#[derive(Debug, Default)]
pub struct MemoryStorage {
    recordings: HashMap<String, RawPerformances>,
    calls: AtomicUsize,
}

impl MemoryStorage {
    /// Empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recording
    pub fn with_recording(mut self, id: impl Into<String>, raw: RawPerformances) -> Self {
        self.insert(id, raw);
        self
    }

    /// Add or replace a recording
    pub fn insert(&mut self, id: impl Into<String>, raw: RawPerformances) {
        self.recordings.insert(id.into(), raw);
    }

    /// How many loads were requested
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PerformanceStorage for MemoryStorage {
    fn load(&self, id: &str) -> LoadResult<RawPerformances> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recordings
            .get(id)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(id.to_string()))
    }
}

/// Directory of `<id>.ron` recordings
#[derive(Debug, Clone)]
pub struct RonFileStorage {
    root: PathBuf,
}

impl RonFileStorage {
    /// Storage rooted at a directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the recordings live in
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding a recording
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.ron", id))
    }

    /// Write a recording, creating the directory if needed
    pub fn save(&self, id: &str, raw: &RawPerformances) -> LoadResult<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let text = ron::ser::to_string_pretty(raw, ron::ser::PrettyConfig::default())
            .map_err(|e| LoadError::Parse(e.to_string()))?;
        let path = self.path_for(id);
        fs::write(&path, text)?;
        Ok(path)
    }
}

impl PerformanceStorage for RonFileStorage {
    fn load(&self, id: &str) -> LoadResult<RawPerformances> {
        let path = self.path_for(id);
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound(path.display().to_string()),
            _ => LoadError::Io(e),
        })?;
        ron::from_str(&text).map_err(|e| LoadError::Parse(format!("{}: {}", path.display(), e)))
    }
}

/// Shared "destroyed" flag checked between load steps
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every holder cancelled
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether [`CancellationToken::cancel`] was called on any clone
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One room's load request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    /// Room the recording belongs to
    pub room_index: usize,
    /// Recording identifier
    pub id: String,
}

/// Outcome of one job, sent from a worker
#[derive(Debug)]
pub enum LoadEvent {
    /// Recording decoded
    Loaded {
        /// Target room
        room_index: usize,
        /// Decoded performances
        performances: Vec<Performance>,
    },
    /// Loading failed
    Failed {
        /// Target room
        room_index: usize,
        /// What went wrong
        error: LoadError,
    },
    /// The playlist was destroyed before or during the load
    Skipped {
        /// Target room
        room_index: usize,
    },
}

/// Aggregate outcome of a loader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Rooms that received performances
    pub loaded: usize,
    /// Rooms whose load failed
    pub failed: usize,
    /// Rooms skipped because of cancellation
    pub skipped: usize,
}

impl LoadSummary {
    /// Jobs accounted for so far
    pub fn total(&self) -> usize {
        self.loaded + self.failed + self.skipped
    }
}

type ErrorHandler = Box<dyn FnMut(&LoadError)>;

/// Bounded-concurrency loader for a playlist's rooms
pub struct PlaylistLoader {
    events: Receiver<LoadEvent>,
    workers: Vec<JoinHandle<()>>,
    expected: usize,
    summary: LoadSummary,
    on_error: Option<ErrorHandler>,
    error_reported: bool,
}

impl std::fmt::Debug for PlaylistLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistLoader")
            .field("workers", &self.workers.len())
            .field("expected", &self.expected)
            .field("summary", &self.summary)
            .finish()
    }
}

impl PlaylistLoader {
    /// Start loading `jobs` on up to `concurrency` worker threads
    ///
    /// Each job is taken by exactly one worker, so a room never has more than
    /// one outstanding load.
    pub fn start<S>(
        storage: Arc<S>,
        jobs: Vec<LoadJob>,
        concurrency: usize,
        token: CancellationToken,
    ) -> Self
    where
        S: PerformanceStorage + ?Sized + 'static,
    {
        let expected = jobs.len();
        let (job_tx, job_rx) = unbounded::<LoadJob>();
        let (event_tx, event_rx) = unbounded::<LoadEvent>();
        for job in jobs {
            // The receiver is alive in this scope
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let worker_count = concurrency.max(1).min(expected);
        let workers = (0..worker_count)
            .map(|id| {
                let storage = Arc::clone(&storage);
                let jobs = job_rx.clone();
                let events = event_tx.clone();
                let token = token.clone();
                thread::spawn(move || worker_loop(id, &*storage, &jobs, &events, &token))
            })
            .collect();

        log::info!("Loading {} recordings on {} workers", expected, worker_count);
        Self {
            events: event_rx,
            workers,
            expected,
            summary: LoadSummary::default(),
            on_error: None,
            error_reported: false,
        }
    }

    /// Forward the first real load error to `handler`
    pub fn on_error(mut self, handler: impl FnMut(&LoadError) + 'static) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Whether every job has been accounted for
    pub fn is_finished(&self) -> bool {
        self.summary.total() >= self.expected
    }

    /// Outcome so far
    pub fn summary(&self) -> LoadSummary {
        self.summary
    }

    /// Apply every event that has arrived, without blocking
    pub fn poll<L: RoomLayout>(&mut self, playlist: &mut Playlist<L>) -> usize {
        let mut applied = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.apply(event, playlist);
                    applied += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    /// Block until every job is accounted for, then join the workers
    pub fn wait<L: RoomLayout>(mut self, playlist: &mut Playlist<L>) -> LoadSummary {
        while !self.is_finished() {
            match self.events.recv() {
                Ok(event) => self.apply(event, playlist),
                Err(_) => break,
            }
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Loader worker panicked");
            }
        }
        log::info!(
            "Loading finished: {} loaded, {} failed, {} skipped",
            self.summary.loaded,
            self.summary.failed,
            self.summary.skipped
        );
        self.summary
    }

    fn apply<L: RoomLayout>(&mut self, event: LoadEvent, playlist: &mut Playlist<L>) {
        match event {
            LoadEvent::Loaded { room_index, performances } => {
                if playlist.set_room_performances(room_index, performances) {
                    self.summary.loaded += 1;
                } else {
                    self.summary.skipped += 1;
                }
            }
            LoadEvent::Failed { room_index, error } => {
                self.summary.failed += 1;
                if self.error_reported {
                    log::warn!("Room {} failed to load: {}", room_index, error);
                    return;
                }
                log::error!("Room {} failed to load: {}", room_index, error);
                self.error_reported = true;
                if let Some(handler) = self.on_error.as_mut() {
                    handler(&error);
                }
            }
            LoadEvent::Skipped { room_index } => {
                log::debug!("Room {} load skipped", room_index);
                self.summary.skipped += 1;
            }
        }
    }
}

fn worker_loop<S: PerformanceStorage + ?Sized>(
    id: usize,
    storage: &S,
    jobs: &Receiver<LoadJob>,
    events: &Sender<LoadEvent>,
    token: &CancellationToken,
) {
    while let Ok(job) = jobs.recv() {
        let event = load_one(storage, &job, token);
        if events.send(event).is_err() {
            break;
        }
    }
    log::trace!("Loader worker {} done", id);
}

fn load_one<S: PerformanceStorage + ?Sized>(
    storage: &S,
    job: &LoadJob,
    token: &CancellationToken,
) -> LoadEvent {
    let room_index = job.room_index;
    if token.is_cancelled() {
        return LoadEvent::Skipped { room_index };
    }

    let result = storage
        .load(&job.id)
        .and_then(|raw| Performance::from_raw_set(&raw));

    match result {
        _ if token.is_cancelled() => LoadEvent::Skipped { room_index },
        Err(error) if error.is_cancelled() => LoadEvent::Skipped { room_index },
        Ok(performances) => LoadEvent::Loaded { room_index, performances },
        Err(error) => LoadEvent::Failed { room_index, error },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaylistConfig;
    use crate::playback::{LinearLayout, RawFrame};
    use crate::render::SceneResources;
    use std::cell::Cell;
    use std::rc::Rc;

    fn raw() -> RawPerformances {
        let frame: RawFrame = [
            [0.0, 1.6, 0.0, 0.0, 0.0, 0.0, 1.0],
            [-0.3, 1.2, 0.0, 0.0, 0.0, 0.0, 1.0],
            [0.3, 1.2, 0.0, 0.0, 0.0, 0.0, 1.0],
        ];
        vec![vec![frame; 4]]
    }

    fn playlist(ids: &[&str]) -> (SceneResources, Playlist<LinearLayout>) {
        let config = PlaylistConfig::default();
        let mut resources = SceneResources::allocate(ids.len(), 2, &config.costume_palette);
        let layout = LinearLayout::new(&config.layout, ids.len());
        let playlist = Playlist::new(ids.iter().copied(), layout, &config, &mut resources).unwrap();
        (resources, playlist)
    }

    /// Cancels the token from inside the first load, as an unmount racing a load would
    struct CancellingStorage {
        inner: MemoryStorage,
        token: CancellationToken,
    }

    impl PerformanceStorage for CancellingStorage {
        fn load(&self, id: &str) -> LoadResult<RawPerformances> {
            self.token.cancel();
            self.inner.load(id)
        }
    }

    #[test]
    fn test_loads_every_room() {
        let (_, mut playlist) = playlist(&["a", "b", "c"]);
        let storage = Arc::new(
            MemoryStorage::new()
                .with_recording("a", raw())
                .with_recording("b", raw())
                .with_recording("c", raw()),
        );

        let loader = PlaylistLoader::start(
            Arc::clone(&storage),
            playlist.load_jobs(),
            4,
            playlist.cancellation_token(),
        );
        let summary = loader.wait(&mut playlist);

        assert_eq!(summary, LoadSummary { loaded: 3, failed: 0, skipped: 0 });
        assert_eq!(storage.call_count(), 3);
        assert_eq!(playlist.loaded_count(), 3);
    }

    #[test]
    fn test_destroyed_playlist_issues_no_loads() {
        let (mut resources, mut playlist) = playlist(&["a", "b"]);
        let jobs = playlist.load_jobs();
        playlist.destroy(&mut resources);

        let storage = Arc::new(MemoryStorage::new().with_recording("a", raw()));
        let errors = Rc::new(Cell::new(0));
        let seen = Rc::clone(&errors);
        let loader = PlaylistLoader::start(Arc::clone(&storage), jobs, 2, playlist.cancellation_token())
            .on_error(move |_| seen.set(seen.get() + 1));
        let summary = loader.wait(&mut playlist);

        assert_eq!(storage.call_count(), 0);
        assert_eq!(summary.skipped, 2);
        assert_eq!(errors.get(), 0);
    }

    #[test]
    fn test_cancel_during_load_stops_further_loads() {
        let (_, mut playlist) = playlist(&["a", "b", "c"]);
        let token = playlist.cancellation_token();
        let storage = Arc::new(CancellingStorage {
            inner: MemoryStorage::new().with_recording("a", raw()),
            token: token.clone(),
        });

        let errors = Rc::new(Cell::new(0));
        let seen = Rc::clone(&errors);
        let loader = PlaylistLoader::start(Arc::clone(&storage), playlist.load_jobs(), 1, token)
            .on_error(move |_| seen.set(seen.get() + 1));
        let summary = loader.wait(&mut playlist);

        assert_eq!(storage.inner.call_count(), 1);
        assert_eq!(summary, LoadSummary { loaded: 0, failed: 0, skipped: 3 });
        assert_eq!(errors.get(), 0);
        assert_eq!(playlist.loaded_count(), 0);
    }

    #[test]
    fn test_first_error_reported_once_and_siblings_continue() {
        let (_, mut playlist) = playlist(&["missing-1", "ok", "missing-2"]);
        let storage = Arc::new(MemoryStorage::new().with_recording("ok", raw()));

        let errors = Rc::new(Cell::new(0));
        let seen = Rc::clone(&errors);
        let loader = PlaylistLoader::start(
            Arc::clone(&storage),
            playlist.load_jobs(),
            1,
            playlist.cancellation_token(),
        )
        .on_error(move |e| {
            assert!(matches!(e, LoadError::NotFound(_)));
            seen.set(seen.get() + 1);
        });
        let summary = loader.wait(&mut playlist);

        assert_eq!(errors.get(), 1);
        assert_eq!(summary, LoadSummary { loaded: 1, failed: 2, skipped: 0 });
        assert!(playlist.rooms()[1].is_loaded());
    }

    #[test]
    fn test_poll_applies_without_blocking() {
        let (_, mut playlist) = playlist(&["a"]);
        let storage = Arc::new(MemoryStorage::new().with_recording("a", raw()));
        let mut loader =
            PlaylistLoader::start(storage, playlist.load_jobs(), 4, playlist.cancellation_token());

        while !loader.is_finished() {
            loader.poll(&mut playlist);
            thread::yield_now();
        }
        assert_eq!(loader.summary().loaded, 1);
        assert!(playlist.rooms()[0].is_loaded());
    }

    #[test]
    fn test_ron_file_storage() {
        let dir = std::env::temp_dir().join(format!("vr_engine_loader_{}", std::process::id()));
        let storage = RonFileStorage::new(&dir);

        let path = storage.save("take-1", &raw()).unwrap();
        assert_eq!(path, dir.join("take-1.ron"));
        assert_eq!(storage.load("take-1").unwrap(), raw());
        assert!(matches!(storage.load("take-2"), Err(LoadError::NotFound(_))));

        fs::write(storage.path_for("broken"), "not ron").unwrap();
        assert!(matches!(storage.load("broken"), Err(LoadError::Parse(_))));

        let _ = fs::remove_dir_all(dir);
    }
}
