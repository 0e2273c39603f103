//! Bounded thumbnail job queue.
//!
//! - FIFO of pending jobs, at most `max_workers` cache checks and converter
//!   processes at once
//! - Cache short-circuit at dispatch time
//! - Cancellation by predicate or wholesale purge, with terminate/kill escalation
//! - Completions travel as `JobEvent` messages over a flume channel
//!
//! The queue lives on the control thread. It is mutated only through `&mut`
//! methods, so dispatch, completion and purge never interleave. Every stat,
//! header read and rename runs on the blocking pool; the control thread only
//! sees the results as events.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use flume::{Receiver, Sender};
use tokio::task;
use tracing::{debug, trace, warn};

use super::cache::{Lookup, ThumbnailCache};
use super::generator::{ConvertCommand, ProcessHandle, ProcessSpawner};
use crate::config::GridConfig;

/// Identity of a thumbnail job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

/// Message delivered back to the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// The cache state of a dispatched job's source is known.
    Checked { job: JobId, lookup: Lookup },
    /// A converter process finished.
    Exited { job: JobId, success: bool },
    /// The output of an exited converter was moved into the cache, or
    /// discarded when `stored` is false.
    Finalized {
        job: JobId,
        stored: bool,
        dimensions: Option<(u32, u32)>,
    },
}

/// A thumbnail that is ready on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub job: JobId,
    pub source: PathBuf,
    pub cache_path: PathBuf,
    /// Pixel size of the thumbnail, if it could be read.
    pub dimensions: Option<(u32, u32)>,
}

#[derive(Debug)]
enum JobState {
    Pending,
    /// Cache lookup in progress on the blocking pool.
    Checking,
    Running {
        process: ProcessHandle,
        temp: PathBuf,
    },
    /// Converter exited; output being stored or discarded.
    Finalizing,
}

/// One unit of thumbnail work.
#[derive(Debug)]
pub struct ThumbnailJob {
    pub id: JobId,
    pub source: PathBuf,
    target: Option<PathBuf>,
    cancelled: bool,
    state: JobState,
}

impl ThumbnailJob {
    fn new(id: JobId, source: PathBuf) -> Self {
        Self {
            id,
            source,
            target: None,
            cancelled: false,
            state: JobState::Pending,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn completion(&self, cache_path: PathBuf, dimensions: Option<(u32, u32)>) -> Completion {
        Completion {
            job: self.id,
            source: self.source.clone(),
            cache_path,
            dimensions,
        }
    }
}

pub struct JobQueue<S: ProcessSpawner> {
    cache: ThumbnailCache,
    spawner: S,
    converter: PathBuf,
    thumb_box: (u32, u32),
    max_workers: usize,
    kill_grace: Duration,
    /// Jobs waiting for a worker slot, in enqueue order.
    pending: VecDeque<ThumbnailJob>,
    /// Jobs being checked, converted or finalized.
    in_flight: HashMap<JobId, ThumbnailJob>,
    /// Source path to its live job.
    outstanding: HashMap<PathBuf, JobId>,
    checking: usize,
    running: usize,
    finalizing: usize,
    next_id: u64,
    events_tx: Sender<JobEvent>,
    events_rx: Receiver<JobEvent>,
}

impl<S: ProcessSpawner> JobQueue<S> {
    pub fn new(cache: ThumbnailCache, spawner: S, config: &GridConfig) -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        Self {
            cache,
            spawner,
            converter: config.pipeline.converter.clone(),
            thumb_box: config.pipeline.thumb_box,
            max_workers: config.workers(),
            kill_grace: config.pipeline.kill_grace,
            pending: VecDeque::new(),
            in_flight: HashMap::new(),
            outstanding: HashMap::new(),
            checking: 0,
            running: 0,
            finalizing: 0,
            next_id: 0,
            events_tx,
            events_rx,
        }
    }

    /// Receiver for events that must be passed back to `handle_event`.
    pub fn events(&self) -> Receiver<JobEvent> {
        self.events_rx.clone()
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    /// Number of converter processes currently alive.
    pub fn running_count(&self) -> usize {
        self.running
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Cache checks and output moves still on the blocking pool. Each one
    /// will produce exactly one event.
    pub fn background_count(&self) -> usize {
        self.checking + self.finalizing
    }

    /// Nothing queued, running, or awaiting delivery.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    pub fn is_outstanding(&self, source: &Path) -> bool {
        self.outstanding.contains_key(source)
    }

    /// Request a thumbnail for `source`.
    ///
    /// Returns the existing job if one is already outstanding for this
    /// source. Must be called inside a tokio runtime.
    pub fn enqueue(&mut self, source: &Path) -> JobId {
        if let Some(id) = self.outstanding.get(source) {
            trace!(?source, job = id.0, "Job already outstanding");
            return *id;
        }

        let id = JobId(self.next_id);
        self.next_id += 1;
        self.outstanding.insert(source.to_path_buf(), id);
        self.pending
            .push_back(ThumbnailJob::new(id, source.to_path_buf()));
        trace!(?source, job = id.0, "Enqueued thumbnail job");

        self.dispatch();
        id
    }

    /// Start cache checks for pending jobs until the queue is empty or every
    /// slot is taken. A check holds its slot into the converter run.
    fn dispatch(&mut self) {
        while self.checking + self.running < self.max_workers {
            let Some(mut job) = self.pending.pop_front() else {
                break;
            };
            if job.cancelled {
                continue;
            }

            job.state = JobState::Checking;
            self.checking += 1;
            let cache = self.cache.clone();
            let source = job.source.clone();
            let events = self.events_tx.clone();
            let id = job.id;
            task::spawn_blocking(move || {
                let lookup = cache.probe(&source);
                let _ = events.send(JobEvent::Checked { job: id, lookup });
            });
            self.in_flight.insert(job.id, job);
        }
    }

    /// Apply an event from the events channel.
    ///
    /// Returns the finished thumbnail, unless the job failed, was cancelled,
    /// or is unknown (already purged).
    pub fn handle_event(&mut self, event: JobEvent) -> Option<Completion> {
        let completion = match event {
            JobEvent::Checked { job, lookup } => self.checked(job, lookup),
            JobEvent::Exited { job, success } => {
                self.exited(job, success);
                None
            }
            JobEvent::Finalized {
                job,
                stored,
                dimensions,
            } => self.finalized(job, stored, dimensions),
        };

        self.dispatch();
        completion
    }

    fn checked(&mut self, id: JobId, lookup: Lookup) -> Option<Completion> {
        let mut job = self.take_in_state(id, |s| matches!(s, JobState::Checking))?;
        self.checking = self.checking.saturating_sub(1);

        if job.cancelled {
            trace!(job = id.0, "Dropping cancelled job after check");
            self.release(&job);
            return None;
        }

        let target = match lookup {
            Lookup::Unreadable => {
                debug!(source = ?job.source, "Cannot stat source, skipping");
                self.release(&job);
                return None;
            }
            Lookup::Hit { target, dimensions } => {
                trace!(job = id.0, source = ?job.source, "Cache short-circuit");
                self.release(&job);
                return Some(job.completion(target, dimensions));
            }
            Lookup::Miss { target } => target,
        };

        let command = ConvertCommand::new(&self.converter, self.thumb_box, &job.source, &target, id);
        match self.spawner.spawn(id, &command, self.events_tx.clone()) {
            Ok(process) => {
                debug!(job = id.0, source = ?job.source, pid = ?process.pid(), "Started converter");
                job.target = Some(target);
                job.state = JobState::Running {
                    process,
                    temp: command.temp,
                };
                self.running += 1;
                self.in_flight.insert(id, job);
            }
            Err(e) => {
                warn!(source = ?job.source, error = %e, "Failed to start converter");
                self.release(&job);
            }
        }
        None
    }

    fn exited(&mut self, id: JobId, success: bool) {
        let Some(job) = self.in_flight.get_mut(&id) else {
            trace!(job = id.0, "Exit for unknown job");
            return;
        };
        let JobState::Running { temp, .. } = &job.state else {
            trace!(job = id.0, "Exit for a job without a process");
            return;
        };
        let temp = temp.clone();
        let target = job.target.clone();
        let keep = success && !job.cancelled;
        job.state = JobState::Finalizing;
        self.running = self.running.saturating_sub(1);
        self.finalizing += 1;

        if !success {
            debug!(job = id.0, source = ?job.source, "Conversion failed");
        }
        let cache = self.cache.clone();
        let events = self.events_tx.clone();
        task::spawn_blocking(move || {
            let (stored, dimensions) = match target {
                Some(target) if keep => store_output(&cache, &temp, &target),
                _ => {
                    remove_temp(&temp);
                    (false, None)
                }
            };
            let _ = events.send(JobEvent::Finalized {
                job: id,
                stored,
                dimensions,
            });
        });
    }

    fn finalized(
        &mut self,
        id: JobId,
        stored: bool,
        dimensions: Option<(u32, u32)>,
    ) -> Option<Completion> {
        let job = self.take_in_state(id, |s| matches!(s, JobState::Finalizing))?;
        self.finalizing = self.finalizing.saturating_sub(1);
        self.release(&job);

        if job.cancelled {
            trace!(job = id.0, "Dropping cancelled job");
            return None;
        }
        let target = job.target.clone()?;
        stored.then(|| job.completion(target, dimensions))
    }

    /// Remove an in-flight job if it is in the expected state.
    fn take_in_state(
        &mut self,
        id: JobId,
        expected: impl Fn(&JobState) -> bool,
    ) -> Option<ThumbnailJob> {
        match self.in_flight.get(&id) {
            Some(job) if expected(&job.state) => self.in_flight.remove(&id),
            _ => {
                trace!(job = id.0, "Event for unknown job");
                None
            }
        }
    }

    /// Cancel every queued or in-flight job whose source matches.
    ///
    /// Cancelled jobs never produce a completion. Running converters are
    /// terminated, and killed if they outlive the grace period. Returns the
    /// number of jobs cancelled.
    pub fn cancel_all<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Path) -> bool,
    {
        let mut cancelled = 0;

        let outstanding = &mut self.outstanding;
        self.pending.retain(|job| {
            if predicate(&job.source) {
                if outstanding.get(&job.source) == Some(&job.id) {
                    outstanding.remove(&job.source);
                }
                cancelled += 1;
                false
            } else {
                true
            }
        });

        for job in self.in_flight.values_mut() {
            if job.cancelled || !predicate(&job.source) {
                continue;
            }
            job.cancelled = true;
            cancelled += 1;
            if self.outstanding.get(&job.source) == Some(&job.id) {
                self.outstanding.remove(&job.source);
            }
            if let JobState::Running { process, .. } = &job.state {
                process.terminate(self.kill_grace);
            }
        }

        if cancelled > 0 {
            debug!(cancelled, "Cancelled thumbnail jobs");
        }
        self.dispatch();
        cancelled
    }

    /// Cancel everything and empty the queue.
    pub fn purge_and_clear(&mut self) -> usize {
        let cancelled = self.cancel_all(|_| true);
        self.pending.clear();
        self.outstanding.clear();
        cancelled
    }

    fn release(&mut self, job: &ThumbnailJob) {
        if self.outstanding.get(&job.source) == Some(&job.id) {
            self.outstanding.remove(&job.source);
        }
    }
}

/// Move a converter's output into place and probe its size.
fn store_output(cache: &ThumbnailCache, temp: &Path, target: &Path) -> (bool, Option<(u32, u32)>) {
    if !temp.is_file() {
        debug!(?temp, "Converter produced no output");
        return (false, None);
    }
    if let Err(e) = std::fs::rename(temp, target) {
        warn!(?temp, error = %e, "Failed to move thumbnail into cache");
        remove_temp(temp);
        return (false, None);
    }
    (true, cache.dimensions(target))
}

fn remove_temp(temp: &Path) {
    match std::fs::remove_file(temp) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(?temp, error = %e, "Failed to remove temp file"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::thumbnails::generator::{ProcessControl, Signal};
    use parking_lot::Mutex;
    use std::fs::File;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    pub(crate) struct Spawned {
        pub job: JobId,
        pub command: ConvertCommand,
        pub control: ProcessControl,
    }

    /// Records spawns instead of starting processes.
    #[derive(Clone, Default)]
    pub(crate) struct FakeSpawner {
        pub spawned: Arc<Mutex<Vec<Spawned>>>,
        pub fail: bool,
    }

    impl FakeSpawner {
        pub fn count(&self) -> usize {
            self.spawned.lock().len()
        }

        pub fn command(&self, job: JobId) -> ConvertCommand {
            self.spawned
                .lock()
                .iter()
                .find(|s| s.job == job)
                .map(|s| s.command.clone())
                .expect("job was spawned")
        }

        pub fn signals(&self, job: JobId) -> Vec<Signal> {
            self.spawned
                .lock()
                .iter()
                .find(|s| s.job == job)
                .map(|s| s.control.signals.try_iter().collect())
                .unwrap_or_default()
        }

        pub fn mark_exited(&self, job: JobId) {
            if let Some(s) = self.spawned.lock().iter().find(|s| s.job == job) {
                s.control.exited.store(true, Ordering::Release);
            }
        }
    }

    impl ProcessSpawner for FakeSpawner {
        fn spawn(
            &self,
            job: JobId,
            command: &ConvertCommand,
            _exits: Sender<JobEvent>,
        ) -> std::io::Result<ProcessHandle> {
            if self.fail {
                return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no converter"));
            }
            let (handle, control) = ProcessHandle::new(Some(1000 + job.0 as u32));
            self.spawned.lock().push(Spawned {
                job,
                command: command.clone(),
                control,
            });
            Ok(handle)
        }
    }

    /// Apply events until no cache check or output move is outstanding.
    pub(crate) async fn settle<S: ProcessSpawner>(queue: &mut JobQueue<S>) -> Vec<Completion> {
        let events = queue.events();
        let mut done = Vec::new();
        while queue.background_count() > 0 {
            let event = events.recv_async().await.unwrap();
            done.extend(queue.handle_event(event));
        }
        done
    }

    /// Play the converter: optionally write output, then report the exit.
    pub(crate) async fn finish<S: ProcessSpawner>(
        queue: &mut JobQueue<S>,
        spawner: &FakeSpawner,
        job: JobId,
        write_output: bool,
        success: bool,
    ) -> Option<Completion> {
        if write_output {
            let temp = spawner.command(job).temp;
            image::RgbImage::new(4, 2).save_with_format(&temp, image::ImageFormat::Png).unwrap();
        }
        spawner.mark_exited(job);
        queue.handle_event(JobEvent::Exited { job, success });
        settle(queue).await.into_iter().find(|c| c.job == job)
    }

    fn setup(workers: usize) -> (TempDir, JobQueue<FakeSpawner>, FakeSpawner) {
        let dir = tempdir().unwrap();
        let cache = ThumbnailCache::new(dir.path().join("thumbs"));
        cache.ensure_root().unwrap();
        let mut config = GridConfig::default();
        config.pipeline.max_workers = workers;
        let spawner = FakeSpawner::default();
        let queue = JobQueue::new(cache, spawner.clone(), &config);
        (dir, queue, spawner)
    }

    fn source(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn test_bounded_concurrency() {
        let (dir, mut queue, spawner) = setup(4);
        let ids: Vec<JobId> = (0..6)
            .map(|i| queue.enqueue(&source(&dir, &format!("{i}.png"))))
            .collect();

        // Checks run off the control thread; nothing starts until they report.
        assert_eq!(spawner.count(), 0);
        assert_eq!(queue.background_count(), 4);
        settle(&mut queue).await;

        assert_eq!(spawner.count(), 4);
        assert_eq!(queue.running_count(), 4);
        assert_eq!(queue.pending_count(), 2);

        // One exit frees one slot.
        finish(&mut queue, &spawner, ids[0], true, true).await.unwrap();
        assert_eq!(spawner.count(), 5);
        assert_eq!(queue.running_count(), 4);

        for id in &ids[1..] {
            finish(&mut queue, &spawner, *id, true, true).await;
            assert!(queue.running_count() <= queue.max_workers());
        }
        assert_eq!(spawner.count(), 6);
        assert_eq!(queue.running_count(), 0);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_success_moves_temp_into_cache() {
        let (dir, mut queue, spawner) = setup(4);
        let src = source(&dir, "a.png");
        let id = queue.enqueue(&src);
        settle(&mut queue).await;
        let command = spawner.command(id);

        let done = finish(&mut queue, &spawner, id, true, true).await.unwrap();
        assert_eq!(done.source, src);
        assert_eq!(done.cache_path, command.target);
        assert_eq!(done.dimensions, Some((4, 2)));
        assert!(command.target.is_file());
        assert!(!command.temp.exists());
        assert!(queue.cache().exists(&src));
        assert!(!queue.is_outstanding(&src));
    }

    #[tokio::test]
    async fn test_failures_leave_no_thumbnail() {
        let (dir, mut queue, spawner) = setup(4);

        // Non-zero exit with output on disk.
        let a = queue.enqueue(&source(&dir, "a.png"));
        settle(&mut queue).await;
        let a_cmd = spawner.command(a);
        assert!(finish(&mut queue, &spawner, a, true, false).await.is_none());
        assert!(!a_cmd.temp.exists());
        assert!(!a_cmd.target.exists());

        // Zero exit but nothing written.
        let b = queue.enqueue(&source(&dir, "b.png"));
        settle(&mut queue).await;
        let b_cmd = spawner.command(b);
        assert!(finish(&mut queue, &spawner, b, false, true).await.is_none());
        assert!(!b_cmd.target.exists());
        assert_eq!(queue.running_count(), 0);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_duplicate_enqueue_returns_same_job() {
        let (dir, mut queue, spawner) = setup(4);
        let src = source(&dir, "a.png");
        let first = queue.enqueue(&src);
        let second = queue.enqueue(&src);
        assert_eq!(first, second);
        settle(&mut queue).await;
        assert_eq!(spawner.count(), 1);
    }

    #[tokio::test]
    async fn test_unstatable_source_is_skipped() {
        let (dir, mut queue, spawner) = setup(4);
        let missing = dir.path().join("missing.png");
        queue.enqueue(&missing);
        assert!(settle(&mut queue).await.is_empty());
        assert_eq!(spawner.count(), 0);
        assert!(!queue.is_outstanding(&missing));
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_spawn_failure_moves_on() {
        let dir = tempdir().unwrap();
        let cache = ThumbnailCache::new(dir.path().join("thumbs"));
        cache.ensure_root().unwrap();
        let spawner = FakeSpawner {
            fail: true,
            ..Default::default()
        };
        let mut queue = JobQueue::new(cache, spawner, &GridConfig::default());

        let src = dir.path().join("a.png");
        File::create(&src).unwrap();
        queue.enqueue(&src);
        settle(&mut queue).await;
        assert_eq!(queue.running_count(), 0);
        assert!(!queue.is_outstanding(&src));
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_cache_short_circuit_skips_process() {
        let (dir, mut queue, spawner) = setup(1);
        let blocker = queue.enqueue(&source(&dir, "blocker.png"));
        let a = source(&dir, "a.png");
        let a_id = queue.enqueue(&a);
        settle(&mut queue).await;
        assert_eq!(queue.pending_count(), 1);

        // Another producer fills the cache before dispatch reaches A.
        let target = queue.cache().cache_path(&a).unwrap();
        image::RgbImage::new(3, 3).save(&target).unwrap();

        spawner.mark_exited(blocker);
        queue.handle_event(JobEvent::Exited {
            job: blocker,
            success: false,
        });
        let done = settle(&mut queue).await;
        assert_eq!(spawner.count(), 1, "A never got a process");
        assert_eq!(queue.running_count(), 0);

        let hit = done.iter().find(|c| c.job == a_id).unwrap();
        assert_eq!(hit.cache_path, target);
        assert_eq!(hit.dimensions, Some((3, 3)));
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_cache_hit_at_enqueue() {
        let (dir, mut queue, spawner) = setup(2);
        let a = source(&dir, "a.png");
        image::RgbImage::new(3, 3)
            .save(queue.cache().cache_path(&a).unwrap())
            .unwrap();

        let id = queue.enqueue(&a);
        assert!(!queue.is_idle());

        let done = settle(&mut queue).await;
        assert_eq!(done.iter().map(|c| c.job).collect::<Vec<_>>(), vec![id]);
        assert_eq!(spawner.count(), 0);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_cancel_during_check_spawns_nothing() {
        let (dir, mut queue, spawner) = setup(2);
        let a = source(&dir, "a.png");
        queue.enqueue(&a);
        assert_eq!(queue.cancel_all(|_| true), 1);

        assert!(settle(&mut queue).await.is_empty());
        assert_eq!(spawner.count(), 0);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_cancel_suppresses_completion() {
        let (dir, mut queue, spawner) = setup(4);
        let a = source(&dir, "a.png");
        let b = source(&dir, "b.png");
        let a_id = queue.enqueue(&a);
        let b_id = queue.enqueue(&b);
        settle(&mut queue).await;

        assert_eq!(queue.cancel_all(|p| p == a.as_path()), 1);
        assert_eq!(spawner.signals(a_id), vec![Signal::Terminate]);
        assert!(spawner.signals(b_id).is_empty());
        assert!(!queue.is_outstanding(&a));

        // A finished anyway; its output must not reach the cache.
        let a_cmd = spawner.command(a_id);
        assert!(finish(&mut queue, &spawner, a_id, true, true).await.is_none());
        assert!(!a_cmd.target.exists());
        assert!(!a_cmd.temp.exists());

        assert!(finish(&mut queue, &spawner, b_id, true, true).await.is_some());

        // Cancelling a finished job is a no-op.
        assert_eq!(queue.cancel_all(|_| true), 0);
    }

    #[tokio::test]
    async fn test_purge_never_resurrects() {
        let (dir, mut queue, spawner) = setup(2);
        let ids: Vec<JobId> = (0..5)
            .map(|i| queue.enqueue(&source(&dir, &format!("{i}.png"))))
            .collect();
        settle(&mut queue).await;
        assert_eq!(queue.running_count(), 2);

        assert_eq!(queue.purge_and_clear(), 5);
        assert_eq!(queue.pending_count(), 0);

        // The purged processes still exit; slots are released, nothing fires,
        // and nothing new is started.
        for id in &ids[..2] {
            assert!(finish(&mut queue, &spawner, *id, true, true).await.is_none());
        }
        assert_eq!(queue.running_count(), 0);
        assert_eq!(spawner.count(), 2);
        assert!(queue.is_idle());

        // Stray exits cannot drive the count below zero.
        assert!(queue
            .handle_event(JobEvent::Exited { job: ids[0], success: true })
            .is_none());
        assert_eq!(queue.running_count(), 0);
        assert_eq!(queue.background_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_escalation_timeline() {
        let (dir, mut queue, spawner) = setup(4);
        let slow = queue.enqueue(&source(&dir, "slow.png"));
        let quick = queue.enqueue(&source(&dir, "quick.png"));
        settle(&mut queue).await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        queue.cancel_all(|_| true);
        assert_eq!(spawner.signals(slow), vec![Signal::Terminate]);
        assert_eq!(spawner.signals(quick), vec![Signal::Terminate]);

        // `quick` exits one second after the terminate; `slow` never does.
        tokio::time::sleep(Duration::from_millis(1000)).await;
        finish(&mut queue, &spawner, quick, false, false).await;

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(spawner.signals(slow), vec![Signal::Kill]);
        assert!(spawner.signals(quick).is_empty());
    }
}
