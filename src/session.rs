//! A grid session over one directory.
//!
//! The session owns every piece of state (items, grid snapshot, viewport,
//! job queue, reflow timer) and is driven from a single task. Directory
//! listing and cache lookups run on the blocking pool; their results,
//! thumbnail completions and reflow timers arrive as messages and are
//! applied here, so none of the layout state needs locking.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tokio::task;
use tracing::{debug, info, trace};

use crate::config::GridConfig;
use crate::error::GridError;
use crate::layout::{Direction, MasonryLayout, ReflowScheduler, ViewportState};
use crate::models::{Grid, MediaItem};
use crate::scanner::list_directory;
use crate::thumbnails::{
    Completion, JobEvent, JobQueue, Lookup, ProcessSpawner, ThumbnailCache, TokioSpawner,
};

/// Screen area of one grid cell, relative to the viewport's top-left corner.
/// `y` is negative for items cut off at the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: usize,
    pub y: isize,
    pub width: usize,
    pub height: usize,
}

/// Host-side display of thumbnails.
pub trait PlacementRenderer {
    /// Show `image` for item `index` inside `region`.
    fn attach(&mut self, index: usize, region: Region, image: &Path);
    /// Tear down the placement of item `index`.
    fn release(&mut self, index: usize);
}

/// Renderer that only tracks placements and logs them.
#[derive(Debug, Default)]
pub struct LogRenderer {
    placements: BTreeMap<usize, (Region, PathBuf)>,
}

impl LogRenderer {
    pub fn placements(&self) -> &BTreeMap<usize, (Region, PathBuf)> {
        &self.placements
    }
}

impl PlacementRenderer for LogRenderer {
    fn attach(&mut self, index: usize, region: Region, image: &Path) {
        trace!(index, ?region, ?image, "Attach placement");
        self.placements.insert(index, (region, image.to_path_buf()));
    }

    fn release(&mut self, index: usize) {
        trace!(index, "Release placement");
        self.placements.remove(&index);
    }
}

pub struct Session<S: ProcessSpawner = TokioSpawner, R: PlacementRenderer = LogRenderer> {
    layout: MasonryLayout,
    items: Vec<MediaItem>,
    grid: Grid,
    viewport: ViewportState,
    viewport_size: (usize, usize),
    queue: JobQueue<S>,
    reflow: ReflowScheduler,
    renderer: R,
    /// Items that currently hold a placement.
    attached: BTreeSet<usize>,
    /// Source path to its known cache file.
    thumbs: HashMap<PathBuf, PathBuf>,
    extensions: Vec<String>,
    relayouts: usize,
}

impl<S: ProcessSpawner, R: PlacementRenderer> Session<S, R> {
    pub fn new(
        config: GridConfig,
        cache: ThumbnailCache,
        spawner: S,
        renderer: R,
        viewport_width: usize,
        viewport_height: usize,
    ) -> Self {
        let layout = MasonryLayout::new(config.layout.clone());
        let grid = layout.compute(&[], viewport_width, viewport_height);
        Self {
            layout,
            items: Vec::new(),
            grid,
            viewport: ViewportState::default(),
            viewport_size: (viewport_width, viewport_height),
            queue: JobQueue::new(cache, spawner, &config),
            reflow: ReflowScheduler::new(config.reflow_delay),
            renderer,
            attached: BTreeSet::new(),
            thumbs: HashMap::new(),
            extensions: config.extensions,
            relayouts: 0,
        }
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn queue(&self) -> &JobQueue<S> {
        &self.queue
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn selected(&self) -> Option<usize> {
        self.viewport.selected
    }

    /// Number of layout passes run since the session was created.
    pub fn relayout_count(&self) -> usize {
        self.relayouts
    }

    /// Nothing left to generate and no reflow pending.
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle() && !self.reflow.is_pending()
    }

    /// Load the eligible files of `dir` and show the first page.
    ///
    /// The listing and the lookup of already cached thumbnails run on the
    /// blocking pool, so cached items are laid out with their real aspect
    /// ratio from the start.
    pub async fn open(&mut self, dir: &Path) -> Result<usize, GridError> {
        let cache = self.queue.cache().clone();
        let extensions = self.extensions.clone();
        let dir_buf = dir.to_path_buf();
        let (items, thumbs) =
            task::spawn_blocking(move || scan_with_cache(&dir_buf, &extensions, &cache)).await??;

        info!(?dir, count = items.len(), cached = thumbs.len(), "Opened directory");
        self.install(items, thumbs);
        Ok(self.items.len())
    }

    /// Replace the item list, resetting scroll and selection. Must be called
    /// inside a tokio runtime.
    pub fn load_items(&mut self, items: Vec<MediaItem>) {
        self.install(items, HashMap::new());
    }

    fn install(&mut self, items: Vec<MediaItem>, thumbs: HashMap<PathBuf, PathBuf>) {
        self.queue.purge_and_clear();
        self.release_all();
        self.items = items;
        self.thumbs = thumbs;
        self.viewport = ViewportState::default();
        self.relayout();
    }

    pub fn resize(&mut self, viewport_width: usize, viewport_height: usize) {
        if self.viewport_size == (viewport_width, viewport_height) {
            return;
        }
        self.viewport_size = (viewport_width, viewport_height);
        self.relayout();
    }

    /// Full layout pass over the current items.
    ///
    /// Uses every aspect ratio resolved so far, so a pending reflow is
    /// dropped. The scroll offset is clamped to the new extent and the
    /// selected item is brought back into view.
    pub fn relayout(&mut self) {
        self.reflow.cancel();
        let (width, height) = self.viewport_size;
        self.grid = self.layout.compute(&self.items, width, height);
        self.relayouts += 1;
        debug!(
            items = self.items.len(),
            columns = self.grid.columns,
            cell_width = self.grid.cell_width,
            total_height = self.grid.total_height,
            "Relayout"
        );

        self.viewport.clamp(&self.grid);
        if let Some(selected) = self.viewport.selected {
            self.viewport.ensure_visible(&self.grid, selected);
        }
        self.release_all();
        self.render();
    }

    /// Sync placements and thumbnail jobs with the visible range.
    ///
    /// Items with a known thumbnail are attached right away. Everything else
    /// goes to the queue, whose cache check also catches thumbnails written
    /// by other sessions.
    pub fn render(&mut self) {
        let previous = self.viewport.visible.clone();
        self.viewport.update_visible(&self.grid);
        let visible = self.viewport.visible.clone();

        if !previous.is_empty() && previous.is_disjoint(&visible) {
            self.queue.purge_and_clear();
        } else {
            let wanted: HashSet<&Path> = visible
                .iter()
                .filter_map(|i| self.items.get(*i))
                .map(|item| item.path.as_path())
                .collect();
            self.queue.cancel_all(|source| !wanted.contains(source));
        }

        for index in self.attached.clone() {
            if !visible.contains(&index) {
                self.release(index);
            }
        }

        for index in visible {
            let Some(source) = self.items.get(index).map(|i| i.path.clone()) else {
                continue;
            };
            match self.thumbs.get(&source).cloned() {
                Some(thumb) => self.attach(index, &thumb),
                None => {
                    self.queue.enqueue(&source);
                }
            }
        }
    }

    /// Screen region of item `index` under the current scroll offset.
    pub fn region(&self, index: usize) -> Option<Region> {
        let geom = self.grid.geometry(index)?;
        Some(Region {
            x: self.grid.column_x(geom.column),
            y: geom.y as isize - self.viewport.scroll_offset as isize,
            width: self.grid.cell_width,
            height: geom.height,
        })
    }

    fn attach(&mut self, index: usize, image: &Path) {
        let Some(region) = self.region(index) else {
            return;
        };
        if self.attached.contains(&index) {
            self.renderer.release(index);
        }
        self.renderer.attach(index, region, image);
        self.attached.insert(index);
    }

    fn release(&mut self, index: usize) {
        if self.attached.remove(&index) {
            self.renderer.release(index);
        }
    }

    fn release_all(&mut self) {
        for index in std::mem::take(&mut self.attached) {
            self.renderer.release(index);
        }
    }

    /// Scroll by `delta` rows. Returns true if the offset changed.
    pub fn scroll_by(&mut self, delta: isize) -> bool {
        let changed = self.viewport.scroll_by(&self.grid, delta);
        if changed {
            self.release_all();
            self.render();
        }
        changed
    }

    /// Scroll item `index` into view without rendering. Returns whether the
    /// scroll offset changed.
    pub fn ensure_visible(&mut self, index: usize) -> bool {
        self.viewport.ensure_visible(&self.grid, index)
    }

    /// Move the selection and keep it on screen. Returns true if the
    /// selection changed.
    pub fn navigate(&mut self, direction: Direction) -> bool {
        if !self.viewport.navigate(&self.grid, direction) {
            return false;
        }
        if let Some(selected) = self.viewport.selected {
            if self.viewport.ensure_visible(&self.grid, selected) {
                self.release_all();
                self.render();
            }
        }
        true
    }

    /// Record real pixel dimensions for an item. Schedules a debounced
    /// relayout if its estimated height turns out wrong; returns true then.
    pub fn on_aspect_ratio_resolved(&mut self, index: usize, width: u32, height: u32) -> bool {
        let Some(item) = self.items.get_mut(index) else {
            return false;
        };
        item.set_dimensions(width, height);
        self.reflow
            .note_resolved(&self.layout, &self.grid, index, &self.items[index])
    }

    /// Apply a message from the job queue.
    pub fn handle_job_event(&mut self, event: JobEvent) {
        if let Some(done) = self.queue.handle_event(event) {
            self.on_thumbnail_ready(done);
        }
    }

    fn on_thumbnail_ready(&mut self, done: Completion) {
        let Some(index) = self.items.iter().position(|i| i.path == done.source) else {
            trace!(source = ?done.source, "Thumbnail for an item that is gone");
            return;
        };
        self.thumbs.insert(done.source, done.cache_path.clone());
        if let Some((w, h)) = done.dimensions {
            self.on_aspect_ratio_resolved(index, w, h);
        }
        if self.viewport.visible.contains(&index) {
            self.attach(index, &done.cache_path);
        }
    }

    /// Apply a reflow timer firing.
    pub fn handle_reflow(&mut self, generation: u64) {
        if self.reflow.accept(generation) {
            self.relayout();
        }
    }

    /// Apply every message that is already waiting. Returns how many.
    pub fn poll(&mut self) -> usize {
        let jobs = self.queue.events();
        let firings = self.reflow.firings();
        let mut handled = 0;
        loop {
            if let Ok(event) = jobs.try_recv() {
                self.handle_job_event(event);
            } else if let Ok(generation) = firings.try_recv() {
                self.handle_reflow(generation);
            } else {
                return handled;
            }
            handled += 1;
        }
    }

    /// Wait for the next message and apply it. Returns false if both
    /// channels are closed.
    pub async fn next_event(&mut self) -> bool {
        let jobs = self.queue.events();
        let firings = self.reflow.firings();
        tokio::select! {
            Ok(event) = jobs.recv_async() => self.handle_job_event(event),
            Ok(generation) = firings.recv_async() => self.handle_reflow(generation),
            else => return false,
        }
        true
    }

    /// Drive the session until all visible thumbnails are settled and no
    /// reflow is pending.
    pub async fn run_until_idle(&mut self) {
        while !self.is_idle() {
            if !self.next_event().await {
                break;
            }
        }
    }

    /// Follow an external rename. Returns false if `from` is not loaded.
    pub fn rename_item(&mut self, from: &Path, to: &Path) -> bool {
        let Some(index) = self.items.iter().position(|i| i.path == from) else {
            return false;
        };
        self.queue.cancel_all(|source| source == from);
        self.thumbs.remove(from);
        self.release(index);
        self.items[index].rename(to);
        self.render();
        true
    }

    /// Follow an external delete. Returns false if `path` is not loaded.
    pub fn remove_item(&mut self, path: &Path) -> bool {
        let Some(index) = self.items.iter().position(|i| i.path == path) else {
            return false;
        };
        self.queue.cancel_all(|source| source == path);
        self.thumbs.remove(path);
        self.release_all();
        self.items.remove(index);
        self.viewport.visible.clear();

        self.viewport.selected = match self.viewport.selected {
            Some(_) if self.items.is_empty() => None,
            Some(selected) if selected > index => Some(selected - 1),
            Some(selected) => Some(selected.min(self.items.len() - 1)),
            None => None,
        };
        self.relayout();
        true
    }

    /// Stop all work and tear down every placement.
    pub fn close(&mut self) {
        let cancelled = self.queue.purge_and_clear();
        self.reflow.cancel();
        self.release_all();
        debug!(cancelled, "Closed session");
    }
}

/// List `dir` and pick up thumbnails that are already cached.
fn scan_with_cache(
    dir: &Path,
    extensions: &[String],
    cache: &ThumbnailCache,
) -> Result<(Vec<MediaItem>, HashMap<PathBuf, PathBuf>), GridError> {
    cache.ensure_root()?;
    let mut thumbs = HashMap::new();
    let items = list_directory(dir, extensions)?
        .into_iter()
        .map(|entry| {
            let mut item = entry.into_item();
            if let Lookup::Hit { target, dimensions } = cache.probe(&item.path) {
                if let Some((w, h)) = dimensions {
                    item.set_dimensions(w, h);
                }
                thumbs.insert(item.path.clone(), target);
            }
            item
        })
        .collect();
    Ok((items, thumbs))
}

/// Builder for `Session` with configuration options.
pub struct SessionBuilder {
    config: GridConfig,
    viewport: (usize, usize),
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            config: GridConfig::default(),
            viewport: (120, 40),
        }
    }

    pub fn config(mut self, config: GridConfig) -> Self {
        self.config = config;
        self
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.config.pipeline.max_workers = count;
        self
    }

    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.config.pipeline.kill_grace = grace;
        self
    }

    pub fn reflow_delay(mut self, delay: Duration) -> Self {
        self.config.reflow_delay = delay;
        self
    }

    pub fn cache_dir(mut self, dir: PathBuf) -> Self {
        self.config.pipeline.cache_dir = Some(dir);
        self
    }

    pub fn converter(mut self, program: PathBuf) -> Self {
        self.config.pipeline.converter = program;
        self
    }

    pub fn cell_aspect(mut self, ratio: f64) -> Self {
        self.config.layout.cell_aspect = ratio;
        self
    }

    pub fn viewport(mut self, width: usize, height: usize) -> Self {
        self.viewport = (width, height);
        self
    }

    pub fn build<R: PlacementRenderer>(self, renderer: R) -> Result<Session<TokioSpawner, R>> {
        self.build_with_spawner(TokioSpawner, renderer)
    }

    pub fn build_with_spawner<S: ProcessSpawner, R: PlacementRenderer>(
        self,
        spawner: S,
        renderer: R,
    ) -> Result<Session<S, R>> {
        anyhow::ensure!(
            self.config.layout.cell_aspect.is_finite() && self.config.layout.cell_aspect > 0.0,
            "cell aspect must be positive, got {}",
            self.config.layout.cell_aspect
        );

        let cache = match &self.config.pipeline.cache_dir {
            Some(dir) => ThumbnailCache::new(dir.clone()),
            None => ThumbnailCache::new_default()?,
        };
        cache.ensure_root()?;

        let (width, height) = self.viewport;
        Ok(Session::new(self.config, cache, spawner, renderer, width, height))
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
