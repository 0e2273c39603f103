//! Debounced relayout after thumbnails reveal real aspect ratios.
//!
//! Thumbnails tend to land in bursts from one wave of workers. Each arrival
//! that contradicts the estimated height restarts a single timer; only when
//! the timer survives the quiet period does the session relayout once.

use std::time::Duration;

use flume::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::MasonryLayout;
use crate::models::{Grid, MediaItem};

pub struct ReflowScheduler {
    delay: Duration,
    generation: u64,
    /// The one outstanding timer, if any.
    timer: Option<JoinHandle<()>>,
    needs_reflow: bool,
    fire_tx: Sender<u64>,
    fire_rx: Receiver<u64>,
}

impl ReflowScheduler {
    pub fn new(delay: Duration) -> Self {
        let (fire_tx, fire_rx) = flume::unbounded();
        Self {
            delay,
            generation: 0,
            timer: None,
            needs_reflow: false,
            fire_tx,
            fire_rx,
        }
    }

    /// Timer firings; pass each value to `accept`.
    pub fn firings(&self) -> Receiver<u64> {
        self.fire_rx.clone()
    }

    pub fn needs_reflow(&self) -> bool {
        self.needs_reflow
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_some()
    }

    /// Check a freshly resolved item against the current grid and schedule a
    /// reflow if its height would change. Returns true if scheduled.
    pub fn note_resolved(
        &mut self,
        layout: &MasonryLayout,
        grid: &Grid,
        index: usize,
        item: &MediaItem,
    ) -> bool {
        let Some(geom) = grid.geometry(index) else {
            return false;
        };
        if !geom.estimated {
            return false;
        }
        let height = layout.item_height(item.aspect_ratio(), grid.cell_width);
        if height == geom.height {
            trace!(index, height, "Estimate confirmed");
            return false;
        }
        debug!(index, estimated = geom.height, actual = height, "Estimate was off");
        self.schedule();
        true
    }

    /// Mark the grid stale and restart the debounce timer.
    /// Must be called inside a tokio runtime.
    pub fn schedule(&mut self) {
        self.needs_reflow = true;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation += 1;

        let generation = self.generation;
        let delay = self.delay;
        let tx = self.fire_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(generation);
        }));
    }

    /// Drop any pending reflow.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation += 1;
        self.needs_reflow = false;
    }

    /// Consume a timer firing. True means: relayout now. Firings from a timer
    /// that has since been restarted or cancelled are ignored.
    pub fn accept(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.needs_reflow {
            trace!(generation, current = self.generation, "Stale reflow timer");
            return false;
        }
        self.timer = None;
        self.needs_reflow = false;
        true
    }
}

impl Drop for ReflowScheduler {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
