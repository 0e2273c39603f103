//! Thumbnail pipeline for grid sessions.
//!
//! This module provides:
//! - `ThumbnailCache` - Deterministic on-disk cache keyed by path and mtime
//! - `ConvertCommand` / `ProcessSpawner` - External converter invocation
//! - `JobQueue` - Bounded process pool with cancellation; disk work runs on
//!   the blocking pool and comes back as `JobEvent`s

pub mod cache;
pub mod generator;
pub mod queue;

pub use cache::{CacheKey, Lookup, ThumbnailCache};
pub use generator::{ConvertCommand, ProcessHandle, ProcessSpawner, Signal, TokioSpawner};
pub use queue::{Completion, JobEvent, JobId, JobQueue};
