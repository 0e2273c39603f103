//! On-disk thumbnail cache.
//!
//! - Disk cache: Stores thumbnails in XDG_CACHE_HOME/thumbgrid/thumbs/
//! - Memory layer: LRU of probed thumbnail dimensions
//!
//! Filenames are an xxh3-128 digest of `path:mtime_secs:mtime_nanos`, so
//! touching a source file moves it to a new cache entry without any
//! invalidation bookkeeping.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use directories::ProjectDirs;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_128;

use crate::error::GridError;
use crate::image_loader::read_dimensions;

/// Number of probed dimensions kept in memory.
const DIMENSION_CACHE_CAPACITY: usize = 4096;

/// Extension of finished cache entries.
pub const THUMB_EXTENSION: &str = "png";

/// Cache key for thumbnail lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: u128,
}

impl CacheKey {
    /// Create a key from a source path and its modification time.
    pub fn new(path: &Path, mtime_secs: i64, mtime_nanos: u32) -> Self {
        let data = format!("{}:{}:{}", path.to_string_lossy(), mtime_secs, mtime_nanos);
        Self {
            hash: xxh3_128(data.as_bytes()),
        }
    }

    /// Stat `source` and build its key.
    pub fn for_source(source: &Path) -> std::io::Result<Self> {
        let modified = std::fs::metadata(source)?.modified()?;
        let (secs, nanos) = split_mtime(modified);
        Ok(Self::new(source, secs, nanos))
    }

    /// Get the filename for disk cache storage.
    pub fn disk_filename(&self) -> String {
        format!("{:032x}.{}", self.hash, THUMB_EXTENSION)
    }
}

fn split_mtime(modified: SystemTime) -> (i64, u32) {
    match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
        Err(e) => {
            let d = e.duration();
            (-(d.as_secs() as i64), d.subsec_nanos())
        }
    }
}

/// Result of looking up a source in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The source could not be stat'ed.
    Unreadable,
    /// No thumbnail yet; `target` is where one belongs.
    Miss { target: PathBuf },
    /// A finished thumbnail exists at `target`.
    Hit {
        target: PathBuf,
        dimensions: Option<(u32, u32)>,
    },
}

/// Thumbnail cache rooted at a directory shared across sessions.
#[derive(Clone)]
pub struct ThumbnailCache {
    cache_dir: PathBuf,
    dimensions: Arc<Mutex<LruCache<PathBuf, (u32, u32)>>>,
}

impl ThumbnailCache {
    /// Create a cache handle. The directory is created by `ensure_root`.
    pub fn new(cache_dir: PathBuf) -> Self {
        let capacity = NonZeroUsize::new(DIMENSION_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache_dir,
            dimensions: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Create a cache using the default XDG cache directory.
    pub fn new_default() -> Result<Self, GridError> {
        Ok(Self::new(Self::default_cache_dir()?))
    }

    pub fn default_cache_dir() -> Result<PathBuf, GridError> {
        let proj_dirs = ProjectDirs::from("", "", "thumbgrid").ok_or(GridError::CacheDir)?;
        Ok(proj_dirs.cache_dir().join("thumbs"))
    }

    /// Create the cache directory. Safe to call repeatedly.
    pub fn ensure_root(&self) -> Result<(), GridError> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|e| GridError::io(&self.cache_dir, e))?;
        debug!(cache_dir = ?self.cache_dir, "Thumbnail cache ready");
        Ok(())
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn path_for_key(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(key.disk_filename())
    }

    /// Cache path for the current revision of `source`.
    pub fn cache_path(&self, source: &Path) -> std::io::Result<PathBuf> {
        Ok(self.path_for_key(&CacheKey::for_source(source)?))
    }

    /// Whether a finished thumbnail exists for `source`. Stat failures count
    /// as a miss.
    pub fn exists(&self, source: &Path) -> bool {
        self.cache_path(source).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Cached thumbnail for `source`, if one has been generated.
    pub fn lookup(&self, source: &Path) -> Option<PathBuf> {
        self.cache_path(source).ok().filter(|p| p.is_file())
    }

    /// Pixel dimensions of a cache file, probed once and remembered.
    pub fn dimensions(&self, cache_path: &Path) -> Option<(u32, u32)> {
        if let Some(dims) = self.dimensions.lock().get(cache_path) {
            trace!(?cache_path, "Dimension cache hit");
            return Some(*dims);
        }

        match read_dimensions(cache_path) {
            Ok(dims) => {
                self.dimensions.lock().put(cache_path.to_path_buf(), dims);
                Some(dims)
            }
            Err(e) => {
                debug!(?cache_path, error = %e, "Failed to probe thumbnail");
                None
            }
        }
    }

    /// Dimensions of the cached thumbnail of `source`, if any.
    pub fn source_dimensions(&self, source: &Path) -> Option<(u32, u32)> {
        self.lookup(source).and_then(|p| self.dimensions(&p))
    }

    /// Stat `source`, check for its thumbnail and probe the thumbnail's
    /// size. Touches the disk; run it on the blocking pool.
    pub fn probe(&self, source: &Path) -> Lookup {
        let target = match self.cache_path(source) {
            Ok(target) => target,
            Err(e) => {
                trace!(?source, error = %e, "Cannot stat source");
                return Lookup::Unreadable;
            }
        };
        if target.is_file() {
            let dimensions = self.dimensions(&target);
            Lookup::Hit { target, dimensions }
        } else {
            Lookup::Miss { target }
        }
    }
}
