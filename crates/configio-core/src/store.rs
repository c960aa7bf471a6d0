//! The configuration store and its writer.
//!
//! # Lifecycle
//!
//! ```text
//! ConfigStore::open(path)      codec chosen from the suffix, nothing read yet
//!   writer().put_*/remove/clear   mutate memory immediately
//!   load_from_file()              merge disk entries underneath memory (once)
//!   writer().commit()             load if the file exists, drop pending
//!                                 deletes, overwrite the file, block
//!   writer().apply()              same as commit on the background slot
//! ```
//!
//! # Merge rules
//!
//! Disk content acts as *defaults*: on load, a key already present in memory
//! keeps its in-memory value.  Because a store may be mutated before it ever
//! reads the file, removals made before the first load are remembered in a
//! pending-delete set and re-applied after the merge, otherwise the disk copy
//! of a removed key would resurrect it.  A `clear()` before the first load
//! goes further: the next load keeps no disk entries at all.
//!
//! # Thread safety
//!
//! The map sits behind a mutex shared with the apply worker.  Writes to the
//! file are serialised by a second mutex held from snapshot to write, so
//! whichever flush runs last leaves the newest snapshot on disk.  Writers on
//! several threads are still last-write-wins with no versioning.
//!
//! # Durability
//!
//! A flush truncates and rewrites the target file in place.  A crash in the
//! middle of a write can leave a truncated file behind.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::codec::{Codec, Format};
use crate::error::StoreError;
use crate::options::StoreOptions;
use crate::scheduler::{CommitScheduler, ScheduleOutcome};
use crate::value::{Entries, FromValue, Value};

/// What a successful flush did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The file was (re)written.  `entries` is the number of top-level keys.
    Written { entries: usize },
    /// The map was empty and no file existed, so nothing was created.
    NothingToWrite,
}

/// Persisted key-value configuration bound to one file.
///
/// Cloning a `ConfigStore` yields another handle to the same store.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: PathBuf,
    codec: Box<dyn Codec>,
    state: Mutex<StoreState>,
    /// Held from snapshot to write so flushes reach the disk in snapshot order.
    io_lock: Mutex<()>,
    scheduler: CommitScheduler,
}

#[derive(Default)]
struct StoreState {
    entries: Entries,
    loaded: bool,
    pending_deletes: BTreeSet<String>,
    /// Set by a clear before the first load: the next load keeps nothing
    /// from disk.
    cleared_before_load: bool,
}

impl ConfigStore {
    /// Opens a store for `path` with default options.
    ///
    /// No I/O happens here; the file is read lazily by
    /// [`ConfigStore::load_from_file`] or the first commit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedFormat`] unless the path ends in
    /// `.json` or `.xml`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(path, StoreOptions::default())
    }

    /// Opens a store for `path` with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidOptions`] when `options` fail
    /// [`StoreOptions::validate`] and [`StoreError::UnsupportedFormat`]
    /// unless the path ends in `.json` or `.xml`.
    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        let path = path.as_ref();
        options.validate()?;
        let format = Format::from_path(path).ok_or_else(|| StoreError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        let codec = format.codec(&options);
        Ok(Self::with_codec(path, codec, &options))
    }

    /// Creates a store with an explicit codec, bypassing suffix selection.
    pub fn with_codec(
        path: impl Into<PathBuf>,
        codec: Box<dyn Codec>,
        options: &StoreOptions,
    ) -> Self {
        let path = path.into();
        debug!(path = %path.display(), codec = codec.name(), "created config store");
        Self {
            inner: Arc::new(StoreInner {
                path,
                codec,
                state: Mutex::new(StoreState::default()),
                io_lock: Mutex::new(()),
                scheduler: CommitScheduler::new(options.worker_name.clone()),
            }),
        }
    }

    /// The file this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Name of the codec selected for this store.
    pub fn format_name(&self) -> &'static str {
        self.inner.codec.name()
    }

    /// Whether the file has been merged into memory.
    pub fn is_loaded(&self) -> bool {
        self.inner.state().loaded
    }

    /// Reads the file once and merges it underneath the in-memory entries.
    ///
    /// Returns `Ok(true)` when the store is (now) loaded and `Ok(false)` when
    /// the file does not exist.  After the first success, later calls return
    /// `Ok(true)` without touching the disk.
    ///
    /// # Errors
    ///
    /// [`StoreError::EmptyPath`] without a target path, [`StoreError::Io`] for
    /// read failures other than "not found", and [`StoreError::Codec`] when
    /// the content cannot be decoded.
    pub fn load_from_file(&self) -> Result<bool, StoreError> {
        self.inner.load()
    }

    /// Returns a writer bound to this store.
    pub fn writer(&self) -> Writer<'_> {
        Writer { store: self }
    }

    /// Reads `key` as `T`, or returns `default` when the key is absent or
    /// holds [`Value::Null`].
    ///
    /// # Errors
    ///
    /// [`StoreError::TypeMismatch`] when a value of another type is stored.
    pub fn get<T: FromValue>(&self, key: &str, default: T) -> Result<T, StoreError> {
        let state = self.inner.state();
        match state.entries.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => T::from_value(value).ok_or_else(|| StoreError::TypeMismatch {
                key: key.to_string(),
                requested: T::KIND,
                stored: value.kind(),
            }),
        }
    }

    /// Returns a copy of the raw value under `key`.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.inner.state().entries.get(key).cloned()
    }

    /// Whether `key` is present (a stored null counts as present).
    pub fn contains(&self, key: &str) -> bool {
        self.inner.state().entries.contains_key(key)
    }

    /// Snapshot of every entry currently in memory.
    pub fn get_all(&self) -> Entries {
        self.inner.state().entries.clone()
    }

    /// Blocks until any background apply for this store has finished.
    pub fn wait_for_apply(&self) {
        self.inner.scheduler.wait_idle();
    }

    /// Whether a background apply is running or queued.
    pub fn apply_in_flight(&self) -> bool {
        self.inner.scheduler.is_busy()
    }

    // ── Writer plumbing ───────────────────────────────────────────────────────

    fn put_value(&self, key: String, value: Value) {
        let mut state = self.inner.state();
        // A put after a remove means the key is wanted again.
        state.pending_deletes.remove(&key);
        state.entries.insert(key, value);
    }

    fn remove_key(&self, key: &str) {
        let mut state = self.inner.state();
        state.entries.remove(key);
        if !state.loaded {
            state.pending_deletes.insert(key.to_string());
        }
    }

    fn clear_all(&self) {
        let mut state = self.inner.state();
        // Record first: once the map is empty there is nothing left to mark.
        if !state.loaded {
            let keys: Vec<String> = state.entries.keys().cloned().collect();
            state.pending_deletes.extend(keys);
            state.cleared_before_load = true;
        }
        state.entries.clear();
    }

    fn apply(&self) -> ScheduleOutcome {
        let inner = Arc::clone(&self.inner);
        self.inner.scheduler.schedule(move || {
            if let Err(e) = inner.flush() {
                warn!(path = %inner.path.display(), "background apply failed: {e}");
            }
        })
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("ConfigStore")
            .field("path", &self.inner.path)
            .field("codec", &self.inner.codec.name())
            .field("loaded", &state.loaded)
            .field("entries", &state.entries.len())
            .field("pending_deletes", &state.pending_deletes.len())
            .finish()
    }
}

impl StoreInner {
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> Result<bool, StoreError> {
        if self.state().loaded {
            return Ok(true);
        }
        if self.path.as_os_str().is_empty() {
            return Err(StoreError::EmptyPath);
        }

        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "config file does not exist yet");
                return Ok(false);
            }
            Err(source) => {
                warn!(path = %self.path.display(), "failed to read config file: {source}");
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let from_disk = self.codec.decode(&bytes).map_err(|source| {
            warn!(path = %self.path.display(), "failed to decode config file: {source}");
            StoreError::Codec {
                path: self.path.clone(),
                source,
            }
        })?;

        let mut state = self.state();
        if state.loaded {
            return Ok(true);
        }
        let disk_count = from_disk.len();
        let memory = std::mem::take(&mut state.entries);
        let mut merged: Entries = if state.cleared_before_load {
            debug!(
                path = %self.path.display(),
                disk_entries = disk_count,
                "store was cleared before loading; discarding file content"
            );
            Entries::new()
        } else {
            from_disk
                .into_iter()
                .filter(|(key, _)| !state.pending_deletes.contains(key))
                .collect()
        };
        // Memory wins over disk for the same key.
        merged.extend(memory);
        state.entries = merged;
        state.loaded = true;
        state.cleared_before_load = false;
        debug!(
            path = %self.path.display(),
            disk_entries = disk_count,
            merged_entries = state.entries.len(),
            "loaded config file"
        );
        Ok(true)
    }

    /// The body shared by commit and apply.
    fn flush(&self) -> Result<CommitOutcome, StoreError> {
        if self.path.as_os_str().is_empty() {
            return Err(StoreError::EmptyPath);
        }
        let _io = self.io_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let file_exists = self.path.exists();
        if file_exists {
            self.load()?;
        }

        let snapshot = {
            let mut state = self.state();
            let deletes = std::mem::take(&mut state.pending_deletes);
            for key in &deletes {
                state.entries.remove(key);
            }
            state.entries.clone()
        };

        let encoded = if snapshot.is_empty() {
            if !file_exists {
                debug!(path = %self.path.display(), "nothing to write for empty map");
                return Ok(CommitOutcome::NothingToWrite);
            }
            self.codec.empty_document()
        } else {
            self.codec.encode(&snapshot)
        };
        let bytes = encoded.map_err(|source| StoreError::Codec {
            path: self.path.clone(),
            source,
        })?;

        self.write_file(&bytes)?;
        info!(
            path = %self.path.display(),
            entries = snapshot.len(),
            "wrote config file"
        );
        Ok(CommitOutcome::Written {
            entries: snapshot.len(),
        })
    }

    fn write_file(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            "overwriting config file in place (not crash-atomic)"
        );
        std::fs::write(&self.path, bytes).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Mutation handle for a [`ConfigStore`].
///
/// Every call changes the store's memory immediately; only the disk write is
/// deferred until [`Writer::commit`] or [`Writer::apply`].  Methods take and
/// return the writer by value so calls chain:
///
/// ```rust,no_run
/// # use configio_core::ConfigStore;
/// let store = ConfigStore::open("/tmp/settings.xml").unwrap();
/// let ok = store
///     .writer()
///     .put_string("user", "ada")
///     .put_int("launches", 3)
///     .commit();
/// assert!(ok);
/// ```
#[derive(Clone, Copy)]
pub struct Writer<'a> {
    store: &'a ConfigStore,
}

impl<'a> Writer<'a> {
    /// Stores any value convertible into [`Value`].
    pub fn put(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.store.put_value(key.into(), value.into());
        self
    }

    pub fn put_string(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.put(key, Value::String(value.into()))
    }

    pub fn put_bool(self, key: impl Into<String>, value: bool) -> Self {
        self.put(key, Value::Boolean(value))
    }

    pub fn put_int(self, key: impl Into<String>, value: i32) -> Self {
        self.put(key, Value::Int32(value))
    }

    pub fn put_long(self, key: impl Into<String>, value: i64) -> Self {
        self.put(key, Value::Int64(value))
    }

    pub fn put_float(self, key: impl Into<String>, value: f32) -> Self {
        self.put(key, Value::Float32(value))
    }

    pub fn put_double(self, key: impl Into<String>, value: f64) -> Self {
        self.put(key, Value::Float64(value))
    }

    pub fn put_string_array<I, S>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.put(
            key,
            Value::StringArray(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn put_map(self, key: impl Into<String>, entries: Entries) -> Self {
        self.put(key, Value::NestedMap(entries))
    }

    pub fn put_null(self, key: impl Into<String>) -> Self {
        self.put(key, Value::Null)
    }

    /// Removes `key` from memory and, before the first load, remembers it so
    /// the disk copy is dropped on the next flush.
    pub fn remove(self, key: &str) -> Self {
        self.store.remove_key(key);
        self
    }

    /// Removes every key.
    ///
    /// Before the first load this also discards whatever the file holds: the
    /// next commit writes only entries put after the clear.
    pub fn clear(self) -> Self {
        self.store.clear_all();
        self
    }

    /// Flushes synchronously and reports success.
    ///
    /// Failures are logged; use [`Writer::try_commit`] to inspect them.
    pub fn commit(self) -> bool {
        match self.try_commit() {
            Ok(_) => true,
            Err(e) => {
                warn!(path = %self.store.path().display(), "commit failed: {e}");
                false
            }
        }
    }

    /// Flushes synchronously: loads the file if it exists, applies pending
    /// deletes, then overwrites the file with the full map.
    ///
    /// An empty map overwrites an existing file with an empty document and
    /// creates nothing when no file exists.
    ///
    /// # Errors
    ///
    /// Any load, encode or write failure.
    pub fn try_commit(self) -> Result<CommitOutcome, StoreError> {
        self.store.inner.flush()
    }

    /// Schedules the commit body on the store's background slot and returns
    /// immediately.  Failures are only logged.
    pub fn apply(self) {
        let outcome = self.store.apply();
        debug!(path = %self.store.path().display(), ?outcome, "apply requested");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
