//! # configio-core
//!
//! A persisted key-value configuration store with two interchangeable file
//! formats: a JSON object and a type-tagged XML `<map>` document.
//!
//! # Architecture overview (for beginners)
//!
//! The store behaves like a "preferences" API: you open a store for a file,
//! change values through a [`Writer`], and then either *commit* (write to
//! disk now, blocking) or *apply* (write to disk on a background thread and
//! return immediately).
//!
//! - **`value`** – [`Value`], the tagged union stored under every key, and
//!   [`FromValue`] for typed reads.
//!
//! - **`codec`** – Pure conversions between the in-memory map and file
//!   bytes.  [`JsonCodec`] relies on `serde_json`; [`XmlCodec`] is built on a
//!   small hand-written pull parser.  The codec is picked from the file
//!   suffix when the store is opened.
//!
//! - **`store`** – [`ConfigStore`] and [`Writer`]: the load / merge / commit
//!   state machine.  Values already in memory take precedence over values
//!   read from disk, and keys removed before the first load stay removed.
//!
//! - **`scheduler`** – [`CommitScheduler`], which guarantees at most one
//!   background write per store and coalesces bursts of `apply()` calls.
//!
//! ```rust,no_run
//! use configio_core::ConfigStore;
//!
//! let store = ConfigStore::open("/tmp/app/settings.json")?;
//! store.load_from_file()?;
//! let launches: i32 = store.get("launches", 0)?;
//! store.writer().put_int("launches", launches + 1).apply();
//! # Ok::<(), configio_core::StoreError>(())
//! ```

pub mod codec;
pub mod error;
pub mod options;
pub mod scheduler;
pub mod store;
pub mod value;

pub use codec::{Codec, CodecError, Format, JsonCodec, XmlCodec};
pub use error::StoreError;
pub use options::StoreOptions;
pub use scheduler::{CommitScheduler, ScheduleOutcome};
pub use store::{CommitOutcome, ConfigStore, Writer};
pub use value::{Entries, FromValue, Value};
