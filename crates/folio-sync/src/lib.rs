//! Cache-or-fetch synchronization of upstream profiles and repositories.
//!
//! [`SyncEngine`] serves entities from the [`folio_db::EntityStore`] while
//! they are inside the cache window and refreshes them through an
//! [`Upstream`] otherwise. At most one upstream fetch per key is in flight at
//! any time; concurrent callers share its outcome.

pub mod engine;
pub mod error;
pub mod flight;
pub mod upstream;

pub use engine::{SyncEngine, SyncSource, Synced};
pub use error::{FetchError, SyncError};
pub use flight::SingleFlight;
pub use upstream::{GithubUpstream, LazyUpstream, Upstream};
