mod lock;
mod snapshot;

pub use lock::{try_lock, LockOutcome};
pub use snapshot::{is_fresh, publish, read_snapshot, Snapshot};
