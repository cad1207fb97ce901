mod snapshot;
mod store;

pub use snapshot::{load_snapshot, save_snapshot, LoadedCache};
pub use store::TaskCache;
