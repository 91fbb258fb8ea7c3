pub mod cancel;
pub mod expiring_cache;

pub use cancel::{cancellable, CancelToken, Canceller};
pub use expiring_cache::ExpirationCacheMap;
