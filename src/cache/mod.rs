pub mod key;
pub mod policy;
pub mod entry;
pub mod query_cache;

pub use key::{CacheKey, ResourceKind};
pub use policy::QueryPolicy;
pub use entry::{QuerySnapshot, QueryStatus};
pub use query_cache::QueryCache;
