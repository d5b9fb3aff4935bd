// Storage operation traits and implementations
pub mod delete;
pub mod exists;
pub mod list;
pub mod mkdir;
pub mod stat;

pub use delete::{Deleter, StoreDeleter};
pub use exists::{BucketState, Prober, StoreProber};
pub use list::{Lister, StoreLister};
pub use mkdir::{Mkdirer, StoreMkdirer};
pub use stat::{PathStat, Stater, StoreStater};
