// Object store implementations
pub mod memory;
pub mod opendal;

pub use self::memory::InMemoryStore;
pub use self::opendal::OpenDalStore;
