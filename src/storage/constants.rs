// Key layout
pub const SEPARATOR: char = '/';
pub const SEPARATOR_STR: &str = "/";

// Listing related constants
// A single entry is enough to prove that a prefix exists
pub const PREFIX_PROBE_PAGE_SIZE: usize = 1;
pub const LIST_PAGE_SIZE: usize = 1000;
pub const DELETE_PAGE_SIZE: usize = 1000;

// Ranged writes
// Largest zero-filled gap a ranged write may leave past the end of an object
pub const MAX_RANGED_WRITE_GAP: u64 = 64 * 1024 * 1024;

// Filesystem default
pub const DEFAULT_FS_ROOT: &str = "./storage";
pub const LOCAL_BUCKET: &str = "local";
