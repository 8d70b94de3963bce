pub mod adapters;
pub mod fs;
pub mod model;
pub mod storage;
pub mod util;

pub use fs::ObjectStorage;
pub use model::fs::{FSError, FileInfo};
pub use storage::Storage;
