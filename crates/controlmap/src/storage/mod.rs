pub mod archive;
pub mod filesystem;

pub use archive::{build_archive, BatchArchive};
pub use filesystem::FileStorage;
