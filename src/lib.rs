pub mod archive;
pub mod config;
pub mod error;
pub mod model;
pub mod source;

pub use archive::{Archiver, RunReport};
pub use error::{ArchiveError, Result};
