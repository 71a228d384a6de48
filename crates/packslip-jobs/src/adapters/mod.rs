//! Concrete document and archive backends.
//!
//! - [`LopdfLibrary`]: PDF documents via `lopdf`
//! - [`FormFeedLibrary`]: form-feed separated text dumps
//! - [`ZipArchiver`]: deflate ZIP archives

pub mod pdf;
pub mod text;
pub mod zip_archive;

pub use pdf::LopdfLibrary;
pub use text::FormFeedLibrary;
pub use zip_archive::ZipArchiver;
