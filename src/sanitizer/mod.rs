//! Limpiadores por categoría. Cada uno lee la entrada, escribe el destino y
//! devuelve la lista de elementos que realmente eliminó.

pub mod archive;
pub mod image;
pub mod media;
pub mod office;
pub mod pdf;

use std::fs;
use std::path::Path;

use crate::error::{Result, SanitizeError};

/// Descripciones legibles de lo eliminado, en orden de aplicación.
pub type RemovedItems = Vec<String>;

pub(crate) fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| SanitizeError::io_at("cannot read", path, e))
}

pub(crate) fn write_output(destination: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(destination, bytes).map_err(|e| SanitizeError::io_at("cannot write", destination, e))
}

pub use archive::sanitize_archive;
pub use image::sanitize_image;
pub use media::sanitize_media;
pub use office::sanitize_office;
pub use pdf::sanitize_pdf;
