//! Encaminamiento de cada archivo hacia el limpiador de su categoría.

use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::capabilities::{
    ArchiveCodec, FfmpegToolkit, ImageCodec, LopdfDocument, MediaToolkit, RasterCodec, ZipCodec,
};
use crate::classify::classify;
use crate::error::{Result, SanitizeError};
use crate::model::{FileCategory, ProcessResult};
use crate::sanitizer::{
    RemovedItems, sanitize_archive, sanitize_image, sanitize_media, sanitize_office, sanitize_pdf,
};

/// Reúne las capacidades que necesitan los limpiadores.
pub struct Dispatcher {
    images: Box<dyn ImageCodec>,
    archives: Box<dyn ArchiveCodec>,
    media: Box<dyn MediaToolkit>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            images: Box::new(RasterCodec),
            archives: Box::new(ZipCodec),
            media: Box::new(FfmpegToolkit::from_env()),
        }
    }
}

impl Dispatcher {
    pub fn new(
        images: Box<dyn ImageCodec>,
        archives: Box<dyn ArchiveCodec>,
        media: Box<dyn MediaToolkit>,
    ) -> Self {
        Self {
            images,
            archives,
            media,
        }
    }

    pub fn with_media_toolkit(mut self, media: impl MediaToolkit + 'static) -> Self {
        self.media = Box::new(media);
        self
    }

    /// Limpia `path` hacia `destination`. Nunca propaga errores: cualquier fallo
    /// se convierte en un resultado con estado `error`.
    pub fn process(&self, path: &Path, destination: &Path) -> ProcessResult {
        match self.sanitize(path, destination) {
            Ok((category, removed)) => {
                info!(
                    "{} limpiado como {category}: {} elementos eliminados",
                    path.display(),
                    removed.len()
                );
                ProcessResult::success(path, destination, category, removed)
            }
            Err(error) => {
                warn!("{} no se pudo limpiar: {error}", path.display());
                ProcessResult::failure(path, Some(destination), &error)
            }
        }
    }

    /// Variante con `Result` para quien prefiera propagar el error.
    pub fn sanitize(
        &self,
        path: &Path,
        destination: &Path,
    ) -> Result<(FileCategory, RemovedItems)> {
        fs::metadata(path).map_err(|e| SanitizeError::io_at("cannot read", path, e))?;

        let category = classify(path);
        let removed = match category {
            FileCategory::Image => sanitize_image(self.images.as_ref(), path, destination),
            FileCategory::Office => sanitize_office(self.archives.as_ref(), path, destination),
            FileCategory::Pdf => sanitize_pdf::<LopdfDocument>(path, destination),
            FileCategory::Zip => sanitize_archive(self.archives.as_ref(), path, destination),
            FileCategory::Video => sanitize_media(self.media.as_ref(), path, destination),
            FileCategory::Other => Err(SanitizeError::UnsupportedType),
        }?;

        Ok((category, removed))
    }
}
