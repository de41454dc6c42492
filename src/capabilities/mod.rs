//! Capacidades externas que consumen los limpiadores, cada una ligada a una biblioteca concreta.
//!
//! Los limpiadores dependen solo de estos traits; las implementaciones por defecto
//! usan `zip`, `image`, `lopdf` y `ffmpeg`.

pub mod archive;
pub mod media;
pub mod pdf;
pub mod raster;

pub use archive::{
    ArchiveCodec, ArchiveEntry, CompressionPolicy, EntryCompression, Package, ZipCodec,
};
pub use media::{FfmpegToolkit, MediaProbe, MediaStream, MediaToolkit, RemuxOptions};
pub use pdf::{LopdfDocument, PageRef, PdfDocument};
pub use raster::{ImageCodec, ImageProbe, RasterCodec, RasterFormat};
