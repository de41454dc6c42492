//! Códec de imágenes rasterizadas sobre el crate `image`.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageDecoder, ImageEncoder, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Result, SanitizeError};

const JPEG_QUALITY: u8 = 95;

/// Formatos que sabemos volver a codificar.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RasterFormat {
    Png,
    Jpeg,
    Tiff,
    WebP,
    Bmp,
    Gif,
}

impl RasterFormat {
    /// Formato seguro y sin pérdida cuando no hay otra pista.
    pub const LOSSLESS_DEFAULT: RasterFormat = RasterFormat::Png;

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(RasterFormat::Png),
            ImageFormat::Jpeg => Some(RasterFormat::Jpeg),
            ImageFormat::Tiff => Some(RasterFormat::Tiff),
            ImageFormat::WebP => Some(RasterFormat::WebP),
            ImageFormat::Bmp => Some(RasterFormat::Bmp),
            ImageFormat::Gif => Some(RasterFormat::Gif),
            _ => None,
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(RasterFormat::Png),
            "jpg" | "jpeg" | "jpe" | "jfif" => Some(RasterFormat::Jpeg),
            "tif" | "tiff" => Some(RasterFormat::Tiff),
            "webp" => Some(RasterFormat::WebP),
            "bmp" => Some(RasterFormat::Bmp),
            "gif" => Some(RasterFormat::Gif),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            RasterFormat::Png => ImageFormat::Png,
            RasterFormat::Jpeg => ImageFormat::Jpeg,
            RasterFormat::Tiff => ImageFormat::Tiff,
            RasterFormat::WebP => ImageFormat::WebP,
            RasterFormat::Bmp => ImageFormat::Bmp,
            RasterFormat::Gif => ImageFormat::Gif,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImageProbe {
    /// Formato detectado por el decodificador, si es uno de los soportados.
    pub format: Option<RasterFormat>,
    pub dimensions: (u32, u32),
    pub color_profile: Option<Vec<u8>>,
}

pub trait ImageCodec {
    fn probe(&self, path: &Path) -> Result<ImageProbe>;

    /// Decodifica y vuelve a codificar sin metadata auxiliar; solo reaplica el perfil de color.
    fn reencode(
        &self,
        path: &Path,
        target: RasterFormat,
        color_profile: Option<&[u8]>,
    ) -> Result<Vec<u8>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RasterCodec;

impl ImageCodec for RasterCodec {
    fn probe(&self, path: &Path) -> Result<ImageProbe> {
        let reader = open_reader(path)?;
        let format = reader.format().and_then(RasterFormat::from_image_format);

        let mut decoder = reader
            .into_decoder()
            .map_err(|e| SanitizeError::decode(format!("cannot decode image: {e}")))?;
        let dimensions = decoder.dimensions();
        let color_profile = decoder
            .icc_profile()
            .map_err(|e| SanitizeError::decode(format!("cannot read color profile: {e}")))?;

        Ok(ImageProbe {
            format,
            dimensions,
            color_profile,
        })
    }

    fn reencode(
        &self,
        path: &Path,
        target: RasterFormat,
        color_profile: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let mut decoder = open_reader(path)?
            .into_decoder()
            .map_err(|e| SanitizeError::decode(format!("cannot decode image: {e}")))?;
        // La orientación EXIF desaparece con la metadata, así que se aplica a los píxeles.
        let orientation = decoder
            .orientation()
            .map_err(|e| SanitizeError::decode(format!("cannot decode image: {e}")))?;
        let mut image = DynamicImage::from_decoder(decoder)
            .map_err(|e| SanitizeError::decode(format!("cannot decode image: {e}")))?;
        image.apply_orientation(orientation);

        let mut buffer = Cursor::new(Vec::new());
        match target {
            RasterFormat::Png => {
                let mut encoder = PngEncoder::new(&mut buffer);
                attach_profile(&mut encoder, color_profile);
                image
                    .write_with_encoder(encoder)
                    .map_err(|e| SanitizeError::tool(format!("cannot encode image: {e}")))?;
            }
            RasterFormat::Jpeg => {
                let mut encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
                attach_profile(&mut encoder, color_profile);
                let image = match image {
                    DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
                    other => DynamicImage::ImageRgb8(other.to_rgb8()),
                };
                image
                    .write_with_encoder(encoder)
                    .map_err(|e| SanitizeError::tool(format!("cannot encode image: {e}")))?;
            }
            RasterFormat::WebP => {
                let mut encoder = WebPEncoder::new_lossless(&mut buffer);
                attach_profile(&mut encoder, color_profile);
                to_eight_bit(image)
                    .write_with_encoder(encoder)
                    .map_err(|e| SanitizeError::tool(format!("cannot encode image: {e}")))?;
            }
            RasterFormat::Tiff => {
                let mut encoder = TiffEncoder::new(&mut buffer);
                attach_profile(&mut encoder, color_profile);
                image
                    .write_with_encoder(encoder)
                    .map_err(|e| SanitizeError::tool(format!("cannot encode image: {e}")))?;
            }
            other => {
                if color_profile.is_some() {
                    debug!("El codificador {other:?} no admite perfil ICC; se omite");
                }
                to_eight_bit(image)
                    .write_to(&mut buffer, other.image_format())
                    .map_err(|e| SanitizeError::tool(format!("cannot encode image: {e}")))?;
            }
        }

        Ok(buffer.into_inner())
    }
}

fn open_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>> {
    ImageReader::open(path)
        .map_err(|e| SanitizeError::io_at("cannot open image", path, e))?
        .with_guessed_format()
        .map_err(|e| SanitizeError::io_at("cannot read image", path, e))
}

fn attach_profile<E: ImageEncoder>(encoder: &mut E, color_profile: Option<&[u8]>) {
    if let Some(profile) = color_profile
        && let Err(error) = encoder.set_icc_profile(profile.to_vec())
    {
        warn!("No se pudo reaplicar el perfil ICC: {error}");
    }
}

fn to_eight_bit(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => image,
        other => DynamicImage::ImageRgba8(other.to_rgba8()),
    }
}
