//! Limpieza de imágenes: se vuelve a codificar el mapa de píxeles y solo se
//! conserva el perfil de color.
//!
//! El informe se obtiene recorriendo los bloques auxiliares del archivo de
//! origen (segmentos JPEG, chunks PNG y RIFF) antes de codificar de nuevo.

use exif::{Context, In};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use crate::capabilities::{ImageCodec, RasterFormat};
use crate::classify::lowercase_extension;
use crate::error::{Result, SanitizeError};

use super::{RemovedItems, read_input, write_output};

const EXIF_LABEL: &str = "EXIF metadata";
const XMP_LABEL: &str = "XMP metadata";

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const XMP_JPEG_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const XMP_EXTENSION_HEADER: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
const PNG_XMP_KEYWORD: &str = "XML:com.adobe.xmp";

/// Etiquetas TIFF que describen la estructura del raster y no a su autor.
const STRUCTURAL_TIFF_TAGS: &[u16] = &[
    256, 257, 258, 259, 262, 273, 274, 277, 278, 279, 282, 283, 284, 296, 317, 322, 323, 324,
    325, 338, 339,
];

pub fn sanitize_image(
    codec: &dyn ImageCodec,
    input: &Path,
    destination: &Path,
) -> Result<RemovedItems> {
    let probe = codec.probe(input)?;
    let target = probe
        .format
        .or_else(|| lowercase_extension(input).and_then(|ext| RasterFormat::from_extension(&ext)))
        .unwrap_or(RasterFormat::LOSSLESS_DEFAULT);
    debug!(
        "Imagen {}x{} se codificará como {target:?}",
        probe.dimensions.0, probe.dimensions.1
    );

    let source = read_input(input)?;
    let removed = auxiliary_blocks(&source);

    let encoded = codec.reencode(input, target, probe.color_profile.as_deref())?;
    if exif_summary(&encoded).is_some() {
        return Err(SanitizeError::tool(
            "re-encoded image still carries EXIF metadata",
        ));
    }

    write_output(destination, &encoded)?;
    Ok(removed)
}

/// Describe los bloques auxiliares presentes en `bytes`, sin repetir etiquetas.
pub fn auxiliary_blocks(bytes: &[u8]) -> RemovedItems {
    let mut removed = RemovedItems::new();

    if let Some(summary) = exif_summary(bytes) {
        push_unique(&mut removed, EXIF_LABEL);
        if summary.gps {
            push_unique(&mut removed, "GPS location");
        }
        if summary.thumbnail {
            push_unique(&mut removed, "embedded thumbnail");
        }
    }

    let container_blocks = if bytes.starts_with(&JPEG_SOI) {
        jpeg_blocks(bytes)
    } else if bytes.starts_with(&PNG_SIGNATURE) {
        png_blocks(bytes)
    } else if is_webp(bytes) {
        webp_blocks(bytes)
    } else {
        Vec::new()
    };

    for label in container_blocks {
        push_unique(&mut removed, &label);
    }
    removed
}

#[derive(Debug, Default)]
struct ExifSummary {
    gps: bool,
    thumbnail: bool,
}

/// `None` cuando no hay campos EXIF descriptivos; la estructura TIFF no cuenta.
fn exif_summary(bytes: &[u8]) -> Option<ExifSummary> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;

    let mut summary = ExifSummary::default();
    let mut descriptive = 0;
    for field in exif.fields() {
        if field.ifd_num == In::THUMBNAIL {
            summary.thumbnail = true;
            continue;
        }
        if field.tag.context() == Context::Tiff
            && STRUCTURAL_TIFF_TAGS.contains(&field.tag.number())
        {
            continue;
        }
        if field.tag.context() == Context::Gps {
            summary.gps = true;
        }
        descriptive += 1;
    }

    (descriptive > 0 || summary.thumbnail).then_some(summary)
}

fn jpeg_blocks(bytes: &[u8]) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut pos = JPEG_SOI.len();

    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            break;
        }
        let marker = bytes[pos + 1];
        match marker {
            0xFF => {
                pos += 1;
                continue;
            }
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            // Tras SOS empiezan los datos comprimidos.
            0xD9 | 0xDA => break,
            _ => {}
        }

        let length = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
        if length < 2 || pos + 2 + length > bytes.len() {
            break;
        }
        let payload = &bytes[pos + 4..pos + 2 + length];

        let label = match marker {
            0xE0 if payload.starts_with(b"JFXX\0") => Some("JFIF thumbnail".to_string()),
            0xE0 if payload.starts_with(b"JFIF\0") => None,
            0xE1 if payload.starts_with(b"Exif\0") => Some(EXIF_LABEL.to_string()),
            0xE1 if payload.starts_with(XMP_JPEG_HEADER)
                || payload.starts_with(XMP_EXTENSION_HEADER) =>
            {
                Some(XMP_LABEL.to_string())
            }
            0xE2 if payload.starts_with(b"ICC_PROFILE\0") => None,
            0xED => Some("IPTC metadata".to_string()),
            0xEE if payload.starts_with(b"Adobe") => None,
            0xFE => Some("JPEG comment".to_string()),
            0xE0..=0xEF => Some(format!("APP{} block", marker - 0xE0)),
            _ => None,
        };
        if let Some(label) = label {
            blocks.push(label);
        }

        pos += 2 + length;
    }

    blocks
}

fn png_blocks(bytes: &[u8]) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut pos = PNG_SIGNATURE.len();

    while pos + 8 <= bytes.len() {
        let length =
            u32::from_be_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
                as usize;
        let kind = &bytes[pos + 4..pos + 8];
        let data_start = pos + 8;
        let Some(data_end) = data_start.checked_add(length).filter(|end| *end <= bytes.len())
        else {
            break;
        };
        let data = &bytes[data_start..data_end];

        match kind {
            b"eXIf" => blocks.push(EXIF_LABEL.to_string()),
            b"tEXt" | b"zTXt" | b"iTXt" => {
                let keyword_end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
                let keyword = String::from_utf8_lossy(&data[..keyword_end]);
                if keyword == PNG_XMP_KEYWORD {
                    blocks.push(XMP_LABEL.to_string());
                } else {
                    blocks.push(format!("PNG text chunk ({keyword})"));
                }
            }
            b"tIME" => blocks.push("PNG timestamp".to_string()),
            b"IEND" => break,
            _ => {}
        }

        // Longitud + tipo + datos + CRC.
        pos = data_end + 4;
    }

    blocks
}

fn is_webp(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
}

fn webp_blocks(bytes: &[u8]) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut pos = 12;

    while pos + 8 <= bytes.len() {
        let kind = &bytes[pos..pos + 4];
        let size = u32::from_le_bytes([
            bytes[pos + 4],
            bytes[pos + 5],
            bytes[pos + 6],
            bytes[pos + 7],
        ]) as usize;

        match kind {
            b"EXIF" => blocks.push(EXIF_LABEL.to_string()),
            b"XMP " => blocks.push(XMP_LABEL.to_string()),
            _ => {}
        }

        let padded = size + (size & 1);
        match (pos + 8).checked_add(padded) {
            Some(next) => pos = next,
            None => break,
        }
    }

    blocks
}

fn push_unique(removed: &mut RemovedItems, label: &str) {
    if !removed.iter().any(|existing| existing == label) {
        removed.push(label.to_string());
    }
}
