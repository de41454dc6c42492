//! Generadores de archivos de prueba compartidos por los tests de integración.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::ZipWriter;
use zip::write::FileOptions;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// JPEG con un bloque EXIF que incluye `Make` y un IFD GPS.
pub fn jpeg_with_gps(path: &Path) -> TestResult {
    let pixels = RgbImage::from_fn(24, 16, |x, y| image::Rgb([(x * 10) as u8, (y * 15) as u8, 90]));
    let mut plain = Vec::new();
    JpegEncoder::new_with_quality(&mut plain, 90).write_image(
        pixels.as_raw(),
        pixels.width(),
        pixels.height(),
        ExtendedColorType::Rgb8,
    )?;

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\0*");
    tiff.extend_from_slice(&8u32.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    // Make -> "ACME\0" en el offset 38.
    tiff.extend_from_slice(&0x010Fu16.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    tiff.extend_from_slice(&5u32.to_be_bytes());
    tiff.extend_from_slice(&38u32.to_be_bytes());
    // GPSInfo -> IFD en el offset 44.
    tiff.extend_from_slice(&0x8825u16.to_be_bytes());
    tiff.extend_from_slice(&4u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&44u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());
    tiff.extend_from_slice(b"ACME\0\0");
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x0001u16.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    tiff.extend_from_slice(&2u32.to_be_bytes());
    tiff.extend_from_slice(b"S\0\0\0");
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&u16::try_from(tiff.len() + 8)?.to_be_bytes());
    segment.extend_from_slice(b"Exif\0\0");
    segment.extend_from_slice(&tiff);

    let mut file = File::create(path)?;
    file.write_all(&plain[..2])?;
    file.write_all(&segment)?;
    file.write_all(&plain[2..])?;
    Ok(())
}

/// Paquete Word mínimo con un comentario y control de cambios activo.
pub fn docx_with_comments(path: &Path) -> TestResult {
    let parts: [(&str, String); 6] = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#.to_string(),
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#.to_string(),
        ),
        (
            "docProps/core.xml",
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:creator>Jane Roe</dc:creator></cp:coreProperties>"#.to_string(),
        ),
        (
            "word/document.xml",
            format!(r#"<w:document xmlns:w="{W_NS}"><w:body><w:p><w:r><w:t>Draft</w:t></w:r></w:p></w:body></w:document>"#),
        ),
        (
            "word/comments.xml",
            format!(r#"<w:comments xmlns:w="{W_NS}"><w:comment w:id="0" w:author="Jane Roe"><w:p><w:r><w:t>Fix this</w:t></w:r></w:p></w:comment></w:comments>"#),
        ),
        (
            "word/settings.xml",
            format!(r#"<w:settings xmlns:w="{W_NS}"><w:trackRevisions w:val="1"></w:trackRevisions></w:settings>"#),
        ),
    ];

    let mut writer = ZipWriter::new(File::create(path)?);
    for (name, content) in &parts {
        writer.start_file(*name, FileOptions::<'_, ()>::default())?;
        writer.write_all(content.as_bytes())?;
    }
    writer.finish()?;
    Ok(())
}

pub fn zip_with_comment(path: &Path) -> TestResult {
    let mut writer = ZipWriter::new(File::create(path)?);
    writer.add_directory("assets/", FileOptions::<'_, ()>::default())?;
    writer.start_file("assets/data.csv", FileOptions::<'_, ()>::default())?;
    writer.write_all(b"id,value\n1,42\n")?;
    writer.set_comment("exported from host build-07");
    writer.finish()?;
    Ok(())
}
