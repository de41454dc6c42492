//! Clasificación de archivos por extensión y firma de contenido.
//!
//! La firma manda cuando es concluyente; la extensión solo decide cuando el
//! contenido no se reconoce. Para contenedores ZIP se inspecciona su estructura
//! interna para distinguir documentos Office de archivos comprimidos genéricos.

use infer::Infer;
use std::fs::File;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

use crate::model::FileCategory;

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jpe", "jfif", "png", "tif", "tiff", "webp", "bmp", "gif",
];
const OFFICE_EXTENSIONS: &[&str] = &[
    "docx", "docm", "dotx", "dotm", "xlsx", "xlsm", "xltx", "xltm", "pptx", "pptm", "potx",
    "potm", "ppsx", "ppsm",
];
/// Variantes binarias previas a OOXML; se clasifican como Office para rechazarlas con guía.
pub const LEGACY_OFFICE_EXTENSIONS: &[&str] = &["doc", "dot", "xls", "xlt", "ppt", "pot", "pps"];
const PDF_EXTENSIONS: &[&str] = &["pdf"];
const ZIP_EXTENSIONS: &[&str] = &["zip"];
const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "mkv", "webm", "avi", "wmv", "flv", "mpg", "mpeg", "3gp", "mp3", "m4a",
    "aac", "wav", "flac", "ogg", "oga", "opus", "wma",
];

const OLE_MIME_TYPES: &[&str] = &[
    "application/msword",
    "application/vnd.ms-excel",
    "application/vnd.ms-powerpoint",
    "application/x-ole-storage",
];

/// Partes principales que delatan un paquete OOXML.
const OFFICE_MAIN_PARTS: &[&str] = &["word/", "xl/", "ppt/"];
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Determina la categoría de procesamiento de `path`.
pub fn classify(path: &Path) -> FileCategory {
    let extension = lowercase_extension(path);

    let category = match sniff_mime(path) {
        Some(mime) => category_from_mime(path, &mime, extension.as_deref()),
        None => None,
    };

    category
        .or_else(|| extension.as_deref().and_then(|ext| category_from_extension(path, ext)))
        .unwrap_or(FileCategory::Other)
}

/// Tipo MIME inferido a partir de los primeros bytes del archivo.
pub fn sniff_mime(path: &Path) -> Option<String> {
    let infer = Infer::new();
    infer
        .get_from_path(path)
        .ok()
        .flatten()
        .map(|kind| kind.mime_type().to_string())
}

pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

fn category_from_mime(path: &Path, mime: &str, extension: Option<&str>) -> Option<FileCategory> {
    debug!("MIME detectado para {}: {mime}", path.display());

    if mime.starts_with("image/") {
        return Some(FileCategory::Image);
    }
    if mime.starts_with("video/") || mime.starts_with("audio/") {
        return Some(FileCategory::Video);
    }
    if mime == "application/pdf" {
        return Some(FileCategory::Pdf);
    }
    if OLE_MIME_TYPES.contains(&mime) {
        return Some(FileCategory::Office);
    }
    if is_zip_mime(mime) {
        return Some(zip_container_category(path, extension));
    }
    None
}

fn category_from_extension(path: &Path, extension: &str) -> Option<FileCategory> {
    if IMAGE_EXTENSIONS.contains(&extension) {
        Some(FileCategory::Image)
    } else if OFFICE_EXTENSIONS.contains(&extension)
        || LEGACY_OFFICE_EXTENSIONS.contains(&extension)
    {
        Some(FileCategory::Office)
    } else if PDF_EXTENSIONS.contains(&extension) {
        Some(FileCategory::Pdf)
    } else if ZIP_EXTENSIONS.contains(&extension) {
        Some(zip_container_category(path, Some(extension)))
    } else if MEDIA_EXTENSIONS.contains(&extension) {
        Some(FileCategory::Video)
    } else {
        None
    }
}

fn is_zip_mime(mime: &str) -> bool {
    mime == "application/zip"
        || mime == "application/java-archive"
        || mime.ends_with("+zip")
        || mime.starts_with("application/vnd.openxmlformats-officedocument.")
        || mime.starts_with("application/vnd.oasis.opendocument.")
}

/// La estructura interna decide entre Office y ZIP genérico; si el contenedor
/// no se puede abrir, decide la extensión.
fn zip_container_category(path: &Path, extension: Option<&str>) -> FileCategory {
    match has_office_structure(path) {
        Some(true) => FileCategory::Office,
        Some(false) => FileCategory::Zip,
        None => match extension {
            Some(ext) if OFFICE_EXTENSIONS.contains(&ext) => FileCategory::Office,
            _ => FileCategory::Zip,
        },
    }
}

fn has_office_structure(path: &Path) -> Option<bool> {
    let file = File::open(path).ok()?;
    let archive = ZipArchive::new(file).ok()?;

    let mut has_content_types = false;
    let mut has_main_part = false;
    for name in archive.file_names() {
        if name == CONTENT_TYPES_PART {
            has_content_types = true;
        }
        if OFFICE_MAIN_PARTS.iter().any(|prefix| name.starts_with(prefix)) {
            has_main_part = true;
        }
    }

    Some(has_content_types && has_main_part)
}
