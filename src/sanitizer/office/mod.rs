//! Limpieza de documentos Office basados en ZIP (Word, Excel y PowerPoint).
//!
//! El paquete se abre en memoria, se eliminan las partes con datos personales,
//! se vacían comentarios y autores, se depuran las referencias colgantes y se
//! vuelve a escribir con deflate. Los formatos binarios OLE2 se rechazan con
//! una indicación de conversión.

mod constants;
mod parts;
mod references;
mod revisions;


use std::path::Path;
use tracing::{debug, warn};

use crate::capabilities::{ArchiveCodec, CompressionPolicy, Package};
use crate::classify::{LEGACY_OFFICE_EXTENSIONS, lowercase_extension};
use crate::error::{DOCUMENT_DECODE_MESSAGE, Result, SanitizeError};

use super::{RemovedItems, read_input, write_output};
use constants::{
    CUSTOM_XML_MARKER, CUSTOM_XML_PREFIX, OLE_SIGNATURE, PII_PARTS, TRACK_REVISIONS_LABEL,
    WORD_SETTINGS_PART, ZIP_SIGNATURE,
};
use parts::{EmptyPartRule, PRESENTATION_RULES, SPREADSHEET_RULES, WORD_RULES, empty_matching_parts};
use references::prune_references;
use revisions::strip_track_revisions;

pub use constants::{
    SHEET_COMMENTS_EMPTY, SLIDE_COMMENTS_EMPTY, SLIDE_MODERN_COMMENTS_EMPTY, WORD_COMMENTS_EMPTY,
};

/// Subformato del paquete según su parte principal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DocumentFamily {
    Word,
    Spreadsheet,
    Presentation,
}

impl DocumentFamily {
    fn detect(package: &Package) -> Option<Self> {
        package.names().find_map(|name| {
            if name.starts_with("word/") {
                Some(DocumentFamily::Word)
            } else if name.starts_with("xl/") {
                Some(DocumentFamily::Spreadsheet)
            } else if name.starts_with("ppt/") {
                Some(DocumentFamily::Presentation)
            } else {
                None
            }
        })
    }

    fn rules(self) -> &'static [EmptyPartRule] {
        match self {
            DocumentFamily::Word => WORD_RULES,
            DocumentFamily::Spreadsheet => SPREADSHEET_RULES,
            DocumentFamily::Presentation => PRESENTATION_RULES,
        }
    }
}

pub fn sanitize_office(
    archives: &dyn ArchiveCodec,
    input: &Path,
    destination: &Path,
) -> Result<RemovedItems> {
    let bytes = read_input(input)?;
    if let Some(guidance) = legacy_guidance(input, &bytes) {
        return Err(SanitizeError::UnsupportedLegacyFormat(guidance));
    }

    let mut package = archives.open(&bytes).map_err(|error| {
        debug!("Paquete Office ilegible ({error}): {}", input.display());
        SanitizeError::decode(DOCUMENT_DECODE_MESSAGE)
    })?;

    let mut removed = RemovedItems::new();
    let mut dropped_parts = Vec::new();

    for part in PII_PARTS {
        if package.remove(part) {
            debug!("Parte eliminada: {part}");
            removed.push(part.to_string());
            dropped_parts.push(part.to_string());
        }
    }

    let custom_parts = package.remove_prefix(CUSTOM_XML_PREFIX);
    if !custom_parts.is_empty() {
        debug!("Partes customXml eliminadas: {}", custom_parts.len());
        removed.push(CUSTOM_XML_MARKER.to_string());
        dropped_parts.extend(custom_parts);
    }

    match DocumentFamily::detect(&package) {
        Some(family) => {
            for name in empty_matching_parts(&mut package, family.rules()) {
                removed.push(format!("{name} (emptied)"));
            }
            if family == DocumentFamily::Word && clear_track_revisions(&mut package) {
                removed.push(TRACK_REVISIONS_LABEL.to_string());
            }
        }
        None => debug!("Paquete sin parte principal reconocida: {}", input.display()),
    }

    prune_references(&mut package, &dropped_parts);

    let rebuilt = archives.serialize(&package, CompressionPolicy::Deflate)?;
    write_output(destination, &rebuilt)?;

    Ok(removed)
}

fn clear_track_revisions(package: &mut Package) -> bool {
    let Some(settings) = package.read(WORD_SETTINGS_PART) else {
        return false;
    };

    match strip_track_revisions(settings) {
        Ok(Some(cleaned)) => package.replace(WORD_SETTINGS_PART, &cleaned),
        Ok(None) => false,
        Err(error) => {
            warn!("settings.xml ilegible, se deja sin cambios: {error}");
            false
        }
    }
}

/// Mensaje de rechazo si el archivo es un binario OLE2 o lleva una extensión heredada
/// sin ser un ZIP.
fn legacy_guidance(path: &Path, bytes: &[u8]) -> Option<String> {
    let extension = lowercase_extension(path);
    let legacy_extension = extension
        .as_deref()
        .is_some_and(|ext| LEGACY_OFFICE_EXTENSIONS.contains(&ext));

    let is_ole = bytes.starts_with(&OLE_SIGNATURE);
    if !is_ole && (!legacy_extension || bytes.starts_with(ZIP_SIGNATURE)) {
        return None;
    }

    let guidance = match extension.as_deref().and_then(modern_equivalent) {
        Some((legacy, modern)) => format!(
            "legacy binary Office format is not supported; convert .{legacy} to .{modern} first"
        ),
        None => "legacy binary Office format is not supported; \
                 convert the file to .docx, .xlsx or .pptx first"
            .to_string(),
    };
    Some(guidance)
}

fn modern_equivalent(extension: &str) -> Option<(&'static str, &'static str)> {
    match extension {
        "doc" | "docx" | "docm" => Some(("doc", "docx")),
        "dot" | "dotx" | "dotm" => Some(("dot", "dotx")),
        "xls" | "xlsx" | "xlsm" => Some(("xls", "xlsx")),
        "xlt" | "xltx" | "xltm" => Some(("xlt", "xltx")),
        "ppt" | "pptx" | "pptm" => Some(("ppt", "pptx")),
        "pot" | "potx" | "potm" => Some(("pot", "potx")),
        "pps" | "ppsx" | "ppsm" => Some(("pps", "ppsx")),
        _ => None,
    }
}
