//! Cálculo de rutas de salida, copia temporal y respaldo.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, SanitizeError};
use crate::model::{ProcessOptions, ResolvedPath};

pub const MISSING_OUTPUT_DIR_MESSAGE: &str =
    "an output directory is required unless the source is overwritten";

const TEMP_MARKER: &str = "_temp_";
const BACKUP_EXTENSION: &str = "bak";

/// Calcula el destino de `input` sin tocar el sistema de archivos.
///
/// Al sobrescribir, el destino es un hermano oculto y temporal del original;
/// si no, `output_dir/<nombre><sufijo><.ext>`.
pub fn resolve_output_path(input: &Path, options: &ProcessOptions) -> Result<ResolvedPath> {
    if options.overwrite_source {
        return Ok(ResolvedPath {
            output_path: temp_sibling(input),
            backup_path: options.keep_backup.then(|| backup_path(input)),
        });
    }

    let output_dir = options
        .output_dir
        .as_deref()
        .ok_or_else(|| SanitizeError::Config(MISSING_OUTPUT_DIR_MESSAGE.to_string()))?;

    let mut file_name = input.file_stem().map(OsString::from).unwrap_or_default();
    file_name.push(options.suffix());
    if let Some(extension) = input.extension() {
        file_name.push(".");
        file_name.push(extension);
    }

    Ok(ResolvedPath {
        output_path: output_dir.join(file_name),
        backup_path: None,
    })
}

/// Crea de forma recursiva el directorio que contendrá la salida.
pub fn ensure_output_dir(resolved: &ResolvedPath) -> Result<()> {
    match resolved.output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| SanitizeError::io_at("cannot create output directory", parent, e)),
        _ => Ok(()),
    }
}

/// Nombre temporal oculto en el mismo directorio que `path`.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();

    // Proceso + nanosegundos evitan colisiones entre ejecuciones consecutivas.
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut name = format!(".{stem}{TEMP_MARKER}{}_{timestamp}", process::id());
    if let Some(extension) = path.extension() {
        name.push('.');
        name.push_str(&extension.to_string_lossy());
    }
    parent.join(name)
}

/// Indica si `path` tiene la forma de una copia temporal creada por [`temp_sibling`].
pub fn is_temp_sibling(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') && name.contains(TEMP_MARKER))
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(BACKUP_EXTENSION);
    path.with_file_name(name)
}
