//! Modelos compartidos entre el orquestador, el despachador y los colaboradores externos.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result, SanitizeError};

pub const DEFAULT_COPY_SUFFIX: &str = "-clean";

/// Categoría de procesamiento de un archivo; decide qué limpiador se usa.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Office,
    Pdf,
    Zip,
    Video,
    Other,
}

impl FileCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FileCategory::Image => "image",
            FileCategory::Office => "office",
            FileCategory::Pdf => "pdf",
            FileCategory::Zip => "zip",
            FileCategory::Video => "video",
            FileCategory::Other => "other",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProcessItem {
    pub path: PathBuf,
}

impl ProcessItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Política global de un lote. `overwrite_source` tiene prioridad sobre `output_dir`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessOptions {
    pub output_dir: Option<PathBuf>,
    pub copy_suffix: Option<String>,
    pub overwrite_source: bool,
    /// Solo aplica al sobrescribir: copia el original a `<nombre>.bak` antes de limpiar.
    pub keep_backup: bool,
}

impl ProcessOptions {
    pub fn into_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: Some(output_dir.into()),
            ..Self::default()
        }
    }

    pub fn overwrite() -> Self {
        Self {
            overwrite_source: true,
            ..Self::default()
        }
    }

    pub fn suffix(&self) -> &str {
        self.copy_suffix
            .as_deref()
            .unwrap_or(DEFAULT_COPY_SUFFIX)
    }

    /// Carga las opciones desde un archivo JSON con los nombres del puente (`outputDir`, ...).
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SanitizeError::io_at("cannot read options file", path, e))?;
        serde_json::from_str(&contents).map_err(|e| {
            SanitizeError::Config(format!(
                "invalid options file `{}`: {e}",
                path.display()
            ))
        })
    }
}

/// Destino calculado para un elemento; nunca se persiste.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedPath {
    pub output_path: PathBuf,
    pub backup_path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Success,
    Skipped,
    Error,
}

/// Resultado por elemento; mismo orden y cardinalidad que el lote de entrada.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub input_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub status: ProcessStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<Vec<String>>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub category: Option<FileCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ProcessResult {
    pub fn success(
        input_path: &Path,
        output_path: &Path,
        category: FileCategory,
        removed: Vec<String>,
    ) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            output_path: Some(output_path.to_path_buf()),
            status: ProcessStatus::Success,
            removed: Some(removed),
            category: Some(category),
            message: None,
            error_kind: None,
        }
    }

    pub fn failure(input_path: &Path, output_path: Option<&Path>, error: &SanitizeError) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            output_path: output_path.map(Path::to_path_buf),
            status: ProcessStatus::Error,
            removed: None,
            category: None,
            message: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }

    pub fn skipped(input_path: &Path, reason: &str) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            output_path: None,
            status: ProcessStatus::Skipped,
            removed: None,
            category: None,
            message: Some(reason.to_string()),
            error_kind: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ProcessStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_deserialize_from_bridge_names() {
        let options: ProcessOptions =
            serde_json::from_str(r#"{"outputDir":"/out","copySuffix":"-x"}"#)
                .expect("opciones válidas");
        assert_eq!(options.output_dir.as_deref(), Some(Path::new("/out")));
        assert_eq!(options.suffix(), "-x");
        assert!(!options.overwrite_source);
        assert!(!options.keep_backup);
    }

    #[test]
    fn suffix_defaults_to_clean() {
        assert_eq!(ProcessOptions::default().suffix(), "-clean");
    }

    #[test]
    fn success_result_serializes_type_and_omits_empty_fields() {
        let result = ProcessResult::success(
            Path::new("photo.jpg"),
            Path::new("/out/photo-clean.jpg"),
            FileCategory::Image,
            vec!["EXIF metadata".to_string()],
        );
        let value = serde_json::to_value(&result).expect("serializable");
        assert_eq!(value["status"], "success");
        assert_eq!(value["type"], "image");
        assert_eq!(value["outputPath"], "/out/photo-clean.jpg");
        assert!(value.get("message").is_none());
        assert!(value.get("errorKind").is_none());
    }

    #[test]
    fn failure_result_carries_message_and_kind() {
        let result = ProcessResult::failure(
            Path::new("notes.txt"),
            None,
            &SanitizeError::UnsupportedType,
        );
        let value = serde_json::to_value(&result).expect("serializable");
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "unsupported file type");
        assert_eq!(value["errorKind"], "unsupported_type");
        assert!(value.get("type").is_none());
    }
}
