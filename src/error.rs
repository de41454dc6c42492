//! Taxonomía de errores del motor de limpieza.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SanitizeError>;

/// Mensaje genérico cuando un contenedor no se puede interpretar.
pub const DOCUMENT_DECODE_MESSAGE: &str =
    "cannot parse document — possibly corrupt or unsupported binary format";

#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("unsupported file type")]
    UnsupportedType,

    #[error("{0}")]
    UnsupportedLegacyFormat(String),

    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Config(String),

    /// Fallo de una herramienta externa; el mensaje se expone tal cual.
    #[error("{0}")]
    Tool(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

/// Etiqueta estable del tipo de error, serializada en cada resultado fallido.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedType,
    UnsupportedLegacyFormat,
    Decode,
    Config,
    Tool,
    Io,
}

impl SanitizeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SanitizeError::UnsupportedType => ErrorKind::UnsupportedType,
            SanitizeError::UnsupportedLegacyFormat(_) => ErrorKind::UnsupportedLegacyFormat,
            SanitizeError::Decode(_) => ErrorKind::Decode,
            SanitizeError::Config(_) => ErrorKind::Config,
            SanitizeError::Tool(_) => ErrorKind::Tool,
            SanitizeError::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        SanitizeError::Io {
            context: context.into(),
            source,
        }
    }

    /// Error de E/S asociado a una ruta concreta.
    pub fn io_at(action: &str, path: &Path, source: io::Error) -> Self {
        Self::io(format!("{action} `{}`", path.display()), source)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        SanitizeError::Decode(message.into())
    }

    pub fn tool(message: impl Into<String>) -> Self {
        SanitizeError::Tool(message.into())
    }
}
