//! Paquetes ZIP en memoria: lectura de entradas, edición y serialización.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::io::{Cursor, Read, Write};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, SanitizeError};

/// Método de compresión de una entrada, reducido a lo que `ZipWriter` sabe escribir.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryCompression {
    Stored,
    Deflated,
    Bzip2,
    Zstd,
}

impl EntryCompression {
    /// Deflate64, LZMA, AES y métodos desconocidos solo se leen; se reescriben con deflate.
    fn from_zip(method: CompressionMethod) -> Self {
        match method {
            CompressionMethod::Stored => EntryCompression::Stored,
            CompressionMethod::Deflated => EntryCompression::Deflated,
            CompressionMethod::Bzip2 => EntryCompression::Bzip2,
            CompressionMethod::Zstd => EntryCompression::Zstd,
            other => {
                debug!("Método {other:?} no se reescribe; se usará deflate");
                EntryCompression::Deflated
            }
        }
    }

    fn to_zip(self) -> CompressionMethod {
        match self {
            EntryCompression::Stored => CompressionMethod::Stored,
            EntryCompression::Deflated => CompressionMethod::Deflated,
            EntryCompression::Bzip2 => CompressionMethod::Bzip2,
            EntryCompression::Zstd => CompressionMethod::Zstd,
        }
    }
}

/// Cómo comprimir al serializar: conservar el método de cada entrada o forzar deflate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressionPolicy {
    Preserve,
    Deflate,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArchiveEntry {
    pub name: String,
    pub is_dir: bool,
    pub content: Vec<u8>,
    pub modified: Option<NaiveDateTime>,
    pub compression: EntryCompression,
}

impl ArchiveEntry {
    pub fn file(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            content,
            modified: None,
            compression: EntryCompression::Deflated,
        }
    }
}

/// Contenedor editable de entradas con nombre, en el orden original.
#[derive(Clone, Debug, Default)]
pub struct Package {
    entries: Vec<ArchiveEntry>,
}

impl Package {
    pub fn new(entries: Vec<ArchiveEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    pub fn read(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| !entry.is_dir && entry.name == name)
            .map(|entry| entry.content.as_slice())
    }

    /// Sustituye el contenido de una entrada existente; devuelve si cambió algo.
    pub fn replace(&mut self, name: &str, content: &[u8]) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| !entry.is_dir && entry.name == name)
        {
            Some(entry) if entry.content != content => {
                entry.content = content.to_vec();
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.name != name);
        self.entries.len() != before
    }

    /// Elimina todas las entradas bajo `prefix` y devuelve sus nombres.
    pub fn remove_prefix(&mut self, prefix: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.entries.retain(|entry| {
            if entry.name.starts_with(prefix) {
                removed.push(entry.name.clone());
                false
            } else {
                true
            }
        });
        removed
    }
}

pub trait ArchiveCodec {
    fn open(&self, bytes: &[u8]) -> Result<Package>;
    fn serialize(&self, package: &Package, policy: CompressionPolicy) -> Result<Vec<u8>>;
}

/// Implementación sobre el crate `zip`. El comentario del archivo y los campos
/// extra de cada entrada no se copian nunca.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipCodec;

impl ArchiveCodec for ZipCodec {
    fn open(&self, bytes: &[u8]) -> Result<Package> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| SanitizeError::decode(format!("not a valid zip archive: {e}")))?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| SanitizeError::decode(format!("cannot read zip entry: {e}")))?;

            let name = file.name().to_string();
            let is_dir = file.is_dir();
            let modified = file.last_modified().and_then(zip_time_to_naive);
            let compression = EntryCompression::from_zip(file.compression());

            let mut content = Vec::new();
            if !is_dir {
                file.read_to_end(&mut content).map_err(|e| {
                    SanitizeError::decode(format!("cannot read zip entry `{name}`: {e}"))
                })?;
            }

            entries.push(ArchiveEntry {
                name,
                is_dir,
                content,
                modified,
                compression,
            });
        }

        Ok(Package::new(entries))
    }

    fn serialize(&self, package: &Package, policy: CompressionPolicy) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in package.entries() {
            let compression = match policy {
                CompressionPolicy::Preserve => entry.compression,
                CompressionPolicy::Deflate => EntryCompression::Deflated,
            };

            // Sin fecha válida se usa la época DOS; nunca la hora actual.
            let modified = entry
                .modified
                .and_then(naive_to_zip_time)
                .unwrap_or_default();
            let options = FileOptions::<'_, ()>::default()
                .compression_method(compression.to_zip())
                .large_file(entry.content.len() as u64 >= u64::from(u32::MAX))
                .last_modified_time(modified);

            if entry.is_dir {
                writer
                    .add_directory(entry.name.as_str(), options)
                    .map_err(|e| SanitizeError::tool(format!("cannot write zip directory: {e}")))?;
                continue;
            }

            writer
                .start_file(entry.name.as_str(), options)
                .map_err(|e| SanitizeError::tool(format!("cannot write zip entry: {e}")))?;
            writer
                .write_all(&entry.content)
                .map_err(|e| SanitizeError::io("cannot write zip entry", e))?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| SanitizeError::tool(format!("cannot finalize zip archive: {e}")))?;
        Ok(cursor.into_inner())
    }
}

fn zip_time_to_naive(time: zip::DateTime) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(
        i32::from(time.year()),
        u32::from(time.month()),
        u32::from(time.day()),
    )?
    .and_hms_opt(
        u32::from(time.hour()),
        u32::from(time.minute()),
        u32::from(time.second()),
    )
}

fn naive_to_zip_time(time: NaiveDateTime) -> Option<zip::DateTime> {
    zip::DateTime::from_date_and_time(
        u16::try_from(time.year()).ok()?,
        u8::try_from(time.month()).ok()?,
        u8::try_from(time.day()).ok()?,
        u8::try_from(time.hour()).ok()?,
        u8::try_from(time.minute()).ok()?,
        u8::try_from(time.second()).ok()?,
    )
    .ok()
}
