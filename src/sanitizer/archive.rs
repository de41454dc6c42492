//! Reconstrucción de archivos ZIP genéricos.
//!
//! Cada entrada se copia con su contenido exacto, su fecha y su método de
//! compresión; el comentario del archivo y los atributos extendidos se pierden
//! por omisión.

use std::io::Cursor;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

use crate::capabilities::{ArchiveCodec, CompressionPolicy};
use crate::error::Result;

use super::{RemovedItems, read_input, write_output};

pub fn sanitize_archive(
    archives: &dyn ArchiveCodec,
    input: &Path,
    destination: &Path,
) -> Result<RemovedItems> {
    let bytes = read_input(input)?;
    let package = archives.open(&bytes)?;

    let mut removed = RemovedItems::new();
    if has_archive_comment(&bytes) {
        removed.push("archive comment".to_string());
    }

    let rebuilt = archives.serialize(&package, CompressionPolicy::Preserve)?;
    debug!(
        "ZIP reconstruido con {} entradas: {}",
        package.entries().len(),
        destination.display()
    );
    write_output(destination, &rebuilt)?;

    Ok(removed)
}

fn has_archive_comment(bytes: &[u8]) -> bool {
    ZipArchive::new(Cursor::new(bytes))
        .map(|archive| !archive.comment().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::ZipCodec;
    use std::fs::File;
    use std::io::{Read, Write};
    use tempfile::tempdir;
    use zip::write::FileOptions;
    use zip::{CompressionMethod, DateTime, ZipWriter};

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn create_sample_zip(path: &Path) -> TestResult {
        let mut writer = ZipWriter::new(File::create(path)?);
        let stamp = DateTime::from_date_and_time(2019, 3, 14, 15, 9, 26)?;

        writer.add_directory(
            "photos/",
            FileOptions::<'_, ()>::default().last_modified_time(stamp),
        )?;

        writer.start_file(
            "photos/raw.bin",
            FileOptions::<'_, ()>::default()
                .compression_method(CompressionMethod::Stored)
                .last_modified_time(stamp)
                .unix_permissions(0o755),
        )?;
        writer.write_all(&[0_u8, 1, 2, 3, 254, 255])?;

        writer.start_file(
            "notes.txt",
            FileOptions::<'_, ()>::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(stamp),
        )?;
        writer.write_all("texto repetido ".repeat(64).as_bytes())?;

        writer.set_comment("built by jdoe on workstation-42");
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn rebuild_keeps_members_and_drops_comment() -> TestResult {
        let dir = tempdir()?;
        let source = dir.path().join("bundle.zip");
        let output = dir.path().join("bundle-clean.zip");
        create_sample_zip(&source)?;

        let removed = sanitize_archive(&ZipCodec, &source, &output)?;
        assert_eq!(removed, vec!["archive comment"]);

        let mut original = ZipArchive::new(File::open(&source)?)?;
        let mut rebuilt = ZipArchive::new(File::open(&output)?)?;
        assert!(rebuilt.comment().is_empty());
        assert_eq!(original.len(), rebuilt.len());

        for i in 0..original.len() {
            let mut before = original.by_index(i)?;
            let mut after = rebuilt.by_index(i)?;
            assert_eq!(before.name(), after.name());
            assert_eq!(before.is_dir(), after.is_dir());
            assert_eq!(before.compression(), after.compression());
            assert_eq!(before.last_modified(), after.last_modified());

            let mut before_bytes = Vec::new();
            let mut after_bytes = Vec::new();
            before.read_to_end(&mut before_bytes)?;
            after.read_to_end(&mut after_bytes)?;
            assert_eq!(before_bytes, after_bytes);
        }

        Ok(())
    }

    #[test]
    fn second_pass_reports_nothing() -> TestResult {
        let dir = tempdir()?;
        let source = dir.path().join("bundle.zip");
        let first = dir.path().join("first.zip");
        let second = dir.path().join("second.zip");
        create_sample_zip(&source)?;

        sanitize_archive(&ZipCodec, &source, &first)?;
        let removed = sanitize_archive(&ZipCodec, &first, &second)?;
        assert!(removed.is_empty());
        Ok(())
    }

    #[test]
    fn corrupt_archive_is_a_decode_error() -> TestResult {
        let dir = tempdir()?;
        let source = dir.path().join("broken.zip");
        std::fs::write(&source, b"PK\x03\x04 truncated")?;

        let error = sanitize_archive(&ZipCodec, &source, &dir.path().join("out.zip")).unwrap_err();
        assert_eq!(error.kind(), crate::error::ErrorKind::Decode);
        Ok(())
    }
}
