//! Limpieza de PDF: campos descriptivos en blanco, sin XMP ni anotaciones.

use std::path::Path;
use tracing::debug;

use crate::capabilities::PdfDocument;
use crate::error::Result;

use super::RemovedItems;

/// Campos del diccionario Info que se dejan presentes pero vacíos.
pub const INFO_FIELDS: [&str; 6] = [
    "Title", "Author", "Subject", "Keywords", "Producer", "Creator",
];

pub fn sanitize_pdf<D: PdfDocument>(input: &Path, destination: &Path) -> Result<RemovedItems> {
    let mut document = D::load_permissive(input)?;
    let mut removed = RemovedItems::new();

    for field in INFO_FIELDS {
        if document.replace_info_field(field, "")?.is_some() {
            removed.push(format!("{field} field"));
        }
    }
    if document.replace_language("")?.is_some() {
        removed.push("Language field".to_string());
    }

    if document.remove_xmp_metadata()? {
        removed.push("XMP metadata stream".to_string());
    }

    let mut annotated_pages = 0;
    for page in document.pages() {
        if document.remove_annotations(page)? {
            annotated_pages += 1;
        }
    }
    if annotated_pages > 0 {
        removed.push(format!("annotations on {annotated_pages} page(s)"));
    }

    debug!("PDF limpio, {} elementos eliminados", removed.len());
    document.save_without_object_streams(destination)?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::LopdfDocument;
    use crate::error::ErrorKind;
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, IncrementalDocument, Object, ObjectId, Stream, dictionary};
    use md5::{Digest, Md5};
    use std::fs;
    use tempfile::tempdir;

    type TestResult<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;

    /// Relleno estándar de contraseñas del manejador de seguridad `Standard`.
    const PASSWORD_PADDING: [u8; 32] = [
        0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
        0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
        0x69, 0x7A,
    ];

    fn build_sample_pdf(path: &Path) -> TestResult {
        sample_document()?.save(path)?;
        Ok(())
    }

    /// Documento de dos páginas con Info, XMP, idioma y una anotación en la primera.
    fn sample_document() -> TestResult<Document> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal("Quarterly figures")]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let annotation_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Text",
            "Rect" => vec![10.into(), 10.into(), 30.into(), 30.into()],
            "Contents" => Object::string_literal("reviewed by jdoe"),
        });

        let first_page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Annots" => vec![annotation_id.into()],
        });
        let second_page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![first_page.into(), second_page.into()],
                "Count" => 2,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );

        let xmp_id = doc.add_object(Stream::new(
            dictionary! { "Type" => "Metadata", "Subtype" => "XML" },
            b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/>".to_vec(),
        ));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "Metadata" => xmp_id,
            "Lang" => Object::string_literal("es-AR"),
        });
        doc.trailer.set("Root", catalog_id);

        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Q3 board report"),
            "Author" => Object::string_literal("Jane Roe"),
            "Producer" => Object::string_literal("WriterSuite 7.1"),
            "Subject" => Object::string_literal(""),
        });
        doc.trailer.set("Info", info_id);

        Ok(doc)
    }

    fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut state: Vec<u8> = (0..=255).collect();
        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
            state.swap(i, usize::from(j));
        }

        let (mut i, mut j) = (0u8, 0u8);
        data.iter()
            .map(|byte| {
                i = i.wrapping_add(1);
                j = j.wrapping_add(state[usize::from(i)]);
                state.swap(usize::from(i), usize::from(j));
                let index = state[usize::from(i)].wrapping_add(state[usize::from(j)]);
                byte ^ state[usize::from(index)]
            })
            .collect()
    }

    /// Cifra el diccionario Info con RC4 de 40 bits (revisión 2) y contraseña de usuario
    /// vacía. Con `valid_user_entry = false` la entrada `/U` no corresponde a ninguna clave.
    fn protect_with_empty_password(doc: &mut Document, valid_user_entry: bool) -> TestResult {
        let owner_entry = [0x5A_u8; 32];
        let permissions: i32 = -4;
        let file_id = b"metaclean-fixture-0001".to_vec();

        let mut hasher = Md5::new();
        hasher.update(PASSWORD_PADDING);
        hasher.update(owner_entry);
        hasher.update(permissions.to_le_bytes());
        hasher.update(&file_id);
        let file_key = hasher.finalize()[..5].to_vec();

        let info_id = doc.trailer.get(b"Info").and_then(Object::as_reference)?;
        let info_key = object_key(&file_key, info_id);
        for (_, value) in doc.get_object_mut(info_id).and_then(Object::as_dict_mut)?.iter_mut() {
            if let Object::String(bytes, _) = value {
                *bytes = rc4(&info_key, bytes);
            }
        }

        let user_entry = if valid_user_entry {
            rc4(&file_key, &PASSWORD_PADDING)
        } else {
            vec![0x11; 32]
        };
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "Length" => 40,
            "O" => Object::string_literal(owner_entry.to_vec()),
            "U" => Object::string_literal(user_entry),
            "P" => i64::from(permissions),
        });
        doc.trailer.set("Encrypt", encrypt_id);
        doc.trailer.set(
            "ID",
            vec![
                Object::string_literal(file_id.clone()),
                Object::string_literal(file_id),
            ],
        );
        Ok(())
    }

    fn object_key(file_key: &[u8], (number, generation): ObjectId) -> Vec<u8> {
        let mut hasher = Md5::new();
        hasher.update(file_key);
        hasher.update(&number.to_le_bytes()[..3]);
        hasher.update(generation.to_le_bytes());
        hasher.finalize()[..file_key.len() + 5].to_vec()
    }

    fn info_value(doc: &Document, key: &[u8]) -> Option<Vec<u8>> {
        let info = doc
            .trailer
            .get(b"Info")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_dictionary(id))
            .ok()?;
        info.get(key)
            .and_then(Object::as_str)
            .ok()
            .map(<[u8]>::to_vec)
    }

    #[test]
    fn descriptive_fields_xmp_and_annotations_are_removed() -> TestResult {
        let dir = tempdir()?;
        let source = dir.path().join("report.pdf");
        let output = dir.path().join("report-clean.pdf");
        build_sample_pdf(&source)?;

        let removed = sanitize_pdf::<LopdfDocument>(&source, &output)?;
        assert_eq!(
            removed,
            vec![
                "Title field",
                "Author field",
                "Producer field",
                "Language field",
                "XMP metadata stream",
                "annotations on 1 page(s)",
            ]
        );

        let cleaned = Document::load(&output)?;
        for field in INFO_FIELDS {
            assert_eq!(
                info_value(&cleaned, field.as_bytes()),
                Some(Vec::new()),
                "{field} debe existir vacío"
            );
        }

        let catalog = cleaned.catalog()?;
        assert!(catalog.get(b"Metadata").is_err());
        assert_eq!(catalog.get(b"Lang").and_then(Object::as_str)?, b"");

        for page in cleaned.get_pages().into_values() {
            assert!(cleaned.get_dictionary(page)?.get(b"Annots").is_err());
        }
        assert_eq!(cleaned.get_pages().len(), 2);
        Ok(())
    }

    #[test]
    fn second_pass_reports_nothing() -> TestResult {
        let dir = tempdir()?;
        let source = dir.path().join("report.pdf");
        let first = dir.path().join("first.pdf");
        let second = dir.path().join("second.pdf");
        build_sample_pdf(&source)?;

        sanitize_pdf::<LopdfDocument>(&source, &first)?;
        let removed = sanitize_pdf::<LopdfDocument>(&first, &second)?;
        assert!(removed.is_empty(), "{removed:?}");
        Ok(())
    }

    #[test]
    fn incremental_update_is_rewritten_as_a_single_revision() -> TestResult {
        let dir = tempdir()?;
        let source = dir.path().join("report.pdf");
        let updated = dir.path().join("report-updated.pdf");
        let output = dir.path().join("report-clean.pdf");
        build_sample_pdf(&source)?;

        let mut incremental = IncrementalDocument::load(&source)?;
        let info_id = incremental
            .get_prev_documents()
            .trailer
            .get(b"Info")
            .and_then(Object::as_reference)?;
        incremental.opt_clone_object_to_new_document(info_id)?;
        incremental
            .new_document
            .get_object_mut(info_id)
            .and_then(Object::as_dict_mut)?
            .set("Title", Object::string_literal("Q3 board report (rev. 2)"));
        incremental.save(&updated)?;
        assert!(Document::load(&updated)?.trailer.get(b"Prev").is_ok());

        let removed = sanitize_pdf::<LopdfDocument>(&updated, &output)?;
        assert!(removed.iter().any(|item| item == "Title field"));

        let cleaned = Document::load(&output)?;
        assert!(cleaned.trailer.get(b"Prev").is_err());
        assert!(cleaned.trailer.get(b"XRefStm").is_err());
        assert_eq!(cleaned.get_pages().len(), 2);
        assert_eq!(info_value(&cleaned, b"Title"), Some(Vec::new()));

        let again = sanitize_pdf::<LopdfDocument>(&output, &dir.path().join("again.pdf"))?;
        assert!(again.is_empty(), "{again:?}");
        Ok(())
    }

    #[test]
    fn missing_language_is_added_empty_without_reporting() -> TestResult {
        let dir = tempdir()?;
        let source = dir.path().join("plain.pdf");
        let output = dir.path().join("plain-clean.pdf");
        let mut doc = sample_document()?;
        let root = doc.trailer.get(b"Root").and_then(Object::as_reference)?;
        doc.get_object_mut(root).and_then(Object::as_dict_mut)?.remove(b"Lang");
        doc.save(&source)?;

        let removed = sanitize_pdf::<LopdfDocument>(&source, &output)?;
        assert!(!removed.iter().any(|item| item == "Language field"));

        let cleaned = Document::load(&output)?;
        assert_eq!(cleaned.catalog()?.get(b"Lang").and_then(Object::as_str)?, b"");
        Ok(())
    }

    #[test]
    fn empty_user_password_is_decrypted_and_encryption_dropped() -> TestResult {
        let dir = tempdir()?;
        let source = dir.path().join("locked.pdf");
        let output = dir.path().join("locked-clean.pdf");
        let mut doc = sample_document()?;
        protect_with_empty_password(&mut doc, true)?;
        doc.save(&source)?;

        let removed = sanitize_pdf::<LopdfDocument>(&source, &output)?;
        assert!(removed.iter().any(|item| item == "Title field"));
        assert!(removed.iter().any(|item| item == "Author field"));

        let cleaned = Document::load(&output)?;
        assert!(cleaned.trailer.get(b"Encrypt").is_err());
        for field in INFO_FIELDS {
            assert_eq!(info_value(&cleaned, field.as_bytes()), Some(Vec::new()));
        }
        assert_eq!(cleaned.get_pages().len(), 2);
        Ok(())
    }

    #[test]
    fn undecryptable_pdf_is_still_cleaned() -> TestResult {
        let dir = tempdir()?;
        let source = dir.path().join("locked.pdf");
        let output = dir.path().join("locked-clean.pdf");
        let mut doc = sample_document()?;
        protect_with_empty_password(&mut doc, false)?;
        doc.save(&source)?;

        let removed = sanitize_pdf::<LopdfDocument>(&source, &output)?;
        assert!(removed.iter().any(|item| item == "Title field"));
        assert!(removed.iter().any(|item| item == "XMP metadata stream"));

        let written = fs::read(&output)?;
        let contains = |needle: &[u8]| written.windows(needle.len()).any(|w| w == needle);
        assert!(contains(b"/Encrypt"));
        assert!(!contains(b"/Prev"));
        assert!(!contains(b"adobe:ns:meta"));
        Ok(())
    }

    #[test]
    fn corrupt_pdf_is_a_decode_error() -> TestResult {
        let dir = tempdir()?;
        let source = dir.path().join("broken.pdf");
        fs::write(&source, b"%PDF-1.4\nthis is not an object graph")?;

        let error =
            sanitize_pdf::<LopdfDocument>(&source, &dir.path().join("out.pdf")).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Decode);
        Ok(())
    }
}
