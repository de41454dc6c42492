//! Acceso a documentos PDF mediante `lopdf`.

use lopdf::xref::XrefType;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Result, SanitizeError};

/// Claves del trailer que siguen siendo válidas tras reescribir el documento.
const TRAILER_KEYS: [&[u8]; 4] = [b"Root", b"Info", b"ID", b"Encrypt"];

/// Identificador de página tal como lo expone el documento.
pub type PageRef = ObjectId;

/// Operaciones sobre un PDF cargado que necesita el limpiador.
pub trait PdfDocument: Sized {
    /// Carga tolerando banderas de cifrado si el documento es legible.
    fn load_permissive(path: &Path) -> Result<Self>;

    /// Fija un campo del diccionario Info y devuelve el valor previo no vacío.
    fn replace_info_field(&mut self, key: &str, value: &str) -> Result<Option<String>>;

    /// Fija el idioma del catálogo, creándolo si falta, y devuelve el valor previo no vacío.
    fn replace_language(&mut self, value: &str) -> Result<Option<String>>;

    fn remove_xmp_metadata(&mut self) -> Result<bool>;

    fn pages(&self) -> Vec<PageRef>;

    fn remove_annotations(&mut self, page: PageRef) -> Result<bool>;

    /// Serializa con tabla de referencias clásica, sin flujos de objetos.
    fn save_without_object_streams(&mut self, destination: &Path) -> Result<()>;
}

pub struct LopdfDocument {
    document: Document,
}

impl LopdfDocument {
    pub fn into_inner(self) -> Document {
        self.document
    }

    fn catalog_mut(&mut self) -> Result<&mut Dictionary> {
        let root = self
            .document
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|e| SanitizeError::decode(format!("missing document catalog: {e}")))?;
        self.document
            .get_object_mut(root)
            .and_then(Object::as_dict_mut)
            .map_err(|e| SanitizeError::decode(format!("invalid document catalog: {e}")))
    }

    fn info_mut(&mut self) -> Result<&mut Dictionary> {
        let existing = match self.document.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => Some(Some(*id)),
            Ok(Object::Dictionary(_)) => Some(None),
            _ => None,
        };
        let info_ref = match existing {
            Some(found) => found,
            None => {
                let id = self.document.add_object(Dictionary::new());
                self.document.trailer.set("Info", id);
                Some(id)
            }
        };

        let info = match info_ref {
            Some(id) => self.document.get_object_mut(id),
            None => self.document.trailer.get_mut(b"Info"),
        };
        info.and_then(Object::as_dict_mut)
            .map_err(|e| SanitizeError::decode(format!("invalid Info dictionary: {e}")))
    }

    fn text_value(&self, object: &Object) -> Option<String> {
        match object {
            Object::String(bytes, _) => Some(decode_pdf_text(bytes)),
            Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
            Object::Reference(id) => self
                .document
                .get_object(*id)
                .ok()
                .and_then(|inner| self.text_value(inner)),
            _ => None,
        }
    }

    fn current_info_value(&self, key: &str) -> Option<String> {
        let info = match self.document.trailer.get(b"Info").ok()? {
            Object::Reference(id) => self.document.get_dictionary(*id).ok()?,
            Object::Dictionary(dict) => dict,
            _ => return None,
        };
        info.get(key.as_bytes())
            .ok()
            .and_then(|value| self.text_value(value))
    }

    fn current_language(&self) -> Option<String> {
        let root = self.document.trailer.get(b"Root").ok()?.as_reference().ok()?;
        let catalog = self.document.get_dictionary(root).ok()?;
        catalog
            .get(b"Lang")
            .ok()
            .and_then(|value| self.text_value(value))
    }

    /// Descarta objetos de flujo y tablas en flujo que el escritor clásico no necesita.
    fn drop_stream_containers(&mut self) {
        let containers: Vec<ObjectId> = self
            .document
            .objects
            .iter()
            .filter_map(|(id, object)| match object {
                Object::Stream(stream)
                    if matches!(
                        stream.dict.get(b"Type").and_then(Object::as_name),
                        Ok(b"ObjStm") | Ok(b"XRef")
                    ) =>
                {
                    Some(*id)
                }
                _ => None,
            })
            .collect();

        for id in containers {
            self.document.objects.remove(&id);
        }
        self.document.reference_table.cross_reference_type = XrefType::CrossReferenceTable;
    }

    /// El trailer cargado puede traer `/Prev`, `/XRefStm` o claves de un flujo XRef
    /// que ya no valen para un archivo reescrito entero; `Size` lo fija el escritor.
    fn rebuild_trailer(&mut self) {
        let mut trailer = Dictionary::new();
        for key in TRAILER_KEYS {
            if let Ok(value) = self.document.trailer.get(key) {
                trailer.set(key.to_vec(), value.clone());
            }
        }
        self.document.trailer = trailer;
    }
}

impl PdfDocument for LopdfDocument {
    fn load_permissive(path: &Path) -> Result<Self> {
        let mut document = Document::load(path)
            .map_err(|e| SanitizeError::decode(format!("cannot parse PDF document: {e}")))?;

        if document.is_encrypted() {
            match document.decrypt("") {
                Ok(()) => {
                    document.trailer.remove(b"Encrypt");
                    debug!("PDF cifrado con contraseña vacía; se continúa descifrado");
                }
                Err(error) => warn!("PDF cifrado no descifrable ({error}); se limpia igualmente"),
            }
        }

        Ok(Self { document })
    }

    fn replace_info_field(&mut self, key: &str, value: &str) -> Result<Option<String>> {
        let previous = self.current_info_value(key);
        self.info_mut()?
            .set(key.as_bytes().to_vec(), Object::string_literal(value));
        Ok(previous.filter(|text| !text.trim().is_empty() && text != value))
    }

    fn replace_language(&mut self, value: &str) -> Result<Option<String>> {
        let previous = self.current_language();
        self.catalog_mut()?.set("Lang", Object::string_literal(value));
        Ok(previous.filter(|text| !text.trim().is_empty() && text != value))
    }

    fn remove_xmp_metadata(&mut self) -> Result<bool> {
        let removed = self.catalog_mut()?.remove(b"Metadata");
        match removed {
            Some(Object::Reference(id)) => {
                self.document.objects.remove(&id);
                Ok(true)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    fn pages(&self) -> Vec<PageRef> {
        self.document.get_pages().into_values().collect()
    }

    fn remove_annotations(&mut self, page: PageRef) -> Result<bool> {
        let dict = self
            .document
            .get_object_mut(page)
            .and_then(Object::as_dict_mut)
            .map_err(|e| SanitizeError::decode(format!("invalid page object: {e}")))?;
        Ok(dict.remove(b"Annots").is_some())
    }

    fn save_without_object_streams(&mut self, destination: &Path) -> Result<()> {
        self.drop_stream_containers();
        self.rebuild_trailer();
        let pruned = self.document.prune_objects();
        debug!("Objetos huérfanos descartados: {}", pruned.len());
        self.document
            .save(destination)
            .map_err(|e| SanitizeError::io_at("cannot write PDF", destination, e))?;
        Ok(())
    }
}

/// Texto PDF: UTF-16BE con BOM o bytes en codificación de documento.
fn decode_pdf_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_pdf_text_handles_utf16_bom() {
        let bytes = [0xFE, 0xFF, 0x00, 0x4A, 0x00, 0x6F];
        assert_eq!(decode_pdf_text(&bytes), "Jo");
        assert_eq!(decode_pdf_text(b"plain"), "plain");
    }
}
