//! Eliminación estructural de `w:trackRevisions` en `word/settings.xml`.
//!
//! El flujo se recorre con un lector consciente de espacios de nombres y el
//! elemento se descarta por identidad (espacio de nombres + nombre local), tanto
//! en su forma vacía como con etiqueta de cierre. El resto de eventos se copia
//! sin modificar.

use quick_xml::events::Event;
use quick_xml::name::{Namespace, QName, ResolveResult};
use quick_xml::{NsReader, Writer};

use super::constants::W_NS;

const TRACK_REVISIONS: &[u8] = b"trackRevisions";

/// Devuelve el XML sin el marcador, o `None` si no había nada que quitar.
pub(super) fn strip_track_revisions(xml: &[u8]) -> Result<Option<Vec<u8>>, quick_xml::Error> {
    let mut reader = NsReader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();
    let mut removed = false;

    loop {
        let (namespace, event) = reader.read_resolved_event_into(&mut buf)?;
        let in_word_namespace =
            matches!(namespace, ResolveResult::Bound(Namespace(uri)) if uri == W_NS.as_bytes());
        let is_marker = in_word_namespace
            && match &event {
                Event::Start(element) | Event::Empty(element) => {
                    element.local_name().as_ref() == TRACK_REVISIONS
                }
                _ => false,
            };

        match event {
            Event::Eof => break,
            Event::Empty(_) if is_marker => removed = true,
            Event::Start(element) if is_marker => {
                let end = element.name().as_ref().to_vec();
                reader.read_to_end_into(QName(&end), &mut skip_buf)?;
                skip_buf.clear();
                removed = true;
            }
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    Ok(removed.then(|| writer.into_inner()))
}
