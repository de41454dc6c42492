//! Limpieza de referencias a partes eliminadas (`*.rels` y `[Content_Types].xml`).

use std::collections::HashSet;
use std::io::Cursor;
use tracing::{debug, warn};
use xmltree::{Element, EmitterConfig, XMLNode};

use crate::capabilities::Package;

use super::constants::CONTENT_TYPES_PART;

/// Quita relaciones internas y `Override` que apuntan a partes ya eliminadas.
/// Un XML ilegible se deja como está.
pub(super) fn prune_references(package: &mut Package, removed_parts: &[String]) {
    if removed_parts.is_empty() {
        return;
    }
    let removed: HashSet<&str> = removed_parts.iter().map(String::as_str).collect();

    let relationship_parts: Vec<String> = package
        .names()
        .filter(|name| name.ends_with(".rels"))
        .map(str::to_string)
        .collect();

    for name in relationship_parts {
        let base = relationship_base(&name);
        let outcome = package.read(&name).map(|contents| {
            prune_children(contents, |element| {
                element.name == "Relationship"
                    && element.attributes.get("TargetMode").map(String::as_str) != Some("External")
                    && element.attributes.get("Target").is_some_and(|target| {
                        removed.contains(resolve_target(base, target).as_str())
                    })
            })
        });
        apply_outcome(package, &name, outcome);
    }

    let outcome = package.read(CONTENT_TYPES_PART).map(|contents| {
        prune_children(contents, |element| {
            element.name == "Override"
                && element
                    .attributes
                    .get("PartName")
                    .is_some_and(|part| removed.contains(part.trim_start_matches('/')))
        })
    });
    apply_outcome(package, CONTENT_TYPES_PART, outcome);
}

fn apply_outcome(
    package: &mut Package,
    name: &str,
    outcome: Option<Result<Option<Vec<u8>>, String>>,
) {
    match outcome {
        Some(Ok(Some(updated))) => {
            package.replace(name, &updated);
            debug!("Referencias depuradas en {name}");
        }
        Some(Err(error)) => warn!("No se pudieron depurar referencias en {name}: {error}"),
        Some(Ok(None)) | None => {}
    }
}

/// Directorio desde el que se resuelven los destinos de un `.rels`.
fn relationship_base(rels_name: &str) -> &str {
    rels_name
        .rsplit_once("_rels/")
        .map(|(dir, _)| dir)
        .unwrap_or("")
}

/// Resuelve un destino relativo al nombre de parte absoluto dentro del paquete.
fn resolve_target(base: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{base}{target}"),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn prune_children<F>(contents: &[u8], mut should_drop: F) -> Result<Option<Vec<u8>>, String>
where
    F: FnMut(&Element) -> bool,
{
    let mut root = Element::parse(Cursor::new(contents))
        .map_err(|e| format!("Error leyendo XML de relaciones: {e}"))?;

    let before = root.children.len();
    root.children.retain(|node| match node {
        XMLNode::Element(element) => !should_drop(element),
        _ => true,
    });
    if root.children.len() == before {
        return Ok(None);
    }

    let mut output = Vec::new();
    let mut config = EmitterConfig::new();
    config.perform_indent = false;
    config.write_document_declaration = true;
    root.write_with_config(&mut output, config)
        .map_err(|e| format!("Error escribiendo XML depurado: {e}"))?;

    Ok(Some(output))
}
