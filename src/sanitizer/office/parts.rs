//! Sustitución de partes de comentarios y autores por documentos vacíos.
//!
//! Las partes se vacían en lugar de borrarse: sus relaciones siguen apuntando
//! a ellas y un destino ausente deja el paquete corrupto.

use tracing::debug;

use crate::capabilities::Package;

use super::constants::{
    SHEET_COMMENTS_EMPTY, SHEET_PERSONS_EMPTY, SHEET_THREADED_COMMENTS_EMPTY,
    SLIDE_AUTHORS_EMPTY, SLIDE_COMMENT_AUTHORS_EMPTY, SLIDE_COMMENTS_EMPTY,
    SLIDE_MODERN_COMMENTS_EMPTY, WORD_COMMENTS_EMPTY, WORD_COMMENTS_EXTENDED_EMPTY,
    WORD_COMMENTS_EXTENSIBLE_EMPTY, WORD_COMMENTS_IDS_EMPTY, WORD_PEOPLE_EMPTY,
};

#[derive(Clone, Copy, Debug)]
pub(super) enum PartPattern {
    Exact(&'static str),
    Prefix(&'static str),
}

impl PartPattern {
    fn matches(self, name: &str) -> bool {
        match self {
            PartPattern::Exact(expected) => name == expected,
            PartPattern::Prefix(prefix) => name.starts_with(prefix),
        }
    }
}

/// Una regla asocia un patrón de nombre con el documento vacío de su esquema.
#[derive(Clone, Copy, Debug)]
pub(super) struct EmptyPartRule {
    pub(super) pattern: PartPattern,
    pub(super) replacement: &'static str,
}

const fn rule(pattern: PartPattern, replacement: &'static str) -> EmptyPartRule {
    EmptyPartRule {
        pattern,
        replacement,
    }
}

pub(super) const WORD_RULES: &[EmptyPartRule] = &[
    rule(PartPattern::Exact("word/comments.xml"), WORD_COMMENTS_EMPTY),
    rule(
        PartPattern::Exact("word/commentsExtended.xml"),
        WORD_COMMENTS_EXTENDED_EMPTY,
    ),
    rule(PartPattern::Exact("word/commentsIds.xml"), WORD_COMMENTS_IDS_EMPTY),
    rule(
        PartPattern::Exact("word/commentsExtensible.xml"),
        WORD_COMMENTS_EXTENSIBLE_EMPTY,
    ),
    rule(PartPattern::Exact("word/people.xml"), WORD_PEOPLE_EMPTY),
];

pub(super) const SPREADSHEET_RULES: &[EmptyPartRule] = &[
    rule(PartPattern::Prefix("xl/comments"), SHEET_COMMENTS_EMPTY),
    rule(
        PartPattern::Prefix("xl/threadedComments/"),
        SHEET_THREADED_COMMENTS_EMPTY,
    ),
    rule(PartPattern::Exact("xl/persons/person.xml"), SHEET_PERSONS_EMPTY),
];

// El orden importa: la primera regla que coincide gana.
pub(super) const PRESENTATION_RULES: &[EmptyPartRule] = &[
    rule(
        PartPattern::Prefix("ppt/comments/modernComment"),
        SLIDE_MODERN_COMMENTS_EMPTY,
    ),
    rule(PartPattern::Prefix("ppt/comments/"), SLIDE_COMMENTS_EMPTY),
    rule(
        PartPattern::Exact("ppt/commentAuthors.xml"),
        SLIDE_COMMENT_AUTHORS_EMPTY,
    ),
    rule(PartPattern::Exact("ppt/authors.xml"), SLIDE_AUTHORS_EMPTY),
];

/// Vacía cada parte que coincide con alguna regla y devuelve las que cambiaron.
pub(super) fn empty_matching_parts(package: &mut Package, rules: &[EmptyPartRule]) -> Vec<String> {
    let candidates: Vec<String> = package
        .entries()
        .iter()
        .filter(|entry| !entry.is_dir && !entry.name.ends_with(".rels"))
        .map(|entry| entry.name.clone())
        .collect();

    let mut emptied = Vec::new();
    for name in candidates {
        let Some(rule) = rules.iter().find(|rule| rule.pattern.matches(&name)) else {
            continue;
        };
        if package.replace(&name, rule.replacement.as_bytes()) {
            debug!("Parte vaciada: {name}");
            emptied.push(name);
        }
    }
    emptied
}
