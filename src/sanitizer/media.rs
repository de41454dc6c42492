//! Remux por copia de flujos que descarta la metadata del contenedor.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::capabilities::{MediaProbe, MediaToolkit, RemuxOptions};
use crate::error::Result;

use super::RemovedItems;

pub fn sanitize_media(
    toolkit: &dyn MediaToolkit,
    input: &Path,
    destination: &Path,
) -> Result<RemovedItems> {
    let before = toolkit.probe(input)?;

    let options = RemuxOptions::strict(before.streams.len());
    toolkit.remux(input, destination, &options)?;

    // ffmpeg reescribe etiquetas propias como encoder; solo cuenta lo que ya no está.
    let after = toolkit.probe(destination)?;
    let removed = removed_between(&before, &after);

    debug!(
        "Remux completado con {} flujos, {} elementos eliminados: {}",
        before.streams.len(),
        removed.len(),
        destination.display()
    );
    Ok(removed)
}

/// Etiquetas ausentes o con otro valor en la salida, y capítulos perdidos.
fn removed_between(before: &MediaProbe, after: &MediaProbe) -> RemovedItems {
    let mut removed: RemovedItems = changed_tags(&before.format_tags, &after.format_tags)
        .map(|tag| format!("container tag: {tag}"))
        .collect();

    for stream in &before.streams {
        let remaining = after
            .streams
            .iter()
            .find(|candidate| candidate.index == stream.index)
            .map(|candidate| &candidate.tags);
        let empty = BTreeMap::new();
        removed.extend(
            changed_tags(&stream.tags, remaining.unwrap_or(&empty))
                .map(|tag| format!("stream {} tag: {tag}", stream.index)),
        );
    }

    let dropped = before.chapters.saturating_sub(after.chapters);
    if dropped > 0 {
        removed.push(format!("{dropped} chapter marker(s)"));
    }
    removed
}

fn changed_tags<'a>(
    before: &'a BTreeMap<String, String>,
    after: &'a BTreeMap<String, String>,
) -> impl Iterator<Item = &'a String> {
    before
        .iter()
        .filter(|(tag, value)| after.get(*tag) != Some(*value))
        .map(|(tag, _)| tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::MediaStream;
    use crate::error::{ErrorKind, SanitizeError};
    use std::cell::RefCell;
    use std::fs;
    use tempfile::tempdir;

    /// Simula ffprobe/ffmpeg: `before` describe la entrada, `after` lo que queda tras
    /// el remux, que solo copia la entrada.
    struct FakeToolkit {
        before: MediaProbe,
        after: MediaProbe,
        failure: Option<&'static str>,
        remuxes: RefCell<Vec<RemuxOptions>>,
    }

    impl FakeToolkit {
        fn new(before: MediaProbe) -> Self {
            Self {
                before,
                after: MediaProbe::default(),
                failure: None,
                remuxes: RefCell::new(Vec::new()),
            }
        }
    }

    impl MediaToolkit for FakeToolkit {
        fn probe(&self, _path: &Path) -> Result<MediaProbe> {
            if self.remuxes.borrow().is_empty() {
                Ok(self.before.clone())
            } else {
                Ok(self.after.clone())
            }
        }

        fn remux(&self, input: &Path, destination: &Path, options: &RemuxOptions) -> Result<()> {
            self.remuxes.borrow_mut().push(options.clone());
            if let Some(message) = self.failure {
                return Err(SanitizeError::tool(message));
            }
            fs::copy(input, destination)
                .map(|_| ())
                .map_err(|e| SanitizeError::io("copy", e))
        }
    }

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn tagged_probe() -> MediaProbe {
        MediaProbe {
            streams: vec![
                MediaStream {
                    index: 0,
                    codec_type: Some("video".to_string()),
                    tags: tags(&[("handler_name", "Core Media Video")]),
                },
                MediaStream {
                    index: 1,
                    codec_type: Some("audio".to_string()),
                    tags: BTreeMap::new(),
                },
            ],
            format_tags: tags(&[("creation_time", "2024-05-01T10:00:00Z"), ("title", "Beach")]),
            chapters: 3,
        }
    }

    #[test]
    fn report_lists_tags_and_chapters_and_remux_is_strict() -> Result<()> {
        let dir = tempdir().map_err(|e| SanitizeError::io("tempdir", e))?;
        let source = dir.path().join("clip.mp4");
        let output = dir.path().join("clip-clean.mp4");
        fs::write(&source, b"fake media").map_err(|e| SanitizeError::io("write", e))?;

        let toolkit = FakeToolkit::new(tagged_probe());
        let removed = sanitize_media(&toolkit, &source, &output)?;

        assert_eq!(
            removed,
            vec![
                "container tag: creation_time",
                "container tag: title",
                "stream 0 tag: handler_name",
                "3 chapter marker(s)",
            ]
        );
        assert_eq!(*toolkit.remuxes.borrow(), vec![RemuxOptions::strict(2)]);
        assert!(output.exists());
        Ok(())
    }

    #[test]
    fn tags_rewritten_by_the_muxer_are_not_reported() -> Result<()> {
        let dir = tempdir().map_err(|e| SanitizeError::io("tempdir", e))?;
        let source = dir.path().join("clip.mp4");
        let output = dir.path().join("clip-clean.mp4");
        fs::write(&source, b"fake media").map_err(|e| SanitizeError::io("write", e))?;

        let mut before = tagged_probe();
        before.format_tags.insert("major_brand".to_string(), "isom".to_string());
        before.format_tags.insert("encoder".to_string(), "HandBrake 1.6".to_string());
        let mut after = before.clone();
        after.format_tags = tags(&[("major_brand", "isom"), ("encoder", "Lavf60.16.100")]);
        after.chapters = 0;

        let toolkit = FakeToolkit {
            after,
            ..FakeToolkit::new(before)
        };
        let removed = sanitize_media(&toolkit, &source, &output)?;

        assert_eq!(
            removed,
            vec![
                "container tag: creation_time",
                "container tag: encoder",
                "container tag: title",
                "3 chapter marker(s)",
            ]
        );
        Ok(())
    }

    #[test]
    fn untagged_media_reports_nothing() -> Result<()> {
        let dir = tempdir().map_err(|e| SanitizeError::io("tempdir", e))?;
        let source = dir.path().join("song.flac");
        fs::write(&source, b"fake").map_err(|e| SanitizeError::io("write", e))?;

        let toolkit = FakeToolkit::new(MediaProbe::default());
        let removed = sanitize_media(&toolkit, &source, &dir.path().join("out.flac"))?;
        assert!(removed.is_empty());
        Ok(())
    }

    #[test]
    fn remux_failure_is_passed_through_verbatim() {
        let toolkit = FakeToolkit {
            failure: Some("moov atom not found"),
            ..FakeToolkit::new(tagged_probe())
        };
        let error =
            sanitize_media(&toolkit, Path::new("in.mp4"), Path::new("out.mp4")).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Tool);
        assert_eq!(error.to_string(), "moov atom not found");
    }
}
