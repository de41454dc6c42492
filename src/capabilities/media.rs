//! Sondeo y remux de contenedores de audio/video con `ffprobe` y `ffmpeg`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::error::{Result, SanitizeError};

pub const FFMPEG_ENV: &str = "METACLEAN_FFMPEG";
pub const FFPROBE_ENV: &str = "METACLEAN_FFPROBE";

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MediaStream {
    pub index: usize,
    pub codec_type: Option<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MediaProbe {
    pub streams: Vec<MediaStream>,
    pub format_tags: BTreeMap<String, String>,
    pub chapters: usize,
}

/// Instrucciones del remux; todas activas por defecto.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemuxOptions {
    pub drop_global_metadata: bool,
    pub drop_chapters: bool,
    pub clear_encoder_tag: bool,
    pub bitexact: bool,
    pub stream_count: usize,
}

impl RemuxOptions {
    pub fn strict(stream_count: usize) -> Self {
        Self {
            drop_global_metadata: true,
            drop_chapters: true,
            clear_encoder_tag: true,
            bitexact: true,
            stream_count,
        }
    }
}

pub trait MediaToolkit {
    fn probe(&self, path: &Path) -> Result<MediaProbe>;
    fn remux(&self, input: &Path, destination: &Path, options: &RemuxOptions) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct FfmpegToolkit {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegToolkit {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Usa `METACLEAN_FFMPEG` / `METACLEAN_FFPROBE` si están definidas.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg: env::var_os(FFMPEG_ENV).map(PathBuf::from).unwrap_or(defaults.ffmpeg),
            ffprobe: env::var_os(FFPROBE_ENV).map(PathBuf::from).unwrap_or(defaults.ffprobe),
        }
    }
}

impl MediaToolkit for FfmpegToolkit {
    fn probe(&self, path: &Path) -> Result<MediaProbe> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json"])
            .args(["-show_format", "-show_streams", "-show_chapters"])
            .arg(path)
            .output()
            .map_err(|e| SanitizeError::tool(format!("cannot run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(SanitizeError::tool(failure_message(
                "ffprobe",
                &output.status,
                &output.stderr,
            )));
        }

        parse_probe_output(&output.stdout)
    }

    fn remux(&self, input: &Path, destination: &Path, options: &RemuxOptions) -> Result<()> {
        let arguments = remux_arguments(input, destination, options);
        debug!("ffmpeg {:?}", arguments);

        let output = Command::new(&self.ffmpeg)
            .args(&arguments)
            .output()
            .map_err(|e| SanitizeError::tool(format!("cannot run ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(SanitizeError::tool(failure_message(
                "ffmpeg",
                &output.status,
                &output.stderr,
            )));
        }

        Ok(())
    }
}

/// Argumentos de un remux por copia de flujos que descarta la metadata del contenedor.
pub fn remux_arguments(input: &Path, destination: &Path, options: &RemuxOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    args.extend(["-map", "0", "-c", "copy"].map(OsString::from));

    if options.drop_global_metadata {
        args.extend(["-map_metadata", "-1"].map(OsString::from));
    }
    if options.drop_chapters {
        args.extend(["-map_chapters", "-1"].map(OsString::from));
    }
    if options.clear_encoder_tag {
        args.extend(["-metadata", "encoder="].map(OsString::from));
    }
    if options.bitexact {
        args.extend(["-fflags", "+bitexact", "-flags", "+bitexact"].map(OsString::from));
        for index in 0..options.stream_count {
            args.push(OsString::from(format!("-flags:{index}")));
            args.push(OsString::from("+bitexact"));
        }
    }

    args.push(destination.as_os_str().to_owned());
    args
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    chapters: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ProbeStream {
    index: usize,
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

pub(crate) fn parse_probe_output(stdout: &[u8]) -> Result<MediaProbe> {
    let parsed: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| SanitizeError::tool(format!("unexpected ffprobe output: {e}")))?;

    Ok(MediaProbe {
        streams: parsed
            .streams
            .into_iter()
            .map(|stream| MediaStream {
                index: stream.index,
                codec_type: stream.codec_type,
                tags: stream.tags,
            })
            .collect(),
        format_tags: parsed.format.map(|format| format.tags).unwrap_or_default(),
        chapters: parsed.chapters.len(),
    })
}

fn failure_message(tool: &str, status: &std::process::ExitStatus, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr).trim().to_string();
    if stderr.is_empty() {
        format!("{tool} exited with {status}")
    } else {
        stderr
    }
}
