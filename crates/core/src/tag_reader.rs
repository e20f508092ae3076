use crate::error::ToolError;
use anyhow::{bail, Context, Result};
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Source of raw primary tag strings.
///
/// `read_tags` returns one slot per requested tag, in request order, with
/// `None` for absent tags. An `Err` is a per-file failure.
pub trait TagReader: Send + Sync {
    fn read_tags(&self, path: &Path, tags: &[String]) -> Result<Vec<Option<String>>>;
}

/// Reads tags through an external `exiftool` process, one call per file.
#[derive(Debug, Clone)]
pub struct ExifToolReader {
    program: PathBuf,
}

impl ExifToolReader {
    /// Confirms the utility runs before any file is read.
    pub fn probe(program: impl Into<PathBuf>) -> Result<Self, ToolError> {
        let program = program.into();
        let output = Command::new(&program).arg("-ver").output().map_err(|source| {
            ToolError::MetadataToolUnavailable {
                program: program.display().to_string(),
                source,
            }
        })?;
        if !output.status.success() {
            return Err(ToolError::MetadataToolFailed {
                program: program.display().to_string(),
                status: output.status.to_string(),
            });
        }

        debug!(
            program = %program.display(),
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "exiftool available"
        );
        Ok(Self { program })
    }
}

impl TagReader for ExifToolReader {
    fn read_tags(&self, path: &Path, tags: &[String]) -> Result<Vec<Option<String>>> {
        let output = Command::new(&self.program)
            .arg("-T")
            .args(tags.iter().map(|tag| format!("-{tag}")))
            .arg(path)
            .output()
            .with_context(|| format!("exiftoolを実行できませんでした: {}", path.display()))?;
        if !output.status.success() {
            bail!(
                "exiftoolが失敗しました: {} ({})",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(parse_table_row(
            &String::from_utf8_lossy(&output.stdout),
            tags.len(),
        ))
    }
}

/// Splits a `-T` output row. exiftool prints `-` for absent tags.
fn parse_table_row(stdout: &str, expected: usize) -> Vec<Option<String>> {
    let row = stdout.lines().next().unwrap_or_default();
    let mut values: Vec<Option<String>> = row
        .split('\t')
        .take(expected)
        .map(|cell| {
            let cell = cell.trim();
            if cell.is_empty() || cell == "-" {
                None
            } else {
                Some(cell.to_string())
            }
        })
        .collect();
    values.resize(expected, None);
    values
}

/// In-process EXIF reader for still images. Knows only the EXIF date tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinExifReader;

impl TagReader for BuiltinExifReader {
    fn read_tags(&self, path: &Path, tags: &[String]) -> Result<Vec<Option<String>>> {
        let file = File::open(path)
            .with_context(|| format!("EXIF読み込み対象を開けませんでした: {}", path.display()))?;
        let mut buf = BufReader::new(file);
        let exif = Reader::new()
            .read_from_container(&mut buf)
            .with_context(|| format!("EXIFを解析できませんでした: {}", path.display()))?;

        Ok(tags
            .iter()
            .map(|name| exif_tag_for(name).and_then(|tag| ascii_value(&exif, tag)))
            .collect())
    }
}

fn exif_tag_for(name: &str) -> Option<Tag> {
    match name.to_ascii_lowercase().as_str() {
        "datetimeoriginal" => Some(Tag::DateTimeOriginal),
        "createdate" | "datetimedigitized" => Some(Tag::DateTimeDigitized),
        "modifydate" | "datetime" => Some(Tag::DateTime),
        _ => None,
    }
}

fn ascii_value(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
            .filter(|v| !v.is_empty()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::TagReader;
    use anyhow::{bail, Result};
    use std::collections::{HashMap, HashSet};
    use std::path::{Path, PathBuf};

    /// Fixed tag table keyed by path.
    #[derive(Debug, Default)]
    pub(crate) struct MapTagReader {
        values: HashMap<PathBuf, HashMap<String, String>>,
        failing: HashSet<PathBuf>,
    }

    impl MapTagReader {
        pub(crate) fn with(mut self, path: &Path, tag: &str, value: &str) -> Self {
            self.values
                .entry(path.to_path_buf())
                .or_default()
                .insert(tag.to_string(), value.to_string());
            self
        }

        pub(crate) fn failing(mut self, path: &Path) -> Self {
            self.failing.insert(path.to_path_buf());
            self
        }
    }

    impl TagReader for MapTagReader {
        fn read_tags(&self, path: &Path, tags: &[String]) -> Result<Vec<Option<String>>> {
            if self.failing.contains(path) {
                bail!("simulated reader failure: {}", path.display());
            }
            let known = self.values.get(path);
            Ok(tags
                .iter()
                .map(|tag| known.and_then(|m| m.get(tag)).cloned())
                .collect())
        }
    }
}
