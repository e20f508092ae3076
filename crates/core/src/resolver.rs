use crate::error::{PrimaryMiss, SidecarMiss, UnresolvedReason};
use crate::sidecar::{locate_sidecar, read_sidecar_timestamp};
use crate::tag_reader::TagReader;
use crate::timestamp::{parse_primary_tag, CanonicalTimestamp, Provenance, TimestampCandidate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn default_extensions(self) -> Vec<String> {
        let exts: &[&str] = match self {
            MediaKind::Image => &["jpg", "jpeg"],
            MediaKind::Video => &["mp4", "mov", "m4v", "3gp"],
        };
        exts.iter().map(|v| v.to_string()).collect()
    }

    /// Primary tags in precedence order.
    pub fn default_tags(self) -> Vec<String> {
        let tags: &[&str] = match self {
            MediaKind::Image => &["DateTimeOriginal"],
            MediaKind::Video => &["DateTimeOriginal", "CreateDate", "TrackCreateDate"],
        };
        tags.iter().map(|v| v.to_string()).collect()
    }

    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// Outcome for one media file. `sidecar` is set whenever one was located,
/// regardless of which source supplied the timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub media: PathBuf,
    pub sidecar: Option<PathBuf>,
    pub outcome: Result<TimestampCandidate, UnresolvedReason>,
}

pub struct Resolver<'a> {
    reader: &'a dyn TagReader,
    tags: &'a [String],
}

impl<'a> Resolver<'a> {
    pub fn new(reader: &'a dyn TagReader, tags: &'a [String]) -> Self {
        Self { reader, tags }
    }

    /// Primary tags first, sidecar second. Never fails; misses are recorded
    /// in the outcome.
    pub fn resolve(&self, media: &Path) -> Resolution {
        let sidecar = locate_sidecar(media);

        let outcome = match self.resolve_primary(media) {
            Ok(timestamp) => Ok(TimestampCandidate {
                timestamp,
                provenance: Provenance::PrimaryTag,
            }),
            Err(primary) => match resolve_from_sidecar(sidecar.as_deref()) {
                Ok(timestamp) => Ok(TimestampCandidate {
                    timestamp,
                    provenance: Provenance::Sidecar,
                }),
                Err(sidecar_miss) => Err(UnresolvedReason::TimestampUnresolved {
                    primary,
                    sidecar: sidecar_miss,
                }),
            },
        };

        match &outcome {
            Ok(candidate) => debug!(
                media = %media.display(),
                timestamp = %candidate.timestamp,
                provenance = ?candidate.provenance,
                sidecar = ?sidecar,
                "timestamp resolved"
            ),
            Err(reason) => debug!(media = %media.display(), %reason, "timestamp unresolved"),
        }

        Resolution {
            media: media.to_path_buf(),
            sidecar,
            outcome,
        }
    }

    fn resolve_primary(&self, media: &Path) -> Result<CanonicalTimestamp, PrimaryMiss> {
        match self.reader.read_tags(media, self.tags) {
            Ok(values) => select_primary(self.tags, &values),
            Err(err) => {
                let detail = format!("{err:#}");
                warn!(media = %media.display(), error = %detail, "tag read failed; treating as absent");
                Err(PrimaryMiss::TagAbsent)
            }
        }
    }
}

/// Walks the tags in order and returns the first value that parses.
/// When none does, reports the first unparseable value, if any.
pub fn select_primary(
    tags: &[String],
    values: &[Option<String>],
) -> Result<CanonicalTimestamp, PrimaryMiss> {
    let mut miss = PrimaryMiss::TagAbsent;
    for (tag, value) in tags.iter().zip(values) {
        let Some(raw) = value else {
            continue;
        };
        if let Some(timestamp) = parse_primary_tag(raw) {
            return Ok(timestamp);
        }
        if miss == PrimaryMiss::TagAbsent {
            miss = PrimaryMiss::TagUnparseable {
                tag: tag.clone(),
                value: raw.clone(),
            };
        }
    }
    Err(miss)
}

fn resolve_from_sidecar(sidecar: Option<&Path>) -> Result<CanonicalTimestamp, SidecarMiss> {
    let path = sidecar.ok_or(SidecarMiss::SidecarNotFound)?;
    read_sidecar_timestamp(path).inspect_err(|miss| {
        warn!(sidecar = %path.display(), %miss, "sidecar ignored");
    })
}
