use crate::cancel::CancellationToken;
use crate::config::AppConfig;
use crate::error::{Cancelled, UnresolvedReason};
use crate::resolver::{MediaKind, Resolution, Resolver};
use crate::tag_reader::TagReader;
use crate::timestamp::{CanonicalTimestamp, Provenance};
use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub input: PathBuf,
    pub kind: MediaKind,
    pub include_hidden: bool,
    pub staging_root: PathBuf,
    pub extensions: Vec<String>,
    pub tags: Vec<String>,
    pub refuse_existing_destinations: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            kind: MediaKind::Image,
            include_hidden: true,
            staging_root: PathBuf::from("done"),
            extensions: MediaKind::Image.default_extensions(),
            tags: MediaKind::Image.default_tags(),
            refuse_existing_destinations: true,
        }
    }
}

impl PlanOptions {
    pub fn from_config(input: impl Into<PathBuf>, kind: MediaKind, config: &AppConfig) -> Self {
        let media = config.media(kind);
        Self {
            input: input.into(),
            kind,
            include_hidden: config.include_hidden_default,
            staging_root: config.staging_root.clone(),
            extensions: media.extensions.clone(),
            tags: media.tags.clone(),
            refuse_existing_destinations: config.refuse_existing_destinations,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanEntry {
    Move {
        source: PathBuf,
        destination: PathBuf,
        sidecar_source: PathBuf,
        sidecar_destination: PathBuf,
    },
    MoveNoSidecar {
        source: PathBuf,
        destination: PathBuf,
    },
    Unresolved {
        source: PathBuf,
        reason: UnresolvedReason,
    },
}

impl PlanEntry {
    pub fn source(&self) -> &Path {
        match self {
            PlanEntry::Move { source, .. }
            | PlanEntry::MoveNoSidecar { source, .. }
            | PlanEntry::Unresolved { source, .. } => source,
        }
    }

    pub fn destination(&self) -> Option<&Path> {
        match self {
            PlanEntry::Move { destination, .. } | PlanEntry::MoveNoSidecar { destination, .. } => {
                Some(destination)
            }
            PlanEntry::Unresolved { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub scanned_files: usize,
    pub media_files: usize,
    pub skipped_other: usize,
    pub skipped_hidden: usize,
    pub walk_errors: usize,
    pub from_primary: usize,
    pub from_sidecar: usize,
    pub suffixed: usize,
    pub without_sidecar: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenamePlan {
    pub input: PathBuf,
    pub kind: MediaKind,
    pub entries: Vec<PlanEntry>,
    pub stats: PlanStats,
}

/// Per-timestamp counters for the second pass.
///
/// Totals come from the first pass. A timestamp seen once keeps its bare
/// name; otherwise each file takes the next two-digit ordinal in call order.
#[derive(Debug, Default)]
pub struct SuffixAssigner {
    totals: HashMap<CanonicalTimestamp, usize>,
    issued: HashMap<CanonicalTimestamp, usize>,
}

impl SuffixAssigner {
    pub fn from_timestamps<'a>(timestamps: impl IntoIterator<Item = &'a CanonicalTimestamp>) -> Self {
        let mut totals = HashMap::new();
        for timestamp in timestamps {
            *totals.entry(timestamp.clone()).or_insert(0) += 1;
        }
        Self {
            totals,
            issued: HashMap::new(),
        }
    }

    pub fn next_base_name(&mut self, timestamp: &CanonicalTimestamp) -> String {
        let total = self.totals.get(timestamp).copied().unwrap_or(0);
        let counter = self.issued.entry(timestamp.clone()).or_insert(0);
        let ordinal = *counter;
        *counter += 1;

        if total > 1 {
            format!("{}-{:02}", timestamp, ordinal)
        } else {
            timestamp.to_string()
        }
    }
}

pub fn generate_plan(
    options: &PlanOptions,
    reader: &dyn TagReader,
    cancel: &CancellationToken,
) -> Result<RenamePlan> {
    if !options.input.is_dir() {
        anyhow::bail!("入力フォルダが存在しません: {}", options.input.display());
    }

    let mut stats = PlanStats::default();
    let files = collect_media_files(
        &options.input,
        &options.extensions,
        options.include_hidden,
        &mut stats,
    );
    info!(
        input = %options.input.display(),
        kind = options.kind.label(),
        files = files.len(),
        "planning"
    );

    let resolver = Resolver::new(reader, &options.tags);
    let resolutions = files
        .par_iter()
        .map(|path| -> Result<Resolution, Cancelled> {
            cancel.check()?;
            Ok(resolver.resolve(path))
        })
        .collect::<Result<Vec<_>, Cancelled>>()?;

    let mut suffixes = SuffixAssigner::from_timestamps(
        resolutions
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok())
            .map(|candidate| &candidate.timestamp),
    );
    let mut claimed_sidecars = HashSet::<PathBuf>::new();
    let total = resolutions.len();
    let block = (total / 10).max(1);
    let mut entries = Vec::with_capacity(total);

    for (index, resolution) in resolutions.into_iter().enumerate() {
        cancel.check()?;
        entries.push(plan_entry(
            resolution,
            options,
            &mut suffixes,
            &mut claimed_sidecars,
            &mut stats,
        ));
        let done = index + 1;
        if done % block == 0 {
            info!("  {:04}/{:04} done", done, total);
        }
    }

    Ok(RenamePlan {
        input: options.input.clone(),
        kind: options.kind,
        entries,
        stats,
    })
}

fn plan_entry(
    resolution: Resolution,
    options: &PlanOptions,
    suffixes: &mut SuffixAssigner,
    claimed_sidecars: &mut HashSet<PathBuf>,
    stats: &mut PlanStats,
) -> PlanEntry {
    let Resolution {
        media,
        sidecar,
        outcome,
    } = resolution;

    let candidate = match outcome {
        Ok(candidate) => candidate,
        Err(reason) => {
            stats.unresolved += 1;
            return PlanEntry::Unresolved {
                source: media,
                reason,
            };
        }
    };

    let base = suffixes.next_base_name(&candidate.timestamp);
    let dir = staged_dir(&options.staging_root, &media);
    let extension = media
        .extension()
        .map(|v| format!(".{}", v.to_string_lossy()))
        .unwrap_or_default();
    let destination = dir.join(format!("{}{}", base, extension));
    let sidecar_destination = dir.join(format!("{}.json", base));

    let sidecar = sidecar.filter(|path| {
        let free = !claimed_sidecars.contains(path);
        if !free {
            warn!(
                media = %media.display(),
                sidecar = %path.display(),
                "sidecar already claimed by an earlier file"
            );
        }
        free
    });

    if options.refuse_existing_destinations {
        let occupied = std::iter::once(&destination)
            .chain(sidecar.as_ref().map(|_| &sidecar_destination))
            .find(|path| path.exists());
        if let Some(path) = occupied {
            warn!(media = %media.display(), destination = %path.display(), "destination exists");
            stats.unresolved += 1;
            return PlanEntry::Unresolved {
                source: media,
                reason: UnresolvedReason::DestinationExists { path: path.clone() },
            };
        }
    }

    match candidate.provenance {
        Provenance::PrimaryTag => stats.from_primary += 1,
        Provenance::Sidecar => stats.from_sidecar += 1,
    }
    if base != candidate.timestamp.as_str() {
        stats.suffixed += 1;
    }

    match sidecar {
        Some(sidecar_source) => {
            claimed_sidecars.insert(sidecar_source.clone());
            PlanEntry::Move {
                source: media,
                destination,
                sidecar_source,
                sidecar_destination,
            }
        }
        None => {
            stats.without_sidecar += 1;
            PlanEntry::MoveNoSidecar {
                source: media,
                destination,
            }
        }
    }
}

/// Staging root plus the media's directory components. Root, prefix and
/// `.`/`..` components are dropped so the result stays under the root.
fn staged_dir(staging_root: &Path, media: &Path) -> PathBuf {
    let mut dir = staging_root.to_path_buf();
    if let Some(parent) = media.parent() {
        for component in parent.components() {
            if let Component::Normal(part) = component {
                dir.push(part);
            }
        }
    }
    dir
}

fn collect_media_files(
    root: &Path,
    extensions: &[String],
    include_hidden: bool,
    stats: &mut PlanStats,
) -> Vec<PathBuf> {
    collect_from_walk(
        WalkDir::new(root).sort_by_file_name(),
        extensions,
        include_hidden,
        stats,
    )
}

/// Unreadable entries are logged and skipped; the rest of the walk continues.
/// Result is ordered by the raw path string, not by path components.
fn collect_from_walk(
    walk: impl IntoIterator<Item = walkdir::Result<DirEntry>>,
    extensions: &[String],
    include_hidden: bool,
    stats: &mut PlanStats,
) -> Vec<PathBuf> {
    let mut out = Vec::new();

    for entry in walk {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(
                    path = ?err.path(),
                    error = %err,
                    "unreadable walk entry skipped"
                );
                stats.walk_errors += 1;
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        stats.scanned_files += 1;

        if is_hidden(path) && !include_hidden {
            stats.skipped_hidden += 1;
            continue;
        }

        if has_extension(path, extensions) {
            stats.media_files += 1;
            out.push(path.to_path_buf());
        } else {
            stats.skipped_other += 1;
        }
    }

    out.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    out
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            extensions
                .iter()
                .any(|wanted| ext.eq_ignore_ascii_case(wanted.trim_start_matches('.')))
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
