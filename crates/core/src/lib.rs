mod cancel;
mod config;
mod emitter;
mod error;
mod planner;
mod resolver;
mod sidecar;
mod tag_reader;
mod timestamp;

pub use cancel::CancellationToken;
pub use config::{app_paths, load_config, save_config, AppConfig, AppPaths, MediaConfig, ReaderBackend};
pub use emitter::{append_plan, render_entry, render_plan};
pub use error::{Cancelled, PrimaryMiss, SidecarMiss, ToolError, UnresolvedReason};
pub use planner::{
    generate_plan, PlanEntry, PlanOptions, PlanStats, RenamePlan, SuffixAssigner,
};
pub use resolver::{select_primary, MediaKind, Resolution, Resolver};
pub use sidecar::{locate_sidecar, read_sidecar_timestamp, sidecar_probe_candidates, PROBE_FLOOR};
pub use tag_reader::{BuiltinExifReader, ExifToolReader, TagReader};
pub use timestamp::{
    from_epoch_seconds, parse_primary_tag, CanonicalTimestamp, Provenance, TimestampCandidate,
};
