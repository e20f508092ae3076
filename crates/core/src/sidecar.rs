use crate::error::SidecarMiss;
use crate::timestamp::{from_epoch_seconds, CanonicalTimestamp};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const METADATA_MARKER: &str = ".supplemental-metadata";
const SIDECAR_EXTENSION: &str = ".json";

/// Shortest prefix length (exclusive) worth probing. Shorter prefixes start
/// matching unrelated files.
pub const PROBE_FLOOR: usize = 10;

static DUPLICATE_INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<stem>.*)(?P<index>\(\d+\))(?P<ext>\.[^.]*)$").unwrap());

/// Probe paths for the sidecar of `media`, longest first.
///
/// The exporter writes `<name>.supplemental-metadata.json` but cuts the name
/// short to fit its path limit, and moves a duplicate index like `(2)` from
/// before the media extension to just before `.json`. Every prefix of the
/// marker-suffixed path down to [`PROBE_FLOOR`] characters is a candidate.
pub fn sidecar_probe_candidates(media: &Path) -> Vec<PathBuf> {
    let Some((base, index)) = probe_base(media) else {
        return Vec::new();
    };

    let mut ends: Vec<usize> = base
        .char_indices()
        .map(|(offset, _)| offset)
        .skip(PROBE_FLOOR + 1)
        .collect();
    if base.chars().count() > PROBE_FLOOR {
        ends.push(base.len());
    }

    ends.iter()
        .rev()
        .map(|&end| PathBuf::from(format!("{}{}{}", &base[..end], index, SIDECAR_EXTENSION)))
        .collect()
}

/// First probe that exists on disk.
pub fn locate_sidecar(media: &Path) -> Option<PathBuf> {
    sidecar_probe_candidates(media)
        .into_iter()
        .find(|candidate| candidate.is_file())
}

fn probe_base(media: &Path) -> Option<(String, String)> {
    let full = media.to_str()?;
    let name = media.file_name()?.to_str()?;
    let dir = full.strip_suffix(name)?;

    match DUPLICATE_INDEX_RE.captures(name) {
        Some(caps) => Some((
            format!("{}{}{}{}", dir, &caps["stem"], &caps["ext"], METADATA_MARKER),
            caps["index"].to_string(),
        )),
        None => Some((format!("{}{}", full, METADATA_MARKER), String::new())),
    }
}

#[derive(Debug, Deserialize)]
struct SidecarDocument {
    #[serde(rename = "photoTakenTime")]
    photo_taken_time: Option<TakenTime>,
}

#[derive(Debug, Deserialize)]
struct TakenTime {
    timestamp: Option<EpochValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EpochValue {
    Number(i64),
    Text(String),
}

/// Reads `photoTakenTime.timestamp` from a sidecar.
pub fn read_sidecar_timestamp(path: &Path) -> Result<CanonicalTimestamp, SidecarMiss> {
    let malformed = |reason: String| SidecarMiss::SidecarMalformed {
        path: path.to_path_buf(),
        reason,
    };

    let body = fs::read(path).map_err(|err| malformed(err.to_string()))?;
    let document: SidecarDocument =
        serde_json::from_slice(&body).map_err(|err| malformed(err.to_string()))?;

    let epoch = match document.photo_taken_time.and_then(|t| t.timestamp) {
        Some(EpochValue::Number(n)) => n,
        Some(EpochValue::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| malformed(format!("数値ではありません: {text}")))?,
        None => return Err(malformed("photoTakenTime.timestamp がありません".to_string())),
    };

    from_epoch_seconds(epoch).ok_or_else(|| malformed(format!("範囲外の値です: {epoch}")))
}

#[cfg(test)]
mod tests {
    use super::{locate_sidecar, read_sidecar_timestamp, sidecar_probe_candidates, PROBE_FLOOR};
    use crate::error::SidecarMiss;
    use crate::timestamp::from_epoch_seconds;
    use std::fs::{self, File};
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dirs must be creatable");
        }
        File::create(path).expect("file must be creatable");
    }

    #[test]
    fn first_probe_is_the_untruncated_name() {
        let probes = sidecar_probe_candidates(Path::new("photos/IMG_0001.jpg"));
        assert_eq!(
            probes.first(),
            Some(&PathBuf::from("photos/IMG_0001.jpg.supplemental-metadata.json"))
        );
        assert_eq!(
            probes.get(1),
            Some(&PathBuf::from("photos/IMG_0001.jpg.supplemental-metadat.json"))
        );
    }

    #[test]
    fn duplicate_index_moves_after_marker() {
        let probes = sidecar_probe_candidates(Path::new("photos/IMG(2).jpg"));
        assert_eq!(
            probes.first(),
            Some(&PathBuf::from("photos/IMG.jpg.supplemental-metadata(2).json"))
        );
        assert_eq!(
            probes.get(1),
            Some(&PathBuf::from("photos/IMG.jpg.supplemental-metadat(2).json"))
        );
        assert!(probes
            .iter()
            .all(|p| p.to_string_lossy().ends_with("(2).json")));
    }

    #[test]
    fn bare_duplicate_index_name_is_relocated() {
        let probes = sidecar_probe_candidates(Path::new("photos/(2).jpg"));
        assert_eq!(
            probes.first(),
            Some(&PathBuf::from("photos/.jpg.supplemental-metadata(2).json"))
        );
    }

    #[test]
    fn probes_stop_above_the_floor() {
        let media = Path::new("a/b.jpg");
        let base_len = "a/b.jpg.supplemental-metadata".chars().count();
        let probes = sidecar_probe_candidates(media);

        assert_eq!(probes.len(), base_len - PROBE_FLOOR);
        let shortest = probes.last().expect("at least one probe");
        assert_eq!(shortest, &PathBuf::from("a/b.jpg.sup.json"));
    }

    #[test]
    fn truncates_on_character_boundaries() {
        let probes = sidecar_probe_candidates(Path::new("アルバム/写真.jpg"));
        assert!(probes.len() > 1);
        assert!(probes
            .iter()
            .all(|p| p.to_string_lossy().ends_with(".json")));
    }

    #[test]
    fn locates_truncated_sidecar() {
        let temp = tempdir().expect("tempdir");
        let media = temp.path().join("a-very-long-original-file-name-from-phone.jpg");
        let sidecar = temp
            .path()
            .join("a-very-long-original-file-name-from-phone.jpg.supplemental-me.json");
        touch(&media);
        touch(&sidecar);

        assert_eq!(locate_sidecar(&media), Some(sidecar));
    }

    #[test]
    fn numbered_media_prefers_relocated_index() {
        let temp = tempdir().expect("tempdir");
        let media = temp.path().join("IMG(2).jpg");
        let wanted = temp.path().join("IMG.jpg.supplemental-metadata(2).json");
        let decoy = temp.path().join("IMG(2).jpg.supplemental-metadata.json");
        touch(&media);
        touch(&wanted);
        touch(&decoy);

        assert_eq!(locate_sidecar(&media), Some(wanted));
    }

    #[test]
    fn longest_match_wins() {
        let temp = tempdir().expect("tempdir");
        let media = temp.path().join("IMG_0042.jpg");
        let full = temp.path().join("IMG_0042.jpg.supplemental-metadata.json");
        let short = temp.path().join("IMG_0042.jpg.supp.json");
        touch(&media);
        touch(&full);
        touch(&short);

        assert_eq!(locate_sidecar(&media), Some(full));
    }

    #[test]
    fn missing_sidecar_is_absent() {
        let temp = tempdir().expect("tempdir");
        let media = temp.path().join("IMG_0043.jpg");
        touch(&media);

        assert!(locate_sidecar(&media).is_none());
    }

    #[test]
    fn reads_string_and_integer_timestamps() {
        let temp = tempdir().expect("tempdir");
        let text = temp.path().join("text.json");
        let number = temp.path().join("number.json");
        fs::write(
            &text,
            r#"{"title":"x.jpg","photoTakenTime":{"timestamp":"1672574400","formatted":"..."}}"#,
        )
        .expect("write");
        fs::write(&number, r#"{"photoTakenTime":{"timestamp":1672574400}}"#).expect("write");

        let expected = from_epoch_seconds(1_672_574_400).expect("in range");
        assert_eq!(read_sidecar_timestamp(&text), Ok(expected.clone()));
        assert_eq!(read_sidecar_timestamp(&number), Ok(expected));
    }

    #[test]
    fn malformed_or_incomplete_sidecar_is_reported() {
        let temp = tempdir().expect("tempdir");
        let broken = temp.path().join("broken.json");
        let missing = temp.path().join("missing.json");
        let wrong = temp.path().join("wrong.json");
        fs::write(&broken, "{not json").expect("write");
        fs::write(&missing, r#"{"creationTime":{"timestamp":"1"}}"#).expect("write");
        fs::write(&wrong, r#"{"photoTakenTime":{"timestamp":"yesterday"}}"#).expect("write");

        for path in [&broken, &missing, &wrong] {
            match read_sidecar_timestamp(path) {
                Err(SidecarMiss::SidecarMalformed { path: reported, .. }) => {
                    assert_eq!(&reported, path)
                }
                other => panic!("expected malformed for {}: {other:?}", path.display()),
            }
        }
    }
}
