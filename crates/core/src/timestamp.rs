use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

const PRIMARY_TAG_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
const CANONICAL_FORMAT: &str = "%Y%m%d-%H%M%S";

/// `YYYYMMDD-HHMMSS` 形式のタイムスタンプ。比較・集計は文字列のまま行う。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalTimestamp(String);

impl CanonicalTimestamp {
    fn from_naive(naive: &NaiveDateTime) -> Self {
        Self(naive.format(CANONICAL_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Provenance {
    PrimaryTag,
    Sidecar,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimestampCandidate {
    pub timestamp: CanonicalTimestamp,
    pub provenance: Provenance,
}

/// Parses a primary tag value such as `2023:01:01 12:00:00`.
///
/// Sub-seconds or an offset trailing the date-time body are ignored; the wall
/// clock is kept exactly as written.
pub fn parse_primary_tag(raw: &str) -> Option<CanonicalTimestamp> {
    let trimmed = raw.trim();
    let (naive, rest) = NaiveDateTime::parse_and_remainder(trimmed, PRIMARY_TAG_FORMAT).ok()?;
    if !is_ignorable_remainder(rest) {
        return None;
    }
    Some(CanonicalTimestamp::from_naive(&naive))
}

/// Converts epoch seconds to local wall-clock time.
pub fn from_epoch_seconds(epoch: i64) -> Option<CanonicalTimestamp> {
    let utc = DateTime::from_timestamp(epoch, 0)?;
    let local = utc.with_timezone(&Local).naive_local();
    Some(CanonicalTimestamp::from_naive(&local))
}

fn is_ignorable_remainder(rest: &str) -> bool {
    match rest.chars().next() {
        None => true,
        Some('.') => rest[1..].chars().all(|c| c.is_ascii_digit()) || offset_follows_fraction(rest),
        Some('+') | Some('-') | Some('Z') => true,
        _ => false,
    }
}

fn offset_follows_fraction(rest: &str) -> bool {
    let digits = rest[1..].chars().take_while(|c| c.is_ascii_digit()).count();
    matches!(rest[1 + digits..].chars().next(), Some('+') | Some('-') | Some('Z'))
}

#[cfg(test)]
mod tests {
    use super::{from_epoch_seconds, parse_primary_tag};
    use chrono::{DateTime, Local};

    #[test]
    fn parses_primary_tag_into_canonical_form() {
        let ts = parse_primary_tag("2023:01:01 12:00:00").expect("valid tag");
        assert_eq!(ts.as_str(), "20230101-120000");

        let padded = parse_primary_tag("  2019:07:04 09:05:03\n").expect("trimmed tag");
        assert_eq!(padded.as_str(), "20190704-090503");
    }

    #[test]
    fn keeps_wall_clock_when_subseconds_or_offset_trail() {
        assert_eq!(
            parse_primary_tag("2021:03:14 15:09:26.535").map(|t| t.to_string()),
            Some("20210314-150926".to_string())
        );
        assert_eq!(
            parse_primary_tag("2021:03:14 15:09:26+09:00").map(|t| t.to_string()),
            Some("20210314-150926".to_string())
        );
        assert_eq!(
            parse_primary_tag("2021:03:14 15:09:26.12-05:00").map(|t| t.to_string()),
            Some("20210314-150926".to_string())
        );
    }

    #[test]
    fn rejects_malformed_primary_tags() {
        for raw in [
            "",
            "-",
            "0000:00:00 00:00:00",
            "2023:13:01 12:00:00",
            "2023-01-01 12:00:00",
            "2023:01:01",
            "2023:01:01 12:00:00 garbage",
        ] {
            assert!(parse_primary_tag(raw).is_none(), "should reject {raw:?}");
        }
    }

    #[test]
    fn epoch_seconds_use_local_time() {
        let epoch = 1_672_574_400;
        let expected = DateTime::from_timestamp(epoch, 0)
            .expect("in range")
            .with_timezone(&Local)
            .format("%Y%m%d-%H%M%S")
            .to_string();

        let ts = from_epoch_seconds(epoch).expect("epoch converts");
        assert_eq!(ts.as_str(), expected);
        assert_eq!(ts.as_str().len(), "YYYYMMDD-HHMMSS".len());
    }

    #[test]
    fn epoch_out_of_range_is_absent() {
        assert!(from_epoch_seconds(i64::MAX).is_none());
    }

    #[test]
    fn canonical_strings_sort_chronologically() {
        let earlier = parse_primary_tag("2009:12:31 23:59:59").expect("valid");
        let later = parse_primary_tag("2010:01:01 00:00:00").expect("valid");
        assert!(earlier < later);
    }
}
