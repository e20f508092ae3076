use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("メタデータ読み取りツールを起動できませんでした: {program}")]
    MetadataToolUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("メタデータ読み取りツールが異常終了しました: {program} ({status})")]
    MetadataToolFailed { program: String, status: String },
}

/// Why no primary tag produced a timestamp.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
pub enum PrimaryMiss {
    #[error("日時タグなし")]
    TagAbsent,
    #[error("日時タグを解釈できません: {tag}={value}")]
    TagUnparseable { tag: String, value: String },
}

/// Why the sidecar produced no timestamp.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
pub enum SidecarMiss {
    #[error("サイドカーなし")]
    SidecarNotFound,
    #[error("サイドカーを解釈できません: {}: {reason}", .path.display())]
    SidecarMalformed { path: PathBuf, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
pub enum UnresolvedReason {
    #[error("タイムスタンプ情報がありません ({primary} / {sidecar})")]
    TimestampUnresolved {
        primary: PrimaryMiss,
        sidecar: SidecarMiss,
    },
    #[error("移動先が既に存在します: {}", .path.display())]
    DestinationExists { path: PathBuf },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("計画の作成が中断されました")]
pub struct Cancelled;
