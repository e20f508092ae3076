use crate::resolver::MediaKind;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReaderBackend {
    #[default]
    Exiftool,
    Builtin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaConfig {
    pub extensions: Vec<String>,
    pub tags: Vec<String>,
}

impl MediaConfig {
    fn defaults_for(kind: MediaKind) -> Self {
        Self {
            extensions: kind.default_extensions(),
            tags: kind.default_tags(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub plan_file: PathBuf,
    pub staging_root: PathBuf,
    pub reader: ReaderBackend,
    pub exiftool_path: PathBuf,
    pub include_hidden_default: bool,
    pub refuse_existing_destinations: bool,
    pub image: MediaConfig,
    pub video: MediaConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            plan_file: PathBuf::from("ALL_YEARS.sh"),
            staging_root: PathBuf::from("done"),
            reader: ReaderBackend::Exiftool,
            exiftool_path: PathBuf::from("exiftool"),
            include_hidden_default: true,
            refuse_existing_destinations: true,
            image: MediaConfig::defaults_for(MediaKind::Image),
            video: MediaConfig::defaults_for(MediaKind::Video),
        }
    }
}

impl AppConfig {
    pub fn media(&self, kind: MediaKind) -> &MediaConfig {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Video => &self.video,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "kelly", "stamp-renamer")
        .context("OS標準設定ディレクトリを取得できませんでした")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    if !paths.config_path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(&paths.config_path).with_context(|| {
        format!(
            "設定ファイルを読めませんでした: {}",
            paths.config_path.display()
        )
    })?;

    parse_config(&raw)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    let paths = app_paths()?;
    fs::create_dir_all(&paths.config_dir).with_context(|| {
        format!(
            "設定ディレクトリを作成できませんでした: {}",
            paths.config_dir.display()
        )
    })?;
    let body = toml::to_string_pretty(config).context("設定のシリアライズに失敗しました")?;
    fs::write(&paths.config_path, body).with_context(|| {
        format!(
            "設定ファイルを書き込めませんでした: {}",
            paths.config_path.display()
        )
    })?;
    Ok(())
}

fn parse_config(raw: &str) -> Result<AppConfig> {
    toml::from_str::<AppConfig>(raw).context("設定ファイルのパースに失敗しました")
}
