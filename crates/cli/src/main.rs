use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use stamp_renamer_core::{
    app_paths, append_plan, generate_plan, load_config, save_config, AppConfig,
    BuiltinExifReader, CancellationToken, ExifToolReader, MediaKind, PlanEntry, PlanOptions,
    ReaderBackend, RenamePlan, TagReader,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stamp-renamer-cli")]
#[command(about = "撮影日時から写真・動画のリネーム計画 (mvスクリプト) を作成します")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Plan(PlanArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Init,
}

#[derive(Debug, Args)]
struct PlanArgs {
    input: PathBuf,
    #[arg(long, default_value_t = false)]
    video: bool,
    #[arg(long)]
    plan_file: Option<PathBuf>,
    #[arg(long)]
    staging_root: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    exclude_hidden: bool,
    #[arg(long, value_enum)]
    reader: Option<ReaderArg>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReaderArg {
    Exiftool,
    Builtin,
}

impl From<ReaderArg> for ReaderBackend {
    fn from(value: ReaderArg) -> Self {
        match value {
            ReaderArg::Exiftool => ReaderBackend::Exiftool,
            ReaderArg::Builtin => ReaderBackend::Builtin,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan(args) => cmd_plan(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Init => cmd_config_init(),
        },
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stamp_renamer_core=info,stamp_renamer_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_plan(args: PlanArgs) -> Result<()> {
    let config = load_config()?;
    let kind = if args.video {
        MediaKind::Video
    } else {
        MediaKind::Image
    };

    let mut options = PlanOptions::from_config(&args.input, kind, &config);
    if let Some(root) = args.staging_root {
        options.staging_root = root;
    }
    if args.exclude_hidden {
        options.include_hidden = false;
    }

    let reader = build_reader(args.reader.map(Into::into).unwrap_or(config.reader), &config)?;

    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    ctrlc::set_handler(move || handle.cancel())
        .context("Ctrl-Cハンドラを登録できませんでした")?;

    let plan = generate_plan(&options, reader.as_ref(), &cancel)?;

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        OutputFormat::Table => {
            print_table(&plan);
        }
    }

    if args.dry_run {
        eprintln!("dry-runモード: 計画ファイルには追記していません。");
    } else {
        let plan_file = args.plan_file.unwrap_or(config.plan_file);
        let lines = append_plan(&plan_file, &plan)?;
        info!(plan_file = %plan_file.display(), lines, "plan appended");
        eprintln!("計画を追記しました: {} ({}行)", plan_file.display(), lines);
    }

    Ok(())
}

fn build_reader(backend: ReaderBackend, config: &AppConfig) -> Result<Box<dyn TagReader>> {
    Ok(match backend {
        ReaderBackend::Exiftool => Box::new(ExifToolReader::probe(config.exiftool_path.clone())?),
        ReaderBackend::Builtin => Box::new(BuiltinExifReader),
    })
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("設定ファイル: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let paths = app_paths()?;
    if paths.config_path.exists() {
        anyhow::bail!("設定ファイルは既に存在します: {}", paths.config_path.display());
    }
    save_config(&AppConfig::default())?;
    println!("設定ファイルを作成しました: {}", paths.config_path.display());
    Ok(())
}

fn print_table(plan: &RenamePlan) {
    println!("元ファイル -> 新ファイル");
    for entry in &plan.entries {
        match entry {
            PlanEntry::Move {
                source,
                destination,
                sidecar_source,
                ..
            } => println!(
                "{} -> {} (+ {})",
                source.display(),
                destination.display(),
                sidecar_source.display()
            ),
            PlanEntry::MoveNoSidecar {
                source,
                destination,
            } => println!("{} -> {}", source.display(), destination.display()),
            PlanEntry::Unresolved { source, reason } => {
                println!("{} -> (未解決: {})", source.display(), reason)
            }
        }
    }

    let stats = &plan.stats;
    println!(
        "\n集計: scanned={} media={} other_skip={} hidden_skip={} walk_errors={} primary={} sidecar={} suffixed={} no_sidecar={} unresolved={}",
        stats.scanned_files,
        stats.media_files,
        stats.skipped_other,
        stats.skipped_hidden,
        stats.walk_errors,
        stats.from_primary,
        stats.from_sidecar,
        stats.suffixed,
        stats.without_sidecar,
        stats.unresolved
    );
}
