// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;

use vntl::app_config::{self, Config, TranslationProvider};
use vntl::database::{DatabaseConnection, Repository};
use vntl::extraction::{ExtractionMode, Extractor, SourceFormat};
use vntl::file_utils::FileManager;
use vntl::translation::TranslationMemory;
use vntl::Controller;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Llm,
    Deepl,
    Lingva,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Llm => TranslationProvider::Llm,
            CliTranslationProvider::Deepl => TranslationProvider::DeepL,
            CliTranslationProvider::Lingva => TranslationProvider::Lingva,
        }
    }
}

/// CLI Wrapper for ExtractionMode to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliExtractionMode {
    Safe,
    Balanced,
    Aggressive,
}

impl From<CliExtractionMode> for ExtractionMode {
    fn from(cli_mode: CliExtractionMode) -> Self {
        match cli_mode {
            CliExtractionMode::Safe => ExtractionMode::Safe,
            CliExtractionMode::Balanced => ExtractionMode::Balanced,
            CliExtractionMode::Aggressive => ExtractionMode::Aggressive,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a script file or every script under a directory
    Translate(TranslateArgs),

    /// Print the dialogue extracted from a script as JSON
    Extract {
        /// Script or JSON file
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        /// Extraction mode
        #[arg(long, value_enum)]
        mode: Option<CliExtractionMode>,
    },

    /// Manage the translation memory
    #[command(subcommand)]
    Tm(TmCommand),

    /// Generate shell completions for vntl
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum TmCommand {
    /// Write every entry to a JSON file
    Export {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Merge entries from a JSON export, overwriting by key
    Import {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Show entry and usage counts
    Stats,
    /// Delete every entry
    Clear,
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input script file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Output directory (defaults to the input's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Bundle a directory's translations into this zip file instead
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'ja', 'en', or 'auto')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'vi', 'en', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Extraction mode
    #[arg(long, value_enum)]
    mode: Option<CliExtractionMode>,
}

/// vntl - Visual Novel Dialogue Translator
///
/// Translates the dialogue of visual novel scripts with AI and MT providers
/// while keeping tags, interpolations and code untouched.
#[derive(Parser, Debug)]
#[command(name = "vntl")]
#[command(version = "0.1.0")]
#[command(about = "Visual novel dialogue translation tool")]
#[command(long_about = "vntl extracts quoted dialogue from visual novel scripts, translates it and writes the script back with only the dialogue changed.

EXAMPLES:
    vntl translate script.rpy                       # Translate using default config
    vntl translate -t fr -p deepl game/             # Translate a folder to French with DeepL
    vntl translate --archive out.zip game/          # Bundle a folder's translations
    vntl extract --mode aggressive script.rpy       # Show what would be translated
    vntl tm export memory.json                      # Back up the translation memory
    vntl completions bash > vntl.bash               # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    llm    - OpenAI-compatible chat completions (requires API key)
    deepl  - DeepL API (requires API key)
    lingva - Lingva public mirrors")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour and tag for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (colour, tag) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {} {}\x1B[0m",
                colour,
                now,
                tag,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Accept everything; the effective level is set once the config is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "vntl", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = Config::load_or_create(&cli.config_path)?;
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level.into();
    }
    log::set_max_level(config.log_level.to_level_filter());

    match cli.command {
        Commands::Translate(args) => run_translate(config, args).await,
        Commands::Extract { input_file, mode } => {
            if let Some(mode) = mode {
                config.extraction.mode = mode.into();
            }
            run_extract(config, input_file)
        }
        Commands::Tm(command) => run_tm(config, command).await,
        Commands::Completions { .. } => Ok(()),
    }
}

async fn run_translate(mut config: Config, args: TranslateArgs) -> Result<()> {
    if let Some(provider) = args.provider {
        config.translation.provider = provider.into();
    }
    if let Some(model) = args.model {
        let provider = config.translation.provider;
        config.translation.provider_config_mut(provider).model = model;
    }
    if let Some(source_language) = args.source_language {
        config.source_language = source_language;
    }
    if let Some(target_language) = args.target_language {
        config.target_language = target_language;
    }
    if let Some(mode) = args.mode {
        config.extraction.mode = mode.into();
    }

    config.validate().context("Configuration validation failed")?;
    let controller = Controller::with_config(config)?;

    if args.input_path.is_file() {
        let output_dir = match args.output_dir {
            Some(dir) => dir,
            None => args
                .input_path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        controller
            .run(args.input_path, output_dir, args.force_overwrite)
            .await
    } else if args.input_path.is_dir() {
        let output_dir = args.output_dir.unwrap_or_else(|| args.input_path.clone());
        controller
            .run_folder(args.input_path, output_dir, args.archive, args.force_overwrite)
            .await
    } else {
        Err(anyhow!("Input path does not exist: {:?}", args.input_path))
    }
}

fn run_extract(config: Config, input_file: PathBuf) -> Result<()> {
    let format = SourceFormat::from_path(&input_file)?;
    let text = FileManager::read_to_string(&input_file)?;
    let items = Extractor::new(config.extraction.mode)
        .extract(&input_file.to_string_lossy(), &text, format)
        .with_context(|| format!("Failed to extract dialogue from {:?}", input_file))?;

    let json = serde_json::to_string_pretty(&items).context("Failed to serialize dialogue")?;
    println!("{}", json);
    info!("{} dialogue items in {:?}", items.len(), input_file);
    Ok(())
}

async fn run_tm(config: Config, command: TmCommand) -> Result<()> {
    let db_path = config.resolve_database_path()?;
    let db = DatabaseConnection::new(&db_path)?;
    let repo = Repository::new(db.clone());
    let memory = TranslationMemory::new(repo, true);

    match command {
        TmCommand::Export { path } => {
            let count = memory.export_json(&path).await?;
            println!("Exported {} entries to {}", count, path.display());
        }
        TmCommand::Import { path } => {
            let count = memory.import_json(&path).await?;
            println!("Imported {} entries from {}", count, path.display());
        }
        TmCommand::Stats => {
            println!("{}", memory.stats().await?);
            println!("{}", db.stats()?);
        }
        TmCommand::Clear => {
            let count = memory.clear().await?;
            println!("Deleted {} entries", count);
        }
    }
    Ok(())
}
