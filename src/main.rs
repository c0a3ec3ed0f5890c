// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, debug, info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use msgtranslate::app_config::{self, Config, TranslationMode};
use msgtranslate::language_utils;
use msgtranslate::preferences::UserPreferences;
use msgtranslate::providers::ProgressFn;
use msgtranslate::storage::{KeyValueStore, SqliteStore};
use msgtranslate::translation::{Coordinator, MessageDirection, TranslationRequest};

/// CLI Wrapper for TranslationMode to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMode {
    Auto,
    OnlineOnly,
    OfflineOnly,
}

impl From<CliMode> for TranslationMode {
    fn from(cli_mode: CliMode) -> Self {
        match cli_mode {
            CliMode::Auto => TranslationMode::Auto,
            CliMode::OnlineOnly => TranslationMode::OnlineOnly,
            CliMode::OfflineOnly => TranslationMode::OfflineOnly,
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

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDirection {
    Incoming,
    Outgoing,
}

impl From<CliDirection> for MessageDirection {
    fn from(direction: CliDirection) -> Self {
        match direction {
            CliDirection::Incoming => MessageDirection::Incoming,
            CliDirection::Outgoing => MessageDirection::Outgoing,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a piece of message text
    Translate(TranslateArgs),

    /// Detect the language of a piece of text
    Detect {
        /// Text to inspect
        text: String,
    },

    /// Manage on-device translation models
    #[command(subcommand)]
    Models(ModelCommands),

    /// Show or change translation preferences
    #[command(subcommand)]
    Prefs(PrefCommands),

    /// Inspect or clear the translation cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Generate shell completions for msgtranslate
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Text to translate
    text: String,

    /// Target language code (defaults to the preferred language for the direction)
    #[arg(short, long)]
    target_language: Option<String>,

    /// Source language code; detected when omitted
    #[arg(short, long)]
    source_language: Option<String>,

    /// Translate even when source and target match
    #[arg(long)]
    force: bool,

    /// Override the stored translation mode
    #[arg(short, long, value_enum)]
    mode: Option<CliMode>,

    /// Message direction used to pick the preferred language
    #[arg(short, long, value_enum, default_value = "incoming")]
    direction: CliDirection,

    /// Scope tag (e.g. a conversation id) for later cache clearing
    #[arg(long)]
    scope: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ModelCommands {
    /// List every catalog language with its model status
    List,
    /// Download the model for a language
    Download { language: String },
    /// Remove the model for a language
    Remove { language: String },
    /// Re-check every model against the device
    Reconcile,
}

#[derive(Subcommand, Debug)]
enum PrefCommands {
    /// Print current preferences
    Show,
    /// Set a preferred language
    SetLanguage {
        language: String,
        /// Only for this direction; sets the general language when omitted
        #[arg(short, long, value_enum)]
        direction: Option<CliDirection>,
    },
    /// Set the translation mode
    SetMode {
        #[arg(value_enum)]
        mode: CliMode,
    },
    /// Enable or disable offline translation
    SetOffline {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Prefer offline over online translation in auto mode
    SetPreferOffline {
        #[arg(action = clap::ArgAction::Set)]
        prefer: bool,
    },
    /// Store the online translation API key
    SetApiKey { key: String },
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Print hit and miss counters
    Stats,
    /// Clear cached translations, optionally only one scope
    Clear {
        #[arg(long)]
        scope: Option<String>,
    },
}

/// msgtranslate - translation resolution for messaging
///
/// Translates message text online or with on-device models, detects source
/// languages and manages downloaded models.
#[derive(Parser, Debug)]
#[command(name = "msgtranslate")]
#[command(version)]
#[command(about = "Message translation with online and on-device providers")]
#[command(long_about = "msgtranslate resolves message translations through an online provider or on-device models.

EXAMPLES:
    msgtranslate translate \"Hola mundo\" -t en       # Detect source, translate to English
    msgtranslate translate -s fr -t en -m offline-only \"Bonjour\"
    msgtranslate detect \"Guten Tag\"
    msgtranslate models download es
    msgtranslate prefs set-mode online-only
    msgtranslate completions bash > msgtranslate.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file does not
    exist, a default one is created. Preferences, models and cached
    translations live in a SQLite database under the user data directory.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Database path (overrides the configuration)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
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

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
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
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
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
    // The logger accepts everything; the max level is narrowed once config is loaded
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "msgtranslate", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = Config::load_or_create(&cli.config_path)
        .with_context(|| format!("Failed to load config file: {}", cli.config_path))?;
    if let Some(level) = cli.log_level.clone() {
        config.log_level = level.into();
    }
    log::set_max_level(config.log_level.to_level_filter());

    let database_path = cli.database.clone().or_else(|| config.storage.database_path.clone());
    let sqlite = match &database_path {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_default()?,
    };
    debug!("Using database at {:?}", sqlite.connection().path());
    let storage: Arc<dyn KeyValueStore> = Arc::new(sqlite);

    let device_language = language_utils::device_language_from_env();
    let stored_api_key = UserPreferences::new(storage.clone(), device_language.as_deref()).api_key();
    config
        .validate_with_stored_key(Some(&stored_api_key))
        .context("Configuration validation failed")?;

    let coordinator = Coordinator::from_config(&config, storage, device_language.as_deref())?;
    let verified = coordinator.verify_models().await;
    if !verified.is_empty() {
        debug!("Verified offline models: {}", verified.join(", "));
    }

    let outcome = run_command(&coordinator, cli.command).await;

    if let Err(e) = coordinator.persist() {
        warn!("Failed to persist state: {}", e);
    }
    outcome
}

async fn run_command(coordinator: &Coordinator, command: Commands) -> Result<()> {
    match command {
        Commands::Translate(args) => run_translate(coordinator, args).await,
        Commands::Detect { text } => {
            let detected = coordinator.detect_language(&text).await?;
            println!(
                "{} ({}) confidence {:.2} via {:?}",
                detected.language_code,
                coordinator.language_name(&detected.language_code).unwrap_or_default(),
                detected.confidence,
                detected.source
            );
            Ok(())
        }
        Commands::Models(command) => run_models(coordinator, command).await,
        Commands::Prefs(command) => run_prefs(coordinator, command),
        Commands::Cache(command) => {
            match command {
                CacheCommands::Stats => println!("{}", coordinator.cache_stats()),
                CacheCommands::Clear { scope: Some(scope) } => {
                    let removed = coordinator.clear_cache_for_scope(&scope);
                    println!("Removed {} cached translations for scope {}", removed, scope);
                }
                CacheCommands::Clear { scope: None } => {
                    coordinator.cache().clear();
                    println!("Cache cleared");
                }
            }
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

async fn run_translate(coordinator: &Coordinator, args: TranslateArgs) -> Result<()> {
    let result = match &args.target_language {
        Some(target) => {
            let mut request = TranslationRequest::new(&args.text, target).force(args.force);
            if let Some(source) = &args.source_language {
                request = request.with_source(source);
            }
            if let Some(mode) = args.mode {
                request = request.with_mode(mode.into());
            }
            if let Some(scope) = &args.scope {
                request = request.in_scope(scope);
            }
            coordinator.translate(request).result().await
        }
        None => {
            coordinator
                .translate_message(&args.text, args.direction.into(), args.scope.as_deref())
                .await
        }
    };

    if let Some(detected) = &result.detected_source_language {
        info!("Source language: {}", detected);
    }
    let provider = result.provider_used;
    let text = result.into_result()?;
    println!("{}", text);
    debug!("Resolved via {}", provider);
    Ok(())
}

async fn run_models(coordinator: &Coordinator, command: ModelCommands) -> Result<()> {
    match command {
        ModelCommands::List => {
            // Bring stored state in line with the device before reporting it
            coordinator.reconcile_models().await;
            for (code, record) in coordinator.model_status() {
                let name = coordinator.language_name(&code).unwrap_or_default();
                let verified = if record.verified { " (verified)" } else { "" };
                match &record.last_error {
                    Some(error) => println!("{:<4} {:<12} {}{} - {}", code, name, record.status, verified, error),
                    None => println!("{:<4} {:<12} {}{}", code, name, record.status, verified),
                }
            }
        }
        ModelCommands::Download { language } => {
            let progress_bar = ProgressBar::new(100);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{bar:40}] {pos}% {msg}"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            progress_bar.set_style(style);
            progress_bar.set_message(format!("model {}", language));

            let sink = progress_bar.clone();
            let progress: ProgressFn = Arc::new(move |percent| sink.set_position(u64::from(percent)));

            match coordinator.request_model_download(&language, Some(progress)).await {
                Ok(record) => {
                    progress_bar.finish_with_message(format!("model {} {}", language, record.status));
                    if !record.verified {
                        warn!("Model {} downloaded but could not be verified", language);
                    }
                }
                Err(e) => {
                    progress_bar.abandon_with_message(format!("model {} failed", language));
                    return Err(anyhow!("Download failed: {}", e));
                }
            }
        }
        ModelCommands::Remove { language } => {
            let record = coordinator.remove_model(&language).await?;
            println!("{} {}", record.language_code, record.status);
        }
        ModelCommands::Reconcile => {
            let report = coordinator.reconcile_models().await;
            println!(
                "adopted {:?}, demoted {:?}, verified {:?}, probe failures {:?}",
                report.adopted, report.demoted, report.verified, report.probe_failures
            );
        }
    }
    Ok(())
}

fn run_prefs(coordinator: &Coordinator, command: PrefCommands) -> Result<()> {
    let prefs = coordinator.preferences();
    match command {
        PrefCommands::Show => {
            let show = |code: Option<String>| code.unwrap_or_else(|| "-".to_string());
            println!("device language:     {}", prefs.device_language().unwrap_or("-"));
            println!("preferred language:  {}", show(prefs.preferred_language()));
            println!("incoming language:   {}", show(prefs.preferred_incoming_language()));
            println!("outgoing language:   {}", show(prefs.preferred_outgoing_language()));
            println!("mode:                {}", prefs.translation_mode().display_name());
            println!("offline enabled:     {}", prefs.offline_enabled());
            println!("prefer offline:      {}", prefs.prefer_offline());
            println!("auto translate:      {}", prefs.auto_translate_enabled());
            println!("api key configured:  {}", !prefs.api_key().is_empty());
        }
        PrefCommands::SetLanguage { language, direction } => match direction {
            None => prefs.set_preferred_language(&language)?,
            Some(CliDirection::Incoming) => prefs.set_preferred_incoming_language(&language)?,
            Some(CliDirection::Outgoing) => prefs.set_preferred_outgoing_language(&language)?,
        },
        PrefCommands::SetMode { mode } => prefs.set_translation_mode(mode.into()),
        PrefCommands::SetOffline { enabled } => prefs.set_offline_enabled(enabled),
        PrefCommands::SetPreferOffline { prefer } => prefs.set_prefer_offline(prefer),
        PrefCommands::SetApiKey { key } => prefs.set_api_key(&key),
    }
    Ok(())
}
